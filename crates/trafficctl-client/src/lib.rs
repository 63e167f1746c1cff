//! HTTP transport for the traffic signal controller API.
//!
//! The synchronizers talk to the controller through the dyn-compatible
//! [`ControllerApi`] trait. [`HttpControllerApi`] is the production
//! implementation; [`MockControllerApi`] is a scripted stand-in for tests.

pub mod api;
pub mod config;
pub mod error;
pub mod http;
pub mod mock;

pub use api::{BoxFuture, ControllerApi, DynControllerApi, Endpoint};
pub use config::ClientConfig;
pub use error::{ClientError, ClientResult};
pub use http::HttpControllerApi;
pub use mock::MockControllerApi;
