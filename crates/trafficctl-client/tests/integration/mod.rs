//! Integration test support for trafficctl-client.

pub mod common;
