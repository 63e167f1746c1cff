//! Gated snapshot storage shared by the synchronizers.
//!
//! A [`SnapshotCell`] holds the last-known-good value for one endpoint.
//! Writes only go through [`SnapshotCell::complete`], which consults the
//! [`SequenceGate`] and keeps the previous value on failure. Readers get the
//! whole snapshot as an `Arc`, never a partially updated one.

use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};
use trafficctl_client::ClientResult;
use trafficctl_telemetry::Metrics;

use crate::sequence::SequenceGate;

/// What happened to one poll.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshOutcome {
    /// The response replaced the held snapshot.
    Applied,
    /// A newer response had already been applied; this one was dropped.
    Stale,
    /// The request failed; the previous snapshot is kept.
    Failed,
    /// The owner shut down before the response could be applied.
    Cancelled,
}

impl RefreshOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Applied => "applied",
            Self::Stale => "stale",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
        }
    }
}

/// How current a snapshot is.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Freshness {
    /// When the snapshot was last replaced.
    pub last_updated: Option<DateTime<Utc>>,
    /// Failed polls since the last successful response.
    pub consecutive_failures: u32,
    /// Message of the most recent failure, cleared on success.
    pub last_error: Option<String>,
}

impl Freshness {
    /// No snapshot yet, or `threshold` polls in a row have failed.
    pub fn is_offline(&self, threshold: u32) -> bool {
        self.last_updated.is_none() || self.consecutive_failures >= threshold
    }

    /// Time since the snapshot was last replaced.
    pub fn age(&self, now: DateTime<Utc>) -> Option<chrono::Duration> {
        self.last_updated.map(|at| now - at)
    }
}

/// Last-known-good value for one endpoint, written through a sequence gate.
pub struct SnapshotCell<T> {
    endpoint: &'static str,
    gate: SequenceGate,
    tx: watch::Sender<Option<Arc<T>>>,
    freshness: RwLock<Freshness>,
    offline_after: u32,
}

impl<T: PartialEq> SnapshotCell<T> {
    /// Empty cell for `endpoint` (used as the metrics label).
    pub fn new(endpoint: &'static str, offline_after: u32) -> Self {
        let (tx, _rx) = watch::channel(None);
        Self {
            endpoint,
            gate: SequenceGate::new(),
            tx,
            freshness: RwLock::new(Freshness::default()),
            offline_after,
        }
    }

    pub fn endpoint(&self) -> &'static str {
        self.endpoint
    }

    /// Stamp a request about to be sent.
    pub fn begin(&self) -> u64 {
        self.gate.issue()
    }

    /// Apply the response to request `seq`.
    ///
    /// Subscribers are only woken when the new snapshot differs from the
    /// held one.
    pub fn complete(&self, seq: u64, result: ClientResult<T>, latency: Duration) -> RefreshOutcome {
        let value = match result {
            Ok(value) => Arc::new(value),
            Err(e) if seq <= self.gate.last_applied() => {
                // a newer request has already been applied
                Metrics::stale_discarded(self.endpoint);
                debug!(
                    endpoint = self.endpoint,
                    seq,
                    last_applied = self.gate.last_applied(),
                    error = %e,
                    "Dropping out-of-order failure"
                );
                return RefreshOutcome::Stale;
            }
            Err(e) => {
                let failures = {
                    let mut freshness = self.freshness.write();
                    freshness.consecutive_failures = freshness.consecutive_failures.saturating_add(1);
                    freshness.last_error = Some(e.to_string());
                    freshness.consecutive_failures
                };
                Metrics::poll_failed(self.endpoint);
                Metrics::consecutive_failures(self.endpoint, failures);
                if failures == 1 || failures == self.offline_after {
                    warn!(
                        endpoint = self.endpoint,
                        seq,
                        consecutive_failures = failures,
                        error = %e,
                        "Poll failed, keeping last snapshot"
                    );
                } else {
                    debug!(endpoint = self.endpoint, seq, consecutive_failures = failures, error = %e, "Poll failed");
                }
                return RefreshOutcome::Failed;
            }
        };

        Metrics::poll_ok(self.endpoint, latency.as_secs_f64() * 1000.0);
        let applied = self.gate.try_apply(seq, || {
            self.tx.send_if_modified(|held| {
                let changed = held.as_deref() != Some(&*value);
                *held = Some(Arc::clone(&value));
                changed
            });
        });

        let mut freshness = self.freshness.write();
        if freshness.consecutive_failures > 0 {
            info!(
                endpoint = self.endpoint,
                after_failures = freshness.consecutive_failures,
                "Controller reachable again"
            );
        }
        freshness.consecutive_failures = 0;
        freshness.last_error = None;

        if applied {
            let now = Utc::now();
            freshness.last_updated = Some(now);
            Metrics::snapshot_applied(self.endpoint, now.timestamp());
            trace!(endpoint = self.endpoint, seq, "Snapshot replaced");
            RefreshOutcome::Applied
        } else {
            Metrics::stale_discarded(self.endpoint);
            debug!(
                endpoint = self.endpoint,
                seq,
                last_applied = self.gate.last_applied(),
                "Dropping out-of-order response"
            );
            RefreshOutcome::Stale
        }
    }

    /// Stamp `request`, await it, and apply the result.
    ///
    /// Returns [`RefreshOutcome::Cancelled`] without touching the snapshot
    /// if `token` fires before or while the request is in flight.
    pub async fn poll<F>(&self, token: &CancellationToken, request: F) -> RefreshOutcome
    where
        F: Future<Output = ClientResult<T>>,
    {
        if token.is_cancelled() {
            return RefreshOutcome::Cancelled;
        }

        let seq = self.begin();
        let started = Instant::now();
        let result = tokio::select! {
            () = token.cancelled() => {
                trace!(endpoint = self.endpoint, seq, "Request abandoned on shutdown");
                return RefreshOutcome::Cancelled;
            }
            result = request => result,
        };
        if token.is_cancelled() {
            trace!(endpoint = self.endpoint, seq, "Dropping response after shutdown");
            return RefreshOutcome::Cancelled;
        }

        self.complete(seq, result, started.elapsed())
    }

    /// The held snapshot, if any poll has succeeded.
    pub fn current(&self) -> Option<Arc<T>> {
        self.tx.borrow().clone()
    }

    /// Receiver woken whenever the held snapshot changes.
    pub fn subscribe(&self) -> watch::Receiver<Option<Arc<T>>> {
        self.tx.subscribe()
    }

    pub fn freshness(&self) -> Freshness {
        self.freshness.read().clone()
    }

    pub fn is_offline(&self) -> bool {
        self.freshness.read().is_offline(self.offline_after)
    }

    pub fn gate(&self) -> &SequenceGate {
        &self.gate
    }
}
