use std::sync::atomic::{AtomicUsize, Ordering};

use serde::{Deserialize, Serialize};
use tracing_subscriber::EnvFilter;

/// Install the global fmt subscriber.
///
/// `RUST_LOG` overrides the default `info` filter. Calling this more than once
/// is harmless; only the first call installs anything.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init();
}

/// Snapshot of what an ingress loop has handled so far.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngressCounts {
    /// Tasks that ran to completion, uploads included.
    pub succeeded: usize,
    /// Tasks that decoded but failed somewhere in the pipeline.
    pub failed: usize,
    /// Queue bodies that were not a task descriptor.
    pub malformed: usize,
    /// Bus messages handed to `receive`.
    pub received: usize,
    /// Bus records that were empty, falsy or undecodable.
    pub skipped: usize,
}

#[derive(Debug, Default)]
pub(crate) struct IngressCounters {
    succeeded: AtomicUsize,
    failed: AtomicUsize,
    malformed: AtomicUsize,
    received: AtomicUsize,
    skipped: AtomicUsize,
}

impl IngressCounters {
    pub(crate) fn succeeded(&self) {
        self.succeeded.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn failed(&self) {
        self.failed.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn malformed(&self) {
        self.malformed.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn received(&self) {
        self.received.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn skipped(&self) {
        self.skipped.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn snapshot(&self) -> IngressCounts {
        IngressCounts {
            succeeded: self.succeeded.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            malformed: self.malformed.load(Ordering::Relaxed),
            received: self.received.load(Ordering::Relaxed),
            skipped: self.skipped.load(Ordering::Relaxed),
        }
    }
}
