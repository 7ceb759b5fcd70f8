//! Liveness status registry backing the `/-/health` probe.
//!
//! The registry is the only in-process shared mutable state of the service.
//! It holds a map of status keys (for example `http` and `version`) and a
//! one-way shutdown flag. Once shutdown has begun the probe reports
//! unavailable and never reverts.
//!
//! # Example
//!
//! ```rust
//! use ticket_inventory_runtime::health::{HealthRegistry, HealthReport};
//!
//! let registry = HealthRegistry::new();
//! registry.append("version", "ticket-inventory@0.1.0");
//! assert!(matches!(registry.report(), HealthReport::Live(_)));
//!
//! registry.begin_shutdown();
//! assert!(matches!(registry.report(), HealthReport::ShuttingDown(_)));
//! ```

use chrono::{SecondsFormat, Utc};
use std::collections::BTreeMap;
use std::sync::{Mutex, PoisonError};

/// Snapshot returned by [`HealthRegistry::report`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HealthReport {
    /// Serving traffic; the map is rendered as the probe's JSON body.
    Live(BTreeMap<String, String>),
    /// Shutdown in progress; the string is the plain-text notice.
    ShuttingDown(String),
}

impl HealthReport {
    /// Whether the probe should answer with a success status.
    #[must_use]
    pub const fn is_live(&self) -> bool {
        matches!(self, Self::Live(_))
    }
}

#[derive(Debug, Default)]
struct HealthState {
    entries: BTreeMap<String, String>,
    shutdown_notice: Option<String>,
}

/// Lock-guarded liveness map plus shutdown flag.
///
/// Owned by the gateway for its lifetime and shared through `Arc`. Reads and
/// writes are instantaneous, so a plain `std::sync::Mutex` is used.
#[derive(Debug, Default)]
pub struct HealthRegistry {
    state: Mutex<HealthState>,
}

impl HealthRegistry {
    /// Create an empty registry in the live state.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a status key, replacing any previous value.
    pub fn append(&self, key: impl Into<String>, value: impl Into<String>) {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        state.entries.insert(key.into(), value.into());
    }

    /// Clear all status keys. The shutdown flag is not affected.
    pub fn reset(&self) {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        state.entries.clear();
    }

    /// Flip the registry into the shutting-down state.
    ///
    /// Records a timestamped notice. Calling it again keeps the first notice.
    /// Returns `true` if this call performed the transition.
    pub fn begin_shutdown(&self) -> bool {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        if state.shutdown_notice.is_some() {
            return false;
        }
        state.shutdown_notice = Some(format!(
            "server is shutting down | {}",
            Utc::now().to_rfc3339_opts(SecondsFormat::Nanos, true)
        ));
        true
    }

    /// Whether shutdown has begun.
    #[must_use]
    pub fn is_shutting_down(&self) -> bool {
        self.state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .shutdown_notice
            .is_some()
    }

    /// Current probe answer.
    #[must_use]
    pub fn report(&self) -> HealthReport {
        let state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        match &state.shutdown_notice {
            Some(notice) => HealthReport::ShuttingDown(notice.clone()),
            None => HealthReport::Live(state.entries.clone()),
        }
    }
}
