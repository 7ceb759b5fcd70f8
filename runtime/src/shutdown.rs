//! Shutdown signalling.
//!
//! OS signals are not handled globally. A listener task translates SIGINT,
//! SIGTERM or SIGQUIT into a [`ShutdownSignal`] trigger, and the supervisor
//! (plus anything else holding a clone) waits on that signal to drive the
//! two-phase shutdown.
//!
//! # Example
//!
//! ```rust,no_run
//! use ticket_inventory_runtime::shutdown::{ShutdownSignal, listen_for_os_signals};
//!
//! # async fn example() {
//! let shutdown = ShutdownSignal::new();
//! listen_for_os_signals(shutdown.clone());
//!
//! shutdown.wait().await;
//! // stop the gateway, then close the store
//! # }
//! ```

use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{error, info};

/// Cloneable, one-way cancellation handle.
///
/// Backed by a `watch` channel so late subscribers still observe a trigger
/// that happened before they started waiting.
#[derive(Debug, Clone)]
pub struct ShutdownSignal {
    tx: Arc<watch::Sender<bool>>,
    rx: watch::Receiver<bool>,
}

impl Default for ShutdownSignal {
    fn default() -> Self {
        Self::new()
    }
}

impl ShutdownSignal {
    /// Create an untriggered signal.
    #[must_use]
    pub fn new() -> Self {
        let (tx, rx) = watch::channel(false);
        Self {
            tx: Arc::new(tx),
            rx,
        }
    }

    /// Request shutdown. Returns `true` if this call performed the trigger.
    pub fn trigger(&self) -> bool {
        !self.tx.send_replace(true)
    }

    /// Whether shutdown has been requested.
    #[must_use]
    pub fn is_triggered(&self) -> bool {
        *self.rx.borrow()
    }

    /// Resolve once shutdown has been requested (immediately if it already was).
    pub async fn wait(&self) {
        let mut rx = self.rx.clone();
        // The sender lives as long as `self`, so the channel cannot close here.
        let _ = rx.wait_for(|triggered| *triggered).await;
    }
}

/// Which OS signal arrived.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OsSignal {
    /// SIGINT / Ctrl+C
    Interrupt,
    /// SIGTERM
    Terminate,
    /// SIGQUIT
    Quit,
}

/// Wait for SIGINT, SIGTERM or SIGQUIT (Ctrl+C only on non-unix targets).
///
/// A handler that cannot be installed is logged and ignored; the remaining
/// signals still work.
pub async fn os_signal() -> OsSignal {
    let interrupt = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = unix_signal(tokio::signal::unix::SignalKind::terminate());
    #[cfg(unix)]
    let quit = unix_signal(tokio::signal::unix::SignalKind::quit());

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();
    #[cfg(not(unix))]
    let quit = std::future::pending::<()>();

    tokio::select! {
        () = interrupt => OsSignal::Interrupt,
        () = terminate => OsSignal::Terminate,
        () = quit => OsSignal::Quit,
    }
}

#[cfg(unix)]
async fn unix_signal(kind: tokio::signal::unix::SignalKind) {
    match tokio::signal::unix::signal(kind) {
        Ok(mut stream) => {
            stream.recv().await;
        }
        Err(e) => {
            error!(error = %e, "Failed to install signal handler");
            std::future::pending::<()>().await;
        }
    }
}

/// Spawn a task that triggers `signal` when the process receives a quit signal.
///
/// The task also ends, without triggering, if shutdown was requested some other way.
pub fn listen_for_os_signals(signal: ShutdownSignal) -> JoinHandle<()> {
    tokio::spawn(async move {
        tokio::select! {
            received = os_signal() => {
                info!(signal = ?received, "Quit signal received");
                signal.trigger();
            }
            () = signal.wait() => {}
        }
    })
}
