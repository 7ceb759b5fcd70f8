//! Application lifecycle and two-phase shutdown.
//!
//! 1. **Startup**: register the health keys and start serving
//! 2. **Runtime**: serve until the [`ShutdownSignal`] fires or the listener fails
//! 3. **Shutdown**, bounded as a whole by the shutdown timeout:
//!    - flip the health probe to unavailable (never reverts)
//!    - phase 1: stop accepting connections and drain in-flight requests
//!    - cancel any handler still running once phase 1 ends, answering 503
//!    - phase 2: close the store with whatever budget is left
//!
//! # Example
//!
//! ```rust,ignore
//! let app = Application::bind("0.0.0.0:8080", store, Duration::from_secs(5)).await?;
//! listen_for_os_signals(app.shutdown_signal());
//! app.run().await?;
//! ```

use crate::ServerError;
use axum::{
    extract::{Request, State},
    middleware::{self, Next},
    response::{IntoResponse, Response},
};
use chrono::{SecondsFormat, Utc};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use ticket_inventory_core::InventoryStore;
use ticket_inventory_runtime::{HealthRegistry, ShutdownSignal};
use ticket_inventory_web::{AppError, AppState, DEFAULT_REQUEST_TIMEOUT, router_with_timeout};
use tokio::net::TcpListener;
use tokio::time::Instant;
use tracing::{info, warn};

/// Version string reported under the `version` health key.
pub const VERSION: &str = concat!("ticket-inventory@", env!("CARGO_PKG_VERSION"));

/// Running application: HTTP gateway plus the store it fronts.
pub struct Application {
    /// TCP listener for HTTP server
    listener: TcpListener,

    /// Store behind the gateway, closed in phase 2
    store: Arc<dyn InventoryStore>,

    /// Status map behind `/-/health`, shared with the router
    health: Arc<HealthRegistry>,

    /// Requests shutdown from outside (OS signals, tests)
    shutdown: ShutdownSignal,

    /// Total shutdown budget
    shutdown_timeout: Duration,

    /// Per-request budget
    request_timeout: Duration,
}

impl Application {
    /// Create an application around an already bound listener.
    #[must_use]
    pub fn new(
        listener: TcpListener,
        store: Arc<dyn InventoryStore>,
        shutdown_timeout: Duration,
    ) -> Self {
        Self {
            listener,
            store,
            health: Arc::new(HealthRegistry::new()),
            shutdown: ShutdownSignal::new(),
            shutdown_timeout,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }

    /// Bind `addr` and create an application.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError::Io`] if the address cannot be bound.
    pub async fn bind(
        addr: &str,
        store: Arc<dyn InventoryStore>,
        shutdown_timeout: Duration,
    ) -> Result<Self, ServerError> {
        let listener = TcpListener::bind(addr).await?;
        Ok(Self::new(listener, store, shutdown_timeout))
    }

    /// Answer requests that run longer than `timeout` with 408.
    #[must_use]
    pub const fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Address the listener is bound to.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError::Io`] if the socket cannot report its address.
    pub fn local_addr(&self) -> Result<SocketAddr, ServerError> {
        Ok(self.listener.local_addr()?)
    }

    /// Handle that triggers shutdown when fired.
    #[must_use]
    pub fn shutdown_signal(&self) -> ShutdownSignal {
        self.shutdown.clone()
    }

    /// Shared health registry.
    #[must_use]
    pub fn health(&self) -> Arc<HealthRegistry> {
        Arc::clone(&self.health)
    }

    /// Serve until shutdown is requested, then run the two-phase shutdown.
    ///
    /// Returns within the shutdown timeout of the request, even when handlers
    /// or the store are stuck.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError::Io`] if the listener failed. Shutdown still runs
    /// to completion (store closed) before the error is returned.
    pub async fn run(self) -> Result<(), ServerError> {
        let Self {
            listener,
            store,
            health,
            shutdown,
            shutdown_timeout,
            request_timeout,
        } = self;

        health.append(
            "http",
            format!(
                "OK: {}",
                Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true)
            ),
        );
        health.append("version", VERSION);

        // Draining starts only after the probe has flipped.
        let drain = ShutdownSignal::new();
        // Fired once draining is over; cancels handlers left on open connections.
        let cancel = ShutdownSignal::new();

        let app = router_with_timeout(
            AppState::with_health(Arc::clone(&store), Arc::clone(&health)),
            request_timeout,
        )
        .layer(middleware::from_fn_with_state(
            cancel.clone(),
            cancel_on_shutdown,
        ));

        let addr = listener.local_addr()?;
        info!(address = %addr, "HTTP server listening for requests");

        let drain_wait = drain.clone();
        let mut server = tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async move { drain_wait.wait().await })
                .await
        });

        let early_exit = tokio::select! {
            () = shutdown.wait() => None,
            result = &mut server => Some(result),
        };

        let deadline = Instant::now() + shutdown_timeout;
        shutdown.trigger();
        health.begin_shutdown();
        info!("Shutdown started, draining in-flight requests");
        drain.trigger();

        let served = match early_exit {
            Some(result) => result,
            None => {
                let drained = tokio::time::timeout_at(deadline, &mut server).await;
                if let Ok(result) = drained {
                    result
                } else {
                    warn!(
                        timeout_secs = shutdown_timeout.as_secs_f64(),
                        "In-flight requests did not finish in time, cancelling them"
                    );
                    // Stops the accept loop only; open connections live on in
                    // their own tasks until `cancel` reaches their handlers.
                    server.abort();
                    let _ = server.await;
                    Ok(Ok(()))
                }
            }
        };
        cancel.trigger();

        info!("HTTP server stopped, closing store");
        if tokio::time::timeout_at(deadline, store.close()).await.is_err() {
            warn!(
                timeout_secs = shutdown_timeout.as_secs_f64(),
                "Store did not close within the shutdown budget"
            );
        }
        info!("Graceful shutdown complete");

        match served {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => Err(ServerError::Io(e)),
            Err(e) => Err(ServerError::Task(e.to_string())),
        }
    }
}

/// Run the handler unless shutdown cancels it first.
async fn cancel_on_shutdown(
    State(cancel): State<ShutdownSignal>,
    request: Request,
    next: Next,
) -> Response {
    tokio::select! {
        response = next.run(request) => response,
        () = cancel.wait() => AppError::unavailable("server is shutting down").into_response(),
    }
}
