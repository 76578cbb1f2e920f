//! HTTP transport: admin API plus stubbed traffic on one listener.

mod handlers;
mod router;
mod types;

pub use handlers::stub_response;

use crate::record::Recorder;
use crate::service::MockService;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper_util::rt::TokioIo;
use router::route_request;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{debug, error, info};

/// State shared by every connection.
pub struct AppState {
    pub service: Arc<MockService>,
    pub recorder: Recorder,
    /// Path prefix of the admin routes, e.g. `/_decoy`
    pub admin_prefix: String,
}

impl AppState {
    pub fn new(
        service: Arc<MockService>,
        recorder: Recorder,
        admin_prefix: impl Into<String>,
    ) -> Self {
        Self {
            service,
            recorder,
            admin_prefix: admin_prefix.into(),
        }
    }
}

/// HTTP server for decoy
pub struct DecoyServer {
    state: Arc<AppState>,
}

impl DecoyServer {
    pub fn new(state: AppState) -> Self {
        Self {
            state: Arc::new(state),
        }
    }

    /// Bind `addr` and serve until the process exits.
    pub async fn run(self, addr: &str) -> Result<(), anyhow::Error> {
        let listener = TcpListener::bind(addr).await?;
        self.serve(listener).await
    }

    /// Serve connections from an already bound listener.
    pub async fn serve(self, listener: TcpListener) -> Result<(), anyhow::Error> {
        info!(
            "Decoy listening on http://{} (admin prefix {}, store {})",
            listener.local_addr()?,
            self.state.admin_prefix,
            self.state.service.store_backend()
        );

        loop {
            let (stream, _) = match listener.accept().await {
                Ok(conn) => conn,
                Err(e) => {
                    error!("Accept error: {}", e);
                    continue;
                }
            };
            let io = TokioIo::new(stream);
            let state = Arc::clone(&self.state);

            tokio::spawn(async move {
                let service = service_fn(move |req| {
                    let state = Arc::clone(&state);
                    async move { route_request(req, state).await }
                });

                if let Err(e) = http1::Builder::new().serve_connection(io, service).await {
                    debug!("Connection error: {}", e);
                }
            });
        }
    }
}
