// crates/endpoints-echo/src/main.rs
// ============================================================================
// Module: Endpoints Echo Binary
// Description: Process entry point for the sample application.
// Purpose: Serve the echo router on the port App Engine assigns.
// Dependencies: axum, tokio, endpoints-echo
// ============================================================================

//! Serves [`endpoints_echo::router`] on `0.0.0.0:$PORT` (default 8080).

use std::io;
use std::net::Ipv4Addr;
use std::net::SocketAddr;

/// Port used when `PORT` is unset.
const DEFAULT_PORT: u16 = 8080;

/// Resolves the listen port from `PORT`.
fn listen_port() -> io::Result<u16> {
    match std::env::var("PORT") {
        Ok(value) => value.trim().parse().map_err(|_| {
            io::Error::new(io::ErrorKind::InvalidInput, format!("invalid PORT value `{value}`"))
        }),
        Err(std::env::VarError::NotPresent) => Ok(DEFAULT_PORT),
        Err(std::env::VarError::NotUnicode(_)) => {
            Err(io::Error::new(io::ErrorKind::InvalidInput, "PORT must be valid UTF-8"))
        }
    }
}

#[tokio::main]
async fn main() -> io::Result<()> {
    let addr = SocketAddr::from((Ipv4Addr::UNSPECIFIED, listen_port()?));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, endpoints_echo::router())
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await
}
