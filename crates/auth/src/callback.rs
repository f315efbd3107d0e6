//! Loopback listener for the CLI code flow.
//!
//! Binds `127.0.0.1:<port>`, waits for the browser to be redirected to
//! `/oauth2/callback`, and returns the query parameters. Requests to any
//! other path (favicon probes and the like) get a 404 and are skipped.

use std::{collections::HashMap, time::Duration};
use tenantgate_types::{GateError, traits::Result};
use tokio::{
    io::{AsyncReadExt, AsyncWriteExt},
    net::{TcpListener, TcpStream},
};

/// Path the authorize endpoint redirects to.
pub const CALLBACK_PATH: &str = "/oauth2/callback";

const TIMEOUT: Duration = Duration::from_secs(120);

const DONE_PAGE: &[u8] = b"HTTP/1.1 200 OK\r\nContent-Type: text/html\r\nConnection: close\r\n\r\n\
    <html><body><h1>Signed in</h1><p>You can close this tab and return to the terminal.</p></body></html>";
const NOT_FOUND: &[u8] = b"HTTP/1.1 404 Not Found\r\nContent-Length: 0\r\nConnection: close\r\n\r\n";

/// Bind the callback port.
///
/// Bind before opening the browser so a fast redirect cannot race the
/// listener.
///
/// # Errors
///
/// Returns [`GateError::Configuration`] if the port is taken or cannot be bound.
pub async fn bind_callback(port: u16) -> Result<TcpListener> {
    TcpListener::bind(("127.0.0.1", port)).await.map_err(|e| {
        if e.kind() == std::io::ErrorKind::AddrInUse {
            GateError::Configuration(format!(
                "callback port {port} is already in use; set callback_port to a free port"
            ))
        } else {
            GateError::Configuration(format!("cannot bind callback port {port}: {e}"))
        }
    })
}

/// Wait for the redirect carrying `code` (or an OAuth `error`).
///
/// # Errors
///
/// Returns [`GateError::Authentication`] on timeout, on socket failure, or
/// when the redirect carries an `error` parameter.
pub async fn accept_callback(listener: TcpListener) -> Result<HashMap<String, String>> {
    let wait = async {
        loop {
            let (stream, _) = listener
                .accept()
                .await
                .map_err(|e| GateError::auth(format!("callback accept failed: {e}")))?;
            if let Some(params) = serve_one(stream).await? {
                return Ok(params);
            }
        }
    };

    let params = tokio::time::timeout(TIMEOUT, wait)
        .await
        .map_err(|_| GateError::auth("timed out waiting for OAuth callback"))??;

    if let Some(error) = params.get("error") {
        let detail = params
            .get("error_description")
            .map_or(String::new(), |d| format!(": {d}"));
        return Err(GateError::auth(format!("authorization denied ({error}){detail}")));
    }
    Ok(params)
}

async fn serve_one(mut stream: TcpStream) -> Result<Option<HashMap<String, String>>> {
    let mut buf = vec![0u8; 8192];
    let n = stream
        .read(&mut buf)
        .await
        .map_err(|e| GateError::auth(format!("callback read failed: {e}")))?;
    let request = String::from_utf8_lossy(&buf[..n]);

    let reply = parse_callback_request(&request)?;
    let page = if reply.is_some() {
        DONE_PAGE
    } else {
        tracing::debug!("ignoring request outside the callback path");
        NOT_FOUND
    };
    stream
        .write_all(page)
        .await
        .map_err(|e| GateError::auth(format!("callback write failed: {e}")))?;
    let _ = stream.shutdown().await;
    Ok(reply)
}

/// Parse the request line; `None` when the path is not [`CALLBACK_PATH`].
fn parse_callback_request(request: &str) -> Result<Option<HashMap<String, String>>> {
    // "GET /oauth2/callback?code=... HTTP/1.1"
    let target = request
        .lines()
        .next()
        .and_then(|line| line.split_ascii_whitespace().nth(1))
        .unwrap_or("/");
    let (path, query) = target.split_once('?').unwrap_or((target, ""));
    if path != CALLBACK_PATH {
        return Ok(None);
    }
    serde_urlencoded::from_str(query)
        .map(Some)
        .map_err(|e| GateError::auth(format!("invalid callback query: {e}")))
}
