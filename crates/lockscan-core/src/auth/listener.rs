//! One-shot loopback listener for the OAuth authorization redirect.
//!
//! Bound to 127.0.0.1 on an OS-assigned port, so concurrent logins on a
//! shared machine never collide and the redirect URI is only known once the
//! socket is live. Requests without a valid `code`/`state` pair are answered
//! with 400 and the wait continues; browsers fetch favicons and retry, and a
//! stray request must not poison the login.

use std::io;
use std::net::SocketAddr;

use reqwest::Url;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tracing::{debug, warn};

const CALLBACK_PATH: &str = "/callback";

const BAD_REQUEST_HTML: &str = "<html><body><h1>Authentication failed</h1>\
<p>You may close this window and retry.</p></body></html>";

/// Maximum bytes read from one callback request; the redirect query fits
/// comfortably and anything larger is not ours.
const MAX_REQUEST_BYTES: usize = 8192;

pub struct CallbackListener {
    listener: TcpListener,
    addr: SocketAddr,
}

impl CallbackListener {
    /// Bind to the loopback interface on an OS-assigned port.
    pub async fn bind() -> io::Result<Self> {
        let listener = TcpListener::bind(("127.0.0.1", 0)).await?;
        let addr = listener.local_addr()?;
        debug!(%addr, "callback listener bound");
        Ok(Self { listener, addr })
    }

    pub fn port(&self) -> u16 {
        self.addr.port()
    }

    /// Redirect URI to register with the authorization request.
    pub fn redirect_uri(&self) -> String {
        format!("http://{}{}", self.addr, CALLBACK_PATH)
    }

    /// Block until a request with an authorization code and the expected
    /// state arrives, answering 400 to everything else and waiting on.
    ///
    /// The valid request is answered with a redirect to `success_url`. The
    /// caller is responsible for cancellation (dropping the future releases
    /// the socket).
    pub async fn wait_for_code(&self, expected_state: &str, success_url: &str) -> io::Result<String> {
        loop {
            let (mut socket, peer) = self.listener.accept().await?;
            match handle_connection(&mut socket, expected_state, success_url).await {
                Ok(Some(code)) => return Ok(code),
                Ok(None) => {
                    debug!(%peer, "ignored callback request without a valid code/state");
                }
                Err(err) => {
                    warn!(%peer, error = %err, "callback connection failed");
                }
            }
        }
    }
}

async fn handle_connection(
    socket: &mut TcpStream,
    expected_state: &str,
    success_url: &str,
) -> io::Result<Option<String>> {
    let mut buffer = vec![0u8; MAX_REQUEST_BYTES];
    let size = socket.read(&mut buffer).await?;
    if size == 0 {
        return Ok(None);
    }

    let request = String::from_utf8_lossy(&buffer[..size]);
    match parse_callback(request.as_ref(), expected_state) {
        Some(code) => {
            let response = format!(
                "HTTP/1.1 302 Found\r\nLocation: {success_url}\r\nContent-Length: 0\r\nConnection: close\r\n\r\n"
            );
            socket.write_all(response.as_bytes()).await?;
            socket.shutdown().await?;
            Ok(Some(code))
        }
        None => {
            let response = format!(
                "HTTP/1.1 400 Bad Request\r\nContent-Type: text/html; charset=utf-8\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                BAD_REQUEST_HTML.len(),
                BAD_REQUEST_HTML
            );
            socket.write_all(response.as_bytes()).await?;
            socket.shutdown().await?;
            Ok(None)
        }
    }
}

/// Extract the authorization code from a raw callback request.
///
/// Returns `None` unless the request is a GET on the callback path with a
/// `code` parameter and a `state` equal to the session's nonce.
fn parse_callback(request: &str, expected_state: &str) -> Option<String> {
    let first_line = request.lines().next()?;
    let mut parts = first_line.split_whitespace();
    let method = parts.next()?;
    let target = parts.next()?;
    if method != "GET" {
        return None;
    }

    let url = Url::parse(&format!("http://127.0.0.1{target}")).ok()?;
    if url.path() != CALLBACK_PATH {
        return None;
    }

    let mut code = None;
    let mut state = None;
    for (key, value) in url.query_pairs() {
        match key.as_ref() {
            "code" => code = Some(value.into_owned()),
            "state" => state = Some(value.into_owned()),
            _ => {}
        }
    }

    if state.as_deref() != Some(expected_state) {
        return None;
    }
    code
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_callback_extracts_code() {
        let request = "GET /callback?code=abc123&state=xyz HTTP/1.1\r\nHost: 127.0.0.1\r\n\r\n";
        assert_eq!(parse_callback(request, "xyz").as_deref(), Some("abc123"));
    }

    #[test]
    fn test_parse_callback_rejects_state_mismatch() {
        let request = "GET /callback?code=abc123&state=evil HTTP/1.1\r\n\r\n";
        assert_eq!(parse_callback(request, "xyz"), None);
    }

    #[test]
    fn test_parse_callback_rejects_missing_code() {
        let request = "GET /callback?state=xyz HTTP/1.1\r\n\r\n";
        assert_eq!(parse_callback(request, "xyz"), None);
    }

    #[test]
    fn test_parse_callback_rejects_other_paths() {
        let request = "GET /favicon.ico HTTP/1.1\r\n\r\n";
        assert_eq!(parse_callback(request, "xyz"), None);
    }

    #[test]
    fn test_parse_callback_rejects_non_get() {
        let request = "POST /callback?code=abc&state=xyz HTTP/1.1\r\n\r\n";
        assert_eq!(parse_callback(request, "xyz"), None);
    }

    #[test]
    fn test_parse_callback_decodes_query_encoding() {
        let request = "GET /callback?code=a%2Fb&state=x%20y HTTP/1.1\r\n\r\n";
        assert_eq!(parse_callback(request, "x y").as_deref(), Some("a/b"));
    }

    #[tokio::test]
    async fn test_redirect_uri_uses_bound_port() {
        let listener = CallbackListener::bind().await.unwrap();
        let uri = listener.redirect_uri();
        assert_eq!(uri, format!("http://127.0.0.1:{}/callback", listener.port()));
    }
}
