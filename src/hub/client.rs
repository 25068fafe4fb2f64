use futures::StreamExt;
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::handshake::client::Request;
use tokio_tungstenite::tungstenite::http::HeaderValue;
use tokio_tungstenite::tungstenite::http::header::AUTHORIZATION;
use tokio_tungstenite::{Connector, MaybeTlsStream, WebSocketStream, connect_async_tls_with_config};
use url::Url;

use hubsync_api::config::HubServer;

use crate::error::{HubError, HubResult};

pub struct HubClient {
    name: String,
    url: Url,
    token: String,
    verify_tls: bool,
}

/// An open event stream.
pub struct HubStream {
    socket: WebSocketStream<MaybeTlsStream<TcpStream>>,
}

impl HubStream {
    /// Next text frame, or `None` once the hub closes the stream.
    pub async fn next_text(&mut self) -> HubResult<Option<String>> {
        while let Some(msg) = self.socket.next().await {
            match msg? {
                Message::Text(text) => return Ok(Some(text.as_str().to_string())),
                Message::Close(frame) => {
                    log::debug!("Hub closed event stream: {frame:?}");
                    return Ok(None);
                }
                // ping/pong is answered by tungstenite itself
                _ => {}
            }
        }
        Ok(None)
    }

    pub async fn close(&mut self) {
        if let Err(err) = self.socket.close(None).await {
            log::debug!("Error closing hub event stream: {err}");
        }
    }
}

impl HubClient {
    pub fn new(name: &str, server: &HubServer) -> HubResult<Self> {
        let token = match server.token.as_deref().map(str::trim) {
            Some(token) if !token.is_empty() => token.to_string(),
            _ => {
                let env = server.token_env_name();
                let token = std::env::var(env).map_err(|_| HubError::MissingToken(env.to_string()))?;
                if token.trim().is_empty() {
                    return Err(HubError::MissingToken(env.to_string()));
                }
                token.trim().to_string()
            }
        };

        Ok(Self::with_token(name, server.get_url(), token).verify_tls(server.verify_tls()))
    }

    #[must_use]
    pub fn with_token(name: &str, url: Url, token: impl Into<String>) -> Self {
        Self {
            name: name.to_string(),
            url,
            token: token.into(),
            verify_tls: true,
        }
    }

    #[must_use]
    pub fn verify_tls(mut self, verify: bool) -> Self {
        self.verify_tls = verify;
        self
    }

    #[must_use]
    pub fn url(&self) -> &Url {
        &self.url
    }

    fn request(&self) -> HubResult<Request> {
        let mut req = self.url.as_str().into_client_request()?;
        req.headers_mut().insert(
            AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {}", self.token))?,
        );
        Ok(req)
    }

    fn connector(&self) -> HubResult<Option<Connector>> {
        if self.verify_tls || self.url.scheme() != "wss" {
            return Ok(None);
        }

        // The hub presents a self-signed certificate
        let tls = native_tls::TlsConnector::builder()
            .danger_accept_invalid_certs(true)
            .danger_accept_invalid_hostnames(true)
            .build()?;
        Ok(Some(Connector::NativeTls(tls)))
    }

    pub async fn connect(&self) -> HubResult<HubStream> {
        log::info!("[{}] Connecting to hub event stream at {}", self.name, self.url);
        let (socket, _response) =
            connect_async_tls_with_config(self.request()?, None, false, self.connector()?).await?;
        log::info!("[{}] Hub event stream connected", self.name);
        Ok(HubStream { socket })
    }
}
