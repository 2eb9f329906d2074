// ABOUTME: HTTP implementation of the directory lookups.
// ABOUTME: Speaks HTTP/1.1 over plain TCP or rustls, authenticated with the admin API key.

use super::error::{DirectoryError, Result};
use super::types::{NodeReport, RelayDescriptor};
use super::Directory;
use async_trait::async_trait;
use bytes::Bytes;
use http_body_util::{BodyExt, Empty};
use hyper::header::{ACCEPT, AUTHORIZATION, HOST};
use hyper::{Request, StatusCode};
use hyper_util::rt::TokioIo;
use rustls::pki_types::ServerName;
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;
use tokio_rustls::TlsConnector;
use url::{Host, Url};

/// Directory client talking to the server's REST API.
pub struct HttpDirectory {
    base: Url,
    api_key: String,
    tls: TlsConnector,
}

impl std::fmt::Debug for HttpDirectory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpDirectory")
            .field("base", &self.base.as_str())
            .field("api_key", &"<redacted>")
            .finish()
    }
}

impl HttpDirectory {
    /// Create a client for `server`, a bare hostname (https assumed) or a full URL.
    pub fn new(server: &str, api_key: impl Into<String>) -> Result<Self> {
        let endpoint = Self::endpoint(server);
        let base = Url::parse(&endpoint).map_err(|e| DirectoryError::InvalidEndpoint {
            endpoint: endpoint.clone(),
            reason: e.to_string(),
        })?;
        if base.host_str().is_none() {
            return Err(DirectoryError::InvalidEndpoint {
                endpoint,
                reason: "missing host".to_string(),
            });
        }

        Ok(Self {
            base,
            api_key: api_key.into(),
            tls: build_tls_connector()?,
        })
    }

    /// Normalize the configured server into a URL.
    pub fn endpoint(server: &str) -> String {
        let server = server.trim();
        if server.starts_with("http://") || server.starts_with("https://") {
            server.to_string()
        } else {
            format!("https://{server}")
        }
    }

    fn path(&self, suffix: &str) -> String {
        format!("{}{}", self.base.path().trim_end_matches('/'), suffix)
    }

    fn host_header(&self) -> String {
        let host = self.base.host_str().unwrap_or_default();
        match self.base.port() {
            Some(port) => format!("{host}:{port}"),
            None => host.to_string(),
        }
    }

    /// Host to dial and verify, with IPv6 literals unbracketed.
    fn connect_host(&self) -> String {
        match self.base.host() {
            Some(Host::Domain(domain)) => domain.to_string(),
            Some(Host::Ipv4(addr)) => addr.to_string(),
            Some(Host::Ipv6(addr)) => addr.to_string(),
            None => String::new(),
        }
    }

    /// GET a resource. A 404 is reported as `None`.
    async fn retrieve(&self, path_and_query: &str) -> Result<Option<Bytes>> {
        let host = self.connect_host();
        let port = self.base.port_or_known_default().unwrap_or(443);

        tracing::debug!(host = %host, port, path = %path_and_query, "directory request");

        let stream = TcpStream::connect((host.as_str(), port))
            .await
            .map_err(|e| DirectoryError::Connect(format!("{host}:{port}: {e}")))?;

        let request = Request::builder()
            .method("GET")
            .uri(path_and_query)
            .header(HOST, self.host_header())
            .header(AUTHORIZATION, format!("token {}", self.api_key))
            .header(ACCEPT, "application/json")
            .body(Empty::<Bytes>::new())
            .map_err(|e| DirectoryError::Connect(format!("failed to prepare request: {e}")))?;

        let (status, body) = if self.base.scheme() == "https" {
            let server_name = ServerName::try_from(host.clone())
                .map_err(|e| DirectoryError::Connect(format!("invalid server name {host}: {e}")))?;
            let tls_stream = self
                .tls
                .connect(server_name, stream)
                .await
                .map_err(|e| DirectoryError::Connect(format!("TLS handshake failed: {e}")))?;
            send(tls_stream, request).await?
        } else {
            send(stream, request).await?
        };

        if status == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if status != StatusCode::OK {
            return Err(DirectoryError::Status(status));
        }
        Ok(Some(body))
    }
}

#[async_trait]
impl Directory for HttpDirectory {
    async fn find_node(&self, id: &str) -> Result<Option<NodeReport>> {
        let path = self.path(&format!("/nodes/{}", urlencoding::encode(id)));
        match self.retrieve(&path).await? {
            Some(body) => Ok(Some(serde_json::from_slice(&body)?)),
            None => Ok(None),
        }
    }

    async fn list_nodes_by_custom_id(&self, custom_id: &str) -> Result<Vec<NodeReport>> {
        let path = self.path(&format!(
            "/nodes?custom-id={}",
            urlencoding::encode(custom_id)
        ));
        match self.retrieve(&path).await? {
            Some(body) => Ok(serde_json::from_slice(&body)?),
            None => Ok(Vec::new()),
        }
    }

    async fn find_relay(&self, hostname: &str) -> Result<Option<RelayDescriptor>> {
        let path = self.path(&format!("/servers/{}", urlencoding::encode(hostname)));
        match self.retrieve(&path).await? {
            Some(body) => Ok(Some(serde_json::from_slice(&body)?)),
            None => Ok(None),
        }
    }
}

/// Run one HTTP/1.1 exchange over an established stream.
async fn send<S>(io: S, request: Request<Empty<Bytes>>) -> Result<(StatusCode, Bytes)>
where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    let (mut sender, conn) = hyper::client::conn::http1::handshake(TokioIo::new(io))
        .await
        .map_err(|e| DirectoryError::Connect(format!("HTTP handshake failed: {e}")))?;

    tokio::spawn(async move {
        if let Err(e) = conn.await {
            tracing::debug!("directory connection error: {}", e);
        }
    });

    let response = sender
        .send_request(request)
        .await
        .map_err(|e| DirectoryError::Connect(format!("request failed: {e}")))?;

    let status = response.status();
    let body = response
        .into_body()
        .collect()
        .await
        .map_err(|e| DirectoryError::Body(e.to_string()))?
        .to_bytes();

    Ok((status, body))
}

fn build_tls_connector() -> Result<TlsConnector> {
    let mut roots = rustls::RootCertStore::empty();
    roots.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());

    let config = rustls::ClientConfig::builder_with_provider(Arc::new(
        rustls::crypto::ring::default_provider(),
    ))
    .with_safe_default_protocol_versions()
    .map_err(|e| DirectoryError::Connect(format!("TLS setup failed: {e}")))?
    .with_root_certificates(roots)
    .with_no_client_auth();

    Ok(TlsConnector::from(Arc::new(config)))
}
