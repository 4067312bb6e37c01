//! Demonstration application served by the `wireline` binary.
//!
//! Routes on the request target:
//!
//! - `/yourproblem` → 400 page
//! - `/myproblem` → 500 page
//! - `/httpbin/<rest>` → `<upstream>/<rest>` streamed back with chunked
//!   encoding, followed by a SHA-256 and length trailer
//! - anything else → 200 page

use std::time::Duration;

use anyhow::Context;
use sha2::{Digest, Sha256};
use tokio::io::AsyncWrite;
use tracing::{debug, warn};
use url::Url;

use crate::config::Config;
use crate::http::request::Request;
use crate::http::response::{default_headers, StatusCode};
use crate::http::writer::{ResponseWriter, WriterError};
use crate::proxy::upstream;
use crate::server::Handler;

const PROXY_PREFIX: &str = "/httpbin";
const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

const OK_PAGE: &str = "<html>
  <head>
    <title>200 OK</title>
  </head>
  <body>
    <h1>Success!</h1>
    <p>Your request was an absolute banger.</p>
  </body>
</html>
";

const BAD_REQUEST_PAGE: &str = "<html>
  <head>
    <title>400 Bad Request</title>
  </head>
  <body>
    <h1>Bad Request</h1>
    <p>Your request honestly kinda sucked.</p>
  </body>
</html>
";

const SERVER_ERROR_PAGE: &str = "<html>
  <head>
    <title>500 Internal Server Error</title>
  </head>
  <body>
    <h1>Internal Server Error</h1>
    <p>Okay, you know what? This one is on me.</p>
  </body>
</html>
";

#[derive(Debug, Clone)]
pub struct DemoHandler {
    upstream: Url,
}

impl DemoHandler {
    pub fn new(cfg: &Config) -> anyhow::Result<Self> {
        let upstream = Url::parse(&cfg.upstream_url)
            .with_context(|| format!("invalid upstream URL {}", cfg.upstream_url))?;
        Ok(Self { upstream })
    }

    /// Maps a `/httpbin/...` target onto the upstream base URL.
    pub fn upstream_url_for(&self, target: &str) -> anyhow::Result<Url> {
        let rest = target.strip_prefix(PROXY_PREFIX).unwrap_or(target);
        let base = self.upstream.as_str().trim_end_matches('/');
        Url::parse(&format!("{}{}", base, rest)).context("invalid proxied target")
    }

    async fn proxy<W>(&self, w: &mut ResponseWriter<W>, req: &Request) -> Result<(), WriterError>
    where
        W: AsyncWrite + Unpin + Send,
    {
        let fetched = match self.upstream_url_for(req.target()) {
            Ok(url) => upstream::fetch(&url, CONNECT_TIMEOUT).await,
            Err(e) => Err(e),
        };
        let mut fetched = match fetched {
            Ok(response) => response,
            Err(e) => {
                warn!(request_target = %req.target(), error = %e, "Upstream fetch failed");
                return write_page(w, StatusCode::INTERNAL_SERVER_ERROR, SERVER_ERROR_PAGE).await;
            }
        };

        let mut headers = default_headers(0);
        headers.delete("Content-Length");
        headers.set("Transfer-Encoding", "chunked");
        headers.set("Trailer", "X-Content-SHA256");
        headers.set("Trailer", "X-Content-Length");
        if let Some(content_type) = fetched.headers.get("Content-Type") {
            headers.reset("Content-Type", content_type);
        }

        w.write_status_line(StatusCode::OK).await?;
        w.write_headers(&headers).await?;

        let mut hasher = Sha256::new();
        let mut forwarded = 0usize;
        loop {
            match fetched.next_chunk().await {
                Ok(Some(chunk)) => {
                    w.write_chunk(&chunk).await?;
                    hasher.update(&chunk);
                    forwarded += chunk.len();
                }
                Ok(None) => break,
                Err(e) => {
                    warn!(error = %e, "Upstream body ended abnormally");
                    break;
                }
            }
        }
        w.end_chunks().await?;

        let digest = hasher.finalize();
        let hex: String = digest.iter().map(|b| format!("{:02x}", b)).collect();
        headers.set("X-Content-SHA256", hex);
        headers.set("X-Content-Length", forwarded.to_string());
        w.write_trailers(&headers).await?;

        debug!(request_target = %req.target(), bytes = forwarded, "Proxied upstream response");
        Ok(())
    }
}

impl Handler for DemoHandler {
    async fn handle<W>(&self, w: &mut ResponseWriter<W>, req: &Request)
    where
        W: AsyncWrite + Unpin + Send,
    {
        let result = if req.target().starts_with("/httpbin/") {
            self.proxy(w, req).await
        } else {
            match req.target() {
                "/yourproblem" => write_page(w, StatusCode::BAD_REQUEST, BAD_REQUEST_PAGE).await,
                "/myproblem" => {
                    write_page(w, StatusCode::INTERNAL_SERVER_ERROR, SERVER_ERROR_PAGE).await
                }
                _ => write_page(w, StatusCode::OK, OK_PAGE).await,
            }
        };

        if let Err(e) = result {
            warn!(request_target = %req.target(), error = %e, "Failed to write response");
        }
    }
}

async fn write_page<W>(
    w: &mut ResponseWriter<W>,
    status: StatusCode,
    page: &str,
) -> Result<(), WriterError>
where
    W: AsyncWrite + Unpin + Send,
{
    let mut headers = default_headers(page.len());
    headers.reset("Content-Type", "text/html");

    w.write_status_line(status).await?;
    w.write_headers(&headers).await?;
    w.write_body(page.as_bytes()).await?;
    Ok(())
}
