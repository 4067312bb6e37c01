use std::net::SocketAddr;

use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use tracing::{debug, warn};

use crate::http::parser::{read_request, ParseError};
use crate::http::response::{default_headers, StatusCode};
use crate::http::writer::ResponseWriter;
use crate::server::handler::Handler;

/// One accepted client connection, served exactly once and then closed.
pub struct Connection {
    stream: TcpStream,
    peer: SocketAddr,
}

impl Connection {
    pub fn new(stream: TcpStream, peer: SocketAddr) -> Self {
        Self { stream, peer }
    }

    pub async fn run<H: Handler>(mut self, handler: &H) -> anyhow::Result<()> {
        let request = match read_request(&mut self.stream).await {
            Ok(request) => request,
            Err(e) if e.is_malformed_input() => {
                warn!(peer = %self.peer, error = %e, "Malformed request");
                let mut writer = ResponseWriter::new(&mut self.stream);
                if let Err(write_err) = write_bad_request(&mut writer, &e).await {
                    debug!(peer = %self.peer, error = %write_err, "Could not send 400 response");
                }
                self.close().await;
                return Ok(());
            }
            Err(e) => {
                self.close().await;
                return Err(e.into());
            }
        };

        debug!(
            peer = %self.peer,
            method = %request.method(),
            request_target = %request.target(),
            "Dispatching request"
        );

        let mut writer = ResponseWriter::new(&mut self.stream);
        handler.handle(&mut writer, &request).await;
        debug!(peer = %self.peer, state = %writer.state(), "Handler finished");

        self.close().await;
        Ok(())
    }

    async fn close(&mut self) {
        if let Err(e) = self.stream.shutdown().await {
            debug!(peer = %self.peer, error = %e, "Failed to shut down connection");
        }
    }
}

async fn write_bad_request(
    writer: &mut ResponseWriter<&mut TcpStream>,
    cause: &ParseError,
) -> anyhow::Result<()> {
    let message = format!("{}\n", cause);
    writer.write_status_line(StatusCode::BAD_REQUEST).await?;
    writer
        .write_headers(&default_headers(message.len()))
        .await?;
    writer.write_body(message.as_bytes()).await?;
    Ok(())
}
