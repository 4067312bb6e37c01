use std::net::{Ipv4Addr, SocketAddr};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use anyhow::Context;
use tokio::net::{TcpListener, ToSocketAddrs};
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::http::connection::Connection;
use crate::server::handler::Handler;

/// Handle to a running server.
///
/// The accept loop runs on its own task and owns the listening socket;
/// [`Server::close`] stops it and releases the port.
pub struct Server {
    local_addr: SocketAddr,
    closed: Arc<AtomicBool>,
    shutdown: Arc<Notify>,
    accept_task: Option<JoinHandle<()>>,
}

/// Starts serving `handler` on every interface at `port`.
///
/// Port 0 asks the OS for a free port; see [`Server::local_addr`].
pub async fn serve<H: Handler>(port: u16, handler: H) -> anyhow::Result<Server> {
    Server::bind((Ipv4Addr::UNSPECIFIED, port), handler).await
}

impl Server {
    pub async fn bind<A, H>(addr: A, handler: H) -> anyhow::Result<Server>
    where
        A: ToSocketAddrs,
        H: Handler,
    {
        let listener = TcpListener::bind(addr)
            .await
            .context("failed to bind listening socket")?;
        let local_addr = listener.local_addr()?;
        info!("Listening on {}", local_addr);

        let closed = Arc::new(AtomicBool::new(false));
        let shutdown = Arc::new(Notify::new());
        let accept_task = tokio::spawn(accept_loop(
            listener,
            Arc::new(handler),
            closed.clone(),
            shutdown.clone(),
        ));

        Ok(Server {
            local_addr,
            closed,
            shutdown,
            accept_task: Some(accept_task),
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Stops accepting connections and waits until the listening socket has
    /// been dropped. Connections already being served run to completion.
    ///
    /// Calling it again after a successful close does nothing.
    pub async fn close(&mut self) -> anyhow::Result<()> {
        let Some(accept_task) = self.accept_task.take() else {
            return Ok(());
        };

        self.closed.store(true, Ordering::SeqCst);
        self.shutdown.notify_one();
        accept_task.await.context("accept loop terminated abnormally")?;

        info!("Server on {} closed", self.local_addr);
        Ok(())
    }
}

impl Drop for Server {
    fn drop(&mut self) {
        if self.accept_task.is_some() {
            self.closed.store(true, Ordering::SeqCst);
            self.shutdown.notify_one();
        }
    }
}

async fn accept_loop<H: Handler>(
    listener: TcpListener,
    handler: Arc<H>,
    closed: Arc<AtomicBool>,
    shutdown: Arc<Notify>,
) {
    loop {
        if closed.load(Ordering::SeqCst) {
            break;
        }

        let accepted = tokio::select! {
            res = listener.accept() => res,
            _ = shutdown.notified() => break,
        };

        let (socket, peer) = match accepted {
            Ok(conn) => conn,
            Err(e) => {
                if closed.load(Ordering::SeqCst) {
                    break;
                }
                warn!(error = %e, "Failed to accept connection");
                continue;
            }
        };
        info!("Accepted connection from {}", peer);

        let handler = handler.clone();
        tokio::spawn(async move {
            let conn = Connection::new(socket, peer);
            if let Err(e) = conn.run(handler.as_ref()).await {
                error!("Connection error from {}: {}", peer, e);
            }
        });
    }

    debug!("Accept loop stopped");
}
