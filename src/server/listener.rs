use socket2::{Domain, Protocol, Socket, Type};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::net::TcpListener;
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::config::Config;
use crate::proxy::{HandlerPool, RequestProcessor};
use crate::server::Connection;

/// The proxy server: accept loop, session fan-out and lifecycle.
///
/// One instance serves one `start`/`stop` cycle. The accept loop never
/// blocks on request processing — every accepted socket gets its own task,
/// gated only by the connection limit and the listener backlog.
pub struct ProxyServer {
    config: Config,
    pool: Arc<HandlerPool>,
    processor: Arc<RequestProcessor>,
    clients: Arc<AtomicUsize>,
    active: AtomicBool,
    cancel: CancellationToken,
    bound_addr: Mutex<Option<SocketAddr>>,
}

impl ProxyServer {
    pub fn new(config: Config) -> Self {
        let pool = Arc::new(HandlerPool::new(config.socket.clone()));
        let processor = Arc::new(RequestProcessor::new(&config));

        Self {
            config,
            pool,
            processor,
            clients: Arc::new(AtomicUsize::new(0)),
            active: AtomicBool::new(false),
            cancel: CancellationToken::new(),
            bound_addr: Mutex::new(None),
        }
    }

    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }

    /// Address the listener actually bound, once `start` got that far.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        *self.bound_addr.lock().expect("bound_addr poisoned")
    }

    /// Currently connected clients.
    pub fn client_count(&self) -> usize {
        self.clients.load(Ordering::SeqCst)
    }

    /// Binds the listener and runs the accept loop until [`stop`](Self::stop)
    /// is called. Fails if the server is already active or the port cannot
    /// be bound.
    pub async fn start(&self, port: u16) -> anyhow::Result<()> {
        if self.active.swap(true, Ordering::SeqCst) {
            anyhow::bail!("proxy server has already started");
        }

        info!(port, "starting proxy server");

        let listener = bind_listener(port, self.config.backlog)?;
        let local_addr = listener.local_addr()?;
        *self.bound_addr.lock().expect("bound_addr poisoned") = Some(local_addr);

        info!("listening on {local_addr}");

        // connection limit is fixed at listener construction, never mutated
        let limit = Arc::new(Semaphore::new(self.config.connection_limit));

        loop {
            let (socket, peer) = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => break,
                accepted = listener.accept() => match accepted {
                    Ok(pair) => pair,
                    Err(e) => {
                        error!(error = %e, "accept failed");
                        continue;
                    }
                },
            };

            let permit = match limit.clone().try_acquire_owned() {
                Ok(permit) => permit,
                Err(_) => {
                    warn!(client = %peer, "connection limit reached, dropping client");
                    continue;
                }
            };

            let mut handler = self.pool.acquire();
            handler.bind_client(Connection::accepted(socket, self.config.socket.clone()));

            let connected = self.clients.fetch_add(1, Ordering::SeqCst) + 1;
            info!(client = %peer, clients = connected, "client connected");

            let pool = self.pool.clone();
            let processor = self.processor.clone();
            let clients = self.clients.clone();
            let cancel = self.cancel.clone();

            tokio::spawn(async move {
                let _permit = permit;

                processor.process(&mut handler, &cancel).await;

                clients.fetch_sub(1, Ordering::SeqCst);
                info!(client = %peer, "session ended");

                pool.release(handler);
            });
        }

        info!("proxy server stopped");
        Ok(())
    }

    /// Cancels all in-flight work and stops accepting. Fails if the server
    /// was never started.
    pub fn stop(&self) -> anyhow::Result<()> {
        if !self.is_active() {
            anyhow::bail!("proxy server is not active");
        }

        self.cancel.cancel();
        Ok(())
    }
}

/// Binds 0.0.0.0 with the operator-configured backlog. Address reuse stays
/// disabled.
fn bind_listener(port: u16, backlog: i32) -> anyhow::Result<TcpListener> {
    let socket = Socket::new(Domain::IPV4, Type::STREAM, Some(Protocol::TCP))?;
    socket.set_nonblocking(true)?;

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    socket.bind(&addr.into())?;
    socket.listen(backlog)?;

    Ok(TcpListener::from_std(socket.into())?)
}
