use std::sync::Mutex;

use crate::config::SocketOptions;
use crate::proxy::client::ClientHandler;

/// Reuse pool for [`ClientHandler`]s.
///
/// Lending semantics guarantee at-most-one concurrent holder: `acquire`
/// moves a handler out, `release` moves it back. A handler returned with
/// its error flag set is dropped instead of retained, so an outbound socket
/// that went through a failed session never re-enters rotation.
pub struct HandlerPool {
    options: SocketOptions,
    idle: Mutex<Vec<ClientHandler>>,
}

impl HandlerPool {
    pub fn new(options: SocketOptions) -> Self {
        Self {
            options,
            idle: Mutex::new(Vec::new()),
        }
    }

    /// Lends an idle handler, creating a fresh one when none is available.
    pub fn acquire(&self) -> ClientHandler {
        self.idle
            .lock()
            .expect("handler pool poisoned")
            .pop()
            .unwrap_or_else(|| ClientHandler::new(self.options.clone()))
    }

    /// Returns a handler: errored handlers are disposed, healthy ones are
    /// cleaned and kept.
    pub fn release(&self, mut handler: ClientHandler) {
        if handler.has_error() {
            // dropping disposes the outbound connection with it
            return;
        }

        handler.clean();
        self.idle
            .lock()
            .expect("handler pool poisoned")
            .push(handler);
    }

    pub fn idle_count(&self) -> usize {
        self.idle.lock().expect("handler pool poisoned").len()
    }
}
