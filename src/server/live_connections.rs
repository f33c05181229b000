//! Count of connections currently being served.

use std::sync::{Arc, Mutex};

use tracing::info;

#[derive(Debug, Default)]
pub struct LiveConnections {
    count: Mutex<usize>,
}

impl LiveConnections {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Registers a new connection. The count drops again when the guard is dropped,
    /// however the handler ends.
    pub fn enter(self: &Arc<Self>) -> ConnectionGuard {
        let mut count = self.count.lock().unwrap();
        *count += 1;
        info!("Number of active connections: {}", *count);
        ConnectionGuard {
            connections: self.clone(),
        }
    }

    pub fn current(&self) -> usize {
        *self.count.lock().unwrap()
    }

    fn leave(&self) {
        let mut count = self.count.lock().unwrap();
        *count = count.saturating_sub(1);
        info!("Number of active connections: {}", *count);
    }
}

pub struct ConnectionGuard {
    connections: Arc<LiveConnections>,
}

impl Drop for ConnectionGuard {
    fn drop(&mut self) {
        self.connections.leave();
    }
}
