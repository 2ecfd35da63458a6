//! In-process transport for single-node deployments and tests.

use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use bytes::Bytes;
use tokio::sync::broadcast;

use meshbus_core::AppResult;
use meshbus_core::error::AppError;
use meshbus_core::types::TransportMask;

use super::Transport;

/// A frame handed to the transport.
#[derive(Debug, Clone)]
pub struct SentFrame {
    /// Destination endpoint
    pub endpoint: String,
    /// Marshaled message
    pub frame: Bytes,
}

/// Loopback transport that records every frame and publishes it to
/// subscribers.
#[derive(Debug)]
pub struct MemoryTransport {
    mask: TransportMask,
    sent: Mutex<Vec<SentFrame>>,
    tx: broadcast::Sender<SentFrame>,
    failing: AtomicBool,
}

impl MemoryTransport {
    /// Creates a transport claiming `mask`.
    pub fn new(mask: TransportMask, buffer_size: usize) -> Self {
        let (tx, _) = broadcast::channel(buffer_size.max(1));
        Self {
            mask,
            sent: Mutex::new(Vec::new()),
            tx,
            failing: AtomicBool::new(false),
        }
    }

    /// Receives every frame sent from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<SentFrame> {
        self.tx.subscribe()
    }

    /// Frames sent so far.
    pub fn sent(&self) -> Vec<SentFrame> {
        self.sent
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// Makes every subsequent send fail, simulating a dead link.
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }
}

#[async_trait]
impl Transport for MemoryTransport {
    fn name(&self) -> &str {
        "memory"
    }

    fn mask(&self) -> TransportMask {
        self.mask
    }

    async fn send(&self, endpoint: &str, frame: Bytes) -> AppResult<()> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(AppError::no_endpoint(format!("Link to {endpoint} is down")));
        }
        let sent = SentFrame {
            endpoint: endpoint.to_string(),
            frame,
        };
        self.sent
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(sent.clone());
        let _ = self.tx.send(sent);
        Ok(())
    }
}
