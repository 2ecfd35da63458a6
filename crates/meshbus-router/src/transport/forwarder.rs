//! Drains a remote endpoint's inbound queue onto its transport.

use std::sync::Arc;

use bytes::Bytes;
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::endpoint::EndpointRegistry;
use crate::message::types::Message;

use super::Transport;

/// Spawns the forwarding task for `endpoint`.
///
/// A send failure reports the endpoint as lost; the registry then cleans
/// its sessions with reason "remote end closed abruptly".
pub fn spawn_forwarder(
    endpoint: String,
    mut queue: mpsc::Receiver<Message>,
    transport: Arc<dyn Transport>,
    registry: Arc<EndpointRegistry>,
    mut shutdown: broadcast::Receiver<()>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            let msg = tokio::select! {
                _ = shutdown.recv() => break,
                msg = queue.recv() => match msg {
                    Some(msg) => msg,
                    None => break,
                },
            };

            let frame = match serde_json::to_vec(&msg) {
                Ok(bytes) => Bytes::from(bytes),
                Err(e) => {
                    warn!(endpoint = %endpoint, error = %e, "Failed to marshal message, dropping");
                    continue;
                }
            };

            if let Err(e) = transport.send(&endpoint, frame).await {
                warn!(
                    endpoint = %endpoint,
                    transport = transport.name(),
                    error = %e,
                    "Transport send failed, dropping endpoint"
                );
                registry.unregister(&endpoint);
                break;
            }
        }
        debug!(endpoint = %endpoint, "Forwarder ended");
    })
}
