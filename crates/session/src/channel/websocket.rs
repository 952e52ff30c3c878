//! WebSocket-backed real-time channel.

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tracing::{debug, error, info, warn};

use rangelink_core::{Error, Result};

use super::{ChannelSink, InboundEvent, OutboundEvent};

/// WebSocket channel to the processing service, one per session.
///
/// Writing goes through an internal queue drained by a forward task, so
/// `send` never blocks on the socket; a reader task parses inbound frames
/// and hands them to the session loop. Both tasks end when the socket
/// closes or the channel is closed.
pub struct WsChannel {
    out_tx: mpsc::Sender<String>,
    forward_task: JoinHandle<()>,
    read_task: JoinHandle<()>,
}

impl WsChannel {
    /// Connect and return the channel plus the inbound event receiver.
    pub async fn connect(url: &str) -> Result<(Self, mpsc::UnboundedReceiver<InboundEvent>)> {
        let (ws_stream, _) = connect_async(url)
            .await
            .map_err(|e| Error::Channel(format!("connect to {url} failed: {e}")))?;
        info!(url, "real-time channel connected");

        let (mut ws_tx, mut ws_rx) = ws_stream.split();
        let (out_tx, mut out_rx) = mpsc::channel::<String>(128);
        let (in_tx, in_rx) = mpsc::unbounded_channel();

        let forward_task = tokio::spawn(async move {
            while let Some(frame) = out_rx.recv().await {
                if let Err(e) = ws_tx.send(Message::Text(frame)).await {
                    error!("failed to send channel frame: {e}");
                    break;
                }
            }
        });

        let read_task = tokio::spawn(async move {
            while let Some(msg) = ws_rx.next().await {
                let frame = match msg {
                    Ok(Message::Text(text)) => text,
                    Ok(Message::Close(_)) => {
                        info!("real-time channel closed by server");
                        break;
                    }
                    Ok(_) => continue,
                    Err(e) => {
                        warn!("real-time channel read error: {e}");
                        break;
                    }
                };
                match InboundEvent::from_frame(&frame) {
                    Ok(Some(event)) => {
                        if in_tx.send(event).is_err() {
                            debug!("inbound receiver dropped, stopping reader");
                            break;
                        }
                    }
                    Ok(None) => {}
                    Err(e) => warn!("dropping malformed channel frame: {e}"),
                }
            }
        });

        Ok((
            Self {
                out_tx,
                forward_task,
                read_task,
            },
            in_rx,
        ))
    }

    /// Tear the channel down. Idempotent from the caller's perspective
    /// since it consumes the handle.
    pub fn close(self) {
        self.forward_task.abort();
        self.read_task.abort();
    }
}

#[async_trait]
impl ChannelSink for WsChannel {
    async fn send(&self, event: OutboundEvent) -> Result<()> {
        self.out_tx
            .send(event.to_frame())
            .await
            .map_err(|_| Error::Channel("channel writer is gone".to_string()))
    }
}
