//! Session-scoped real-time channel.
//!
//! Each session gets its own channel handle with a lifecycle tied to
//! session start and end; nothing here is process-global, so events from
//! one session cannot leak into another. Outbound events go through a
//! [`ChannelSink`], inbound events arrive on a plain receiver the session
//! loop drains.

mod events;
mod memory;
mod websocket;

pub use events::{InboundEvent, OutboundEvent, UploadingStatus};
pub use memory::{MemoryChannel, MemoryRemote, MemorySink};
pub use websocket::WsChannel;

use async_trait::async_trait;

use rangelink_core::Result;

/// Outbound half of the real-time channel.
#[async_trait]
pub trait ChannelSink: Send + Sync {
    async fn send(&self, event: OutboundEvent) -> Result<()>;
}
