//! Relay transport for the Mostro client.
//!
//! This crate intentionally exposes a small surface:
//! - relay publish/subscribe over WebSocket
//! - multi-relay pool fanout with deduplicated fetch

pub mod error;
pub mod pool;
pub mod relay;
pub mod subscription;

pub use error::{ClientError, Result};
pub use pool::{PoolConfig, RelayPool};
pub use relay::{ConnectionState, PublishConfirmation, RelayConfig, RelayConnection, RelayReply};
pub use subscription::Subscription;
