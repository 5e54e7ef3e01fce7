use async_trait::async_trait;

use crate::error::MagpieError;

pub mod discord;

/// Destination for outbound text. One implementation per chat platform;
/// tests use a recording sink.
#[async_trait]
pub trait Delivery: Send + Sync {
    async fn send(&self, text: &str) -> Result<(), MagpieError>;
}
