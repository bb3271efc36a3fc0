// Notification sink
//
// Structured events come out of the decision loop; the persona layer turns
// them into channel text; `TelegramNotifier` delivers it. Delivery is
// best-effort: the loop logs failures and moves on.
pub mod persona;
pub mod telegram;

use async_trait::async_trait;

use crate::error::BotError;

pub use persona::{BotEvent, MessageComposer};
pub use telegram::{CommandListener, TelegramNotifier};

/// Outbound message channel
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, text: &str) -> Result<(), BotError>;
}
