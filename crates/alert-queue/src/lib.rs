//! Alert delivery queue.
//!
//! Merges a bulk fetch and a live subscription into one deduplicated FIFO,
//! shows exactly one alert at a time for a configured duration, then marks
//! it shown upstream and removes it after a short settle delay.

pub mod alert;
pub mod duration;
pub mod scheduler;
pub mod source;
pub mod state;

mod ack;
mod binding;

pub use alert::{Alert, AlertId};
pub use duration::{DEFAULT_DISPLAY_DURATION, SETTLE_DELAY, display_duration};
pub use scheduler::{AlertQueue, QueueSnapshot};
pub use source::{AlertSource, Subscription};
pub use state::{Effect, Phase, QueueEvent, QueueState};

/// Errors surfaced by the [`AlertQueue`] handle.
#[derive(Debug, thiserror::Error)]
pub enum QueueError {
    #[error("alert queue worker has stopped")]
    Closed,
}
