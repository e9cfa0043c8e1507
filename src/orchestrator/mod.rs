//! Orchestration engine: stage planning, concurrent execution and
//! progress notification.

pub mod notifier;
pub mod plan;
pub mod scheduler;

pub use notifier::{ChannelNotifier, JsonLinesNotifier, Notifier, ProgressBarNotifier};
pub use scheduler::Scheduler;
