//! Application use cases / business logic

pub mod cooldown;
pub mod publish_cycle;
pub mod queue;
pub mod tracker;

pub use cooldown::{CooldownBook, CooldownError};
pub use publish_cycle::{CycleConfig, CycleError, PublishCycle};
pub use queue::{PostQueue, QueueError};
pub use tracker::{PostTracker, TrackingError};
