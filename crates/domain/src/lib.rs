//! crosspost domain crate
//!
//! This crate contains the core domain logic following hexagonal architecture:
//! - `model`: Domain entities and value objects
//! - `ports`: Trait definitions for external dependencies (adapters)
//! - `schedule`: Weekly recurrence rule for queued delivery
//! - `state`: Typed view over a persisted JSON document
//! - `usecases`: Tracker, queue, cooldowns and the publish cycle

pub mod model;
pub mod ports;
pub mod schedule;
pub mod state;
pub mod usecases;

#[cfg(test)]
pub(crate) mod testing;

pub use model::*;
pub use ports::*;
pub use schedule::{ScheduleError, ScheduleSlot, WeeklySchedule};
