//! Command implementations for nomad-watch

pub mod allocs;
pub mod dispatch;
pub mod events;
pub mod jobs;
pub mod logs;
pub mod scale;
mod watch;

pub use allocs::allocs;
pub use dispatch::dispatch;
pub use events::events;
pub use jobs::{job, jobs};
pub use logs::logs;
pub use scale::scale;
