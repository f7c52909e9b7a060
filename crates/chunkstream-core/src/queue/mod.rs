//! Priority queueing of chunk keys.
//!
//! `LevelQueue` is the per-level FIFO; `PriorityScheduler` stacks one per
//! priority level and picks the next key with a geometric probability
//! distribution, so low-priority work is not starved.

mod level;
mod priority;
mod probability;

pub use level::LevelQueue;
pub use priority::PriorityScheduler;
pub use probability::ProbabilityMap;
