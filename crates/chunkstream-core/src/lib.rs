//! Client-side chunk streaming core.
//!
//! Chunks of a large remote dataset are requested by key at a priority,
//! fetched concurrently under a fixed budget by `DownloadCoordinator`, and
//! kept in a byte-bounded LRU `ChunkCache`. Lower-priority work is never
//! starved: the scheduler picks a priority level at random with a geometric
//! bias towards level 0.

pub mod cache;
pub mod config;
pub mod coordinator;
pub mod error;
pub mod events;
pub mod fetch;
pub mod logging;
pub mod queue;
pub mod volume;

pub use cache::{ByteSize, CacheEntry, ChunkCache};
pub use config::{CacheConfig, CoordinatorConfig, StreamConfig, TransportSettings};
pub use coordinator::{DownloadCoordinator, DownloadState};
pub use error::ConfigError;
pub use events::{DownloadEvent, EventBus, EventKind, HandlerId};
pub use fetch::{CurlFetcher, DecodeError, Decoder, FetchError, Fetcher, RawBytes};
pub use queue::{LevelQueue, PriorityScheduler, ProbabilityMap};
pub use volume::{RawVolumeDecoder, Volume};
