//! Radioport Core - Playback scheduling engine
//!
//! This crate decides what a simulated radio station plays next: the segment
//! catalog, rotation rules, session state, the playback clock and the
//! scheduler that ties them together. Audio output and rendering live in the
//! host; the [`deck`] module describes what the host's audio driver provides.

pub mod catalog;
pub mod clock;
pub mod config;
pub mod deck;
pub mod rotation;
pub mod scheduler;
pub mod segment;
pub mod session;

pub use catalog::{ Catalog, CatalogBuilder, CatalogError, StationProfile };
pub use clock::PlaybackClock;
pub use config::{ CategoryRule, ConfigError, RotationConfig };
pub use deck::{ Deck, PlaybackHandle, SegmentSink, SinkError, SinkStatus };
pub use rotation::{ RotationError, RotationPolicy };
pub use scheduler::{ EndReason, NowPlaying, QueueEntry, ScheduleEvent, Scheduler, SchedulerError, SchedulerState };
pub use segment::{ format_duration, Category, Segment, SegmentId };
pub use session::{ PlayHistory, SessionState };
