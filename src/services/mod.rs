// Service exports
pub mod persistence;
pub mod profiles;

pub use persistence::{JsonLinesSink, MatchSink, SinkError};
pub use profiles::{InMemoryProfileStore, ProfileStore, StoreError};
