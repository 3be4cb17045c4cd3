//! IP-keyed playback state cache — spec.md §4.4.

mod cache;
mod traits;
mod types;

pub use cache::StateCache;
pub use traits::{StateProvider, StateSink};
pub use types::{PlaybackState, PlaybackStatePatch, Source, TransportState};
