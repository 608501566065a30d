//! Splice Timeline Model
//!
//! Defines the shared, versioned snapshot of timeline content and the pure
//! functions that query it:
//! - **Effects:** Timed video/audio/image/text units placed on tracks
//! - **Transitions, animations, filters:** Rules layered on top of effects
//! - **Snapshot:** The consistent view every component reads per tick
//! - **Query:** "What is visible, and with what padding, at timecode T"
//!
//! Timeline positions are milliseconds (`f64`). Transform rectangles are
//! normalized to `[0.0, 1.0]` relative to the output canvas.

pub mod animation;
pub mod effect;
pub mod filter;
pub mod query;
pub mod snapshot;
pub mod track;
pub mod transform;
pub mod transition;

pub use animation::*;
pub use effect::*;
pub use filter::*;
pub use query::*;
pub use snapshot::*;
pub use track::*;
pub use transform::*;
pub use transition::*;
