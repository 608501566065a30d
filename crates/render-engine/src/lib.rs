//! Splice Render Engine
//!
//! Turns a stream of session snapshots into draw calls:
//!
//! ```text
//! SessionStore ──► Arc<SessionSnapshot>
//!                        │
//!                        ├── active set (temporal query)
//!                        │        │
//!                        │        ├── SceneGraph nodes (create / destroy)
//!                        │        └── DecodeManager per video node
//!                        │
//!                        ├── overlay (animations + transitions)
//!                        ▼
//!                   Compositor ──► DrawList ──► RenderSurface
//!                        ▲
//!          Player / RenderLoop (preview)   ExportSession (blocking acquire)
//! ```
//!
//! Preview never waits for a frame; export waits a bounded time per frame
//! and records what it could not get.

pub mod compositor;
pub mod draw;
pub mod error;
pub mod export;
pub mod overlay;
pub mod playback;
pub mod render_loop;
pub mod scene;
pub mod store;

pub use compositor::{ComposeReport, Compositor, SeekReport, SourceFailure};
pub use draw::{DrawCommand, DrawList, DrawSource, RecordingSurface, RenderSurface};
pub use error::{RenderError, RenderResult};
pub use export::*;
pub use playback::{PlaybackState, Player};
pub use render_loop::{LoopStats, RenderLoop};
pub use scene::{Node, NodeId, SceneGraph};
pub use store::{Action, SessionStore, Subscription};
