//! Editor-side collaborators of a live session.
//!
//! The live protocol only touches the editor through the traits in
//! [`traits`]. [`memory`] provides a small in-memory editor used by the
//! standalone server and by tests; [`bridge`] turns received tile batches
//! into attributed actions.

pub mod action;
pub mod bridge;
pub mod leaf;
pub mod memory;
pub mod observer;
pub mod traits;

pub use action::{Action, ActionKind, Change};
pub use leaf::Leaf;
pub use memory::{MemoryEditor, MemoryMap};
pub use observer::{LiveObserver, LogLine, NullObserver, RefreshCause, TracingObserver};
pub use traits::{ActionQueue, AssetLoadError, AssetLoader, LiveEditor, LiveMap};
