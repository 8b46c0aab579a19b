//! Scene kernel: the named layer collection and the commands that mutate it.
//!
//! # Invariants
//! - The centroid is the mean of every vertex of every layer, recomputed on
//!   each add, overwrite, remove, and clear. It is `(0, 0, 0)` when empty.
//! - Layers are drawn in insertion order; overwriting keeps the position.
//! - A failed insert leaves the collection unchanged.
//! - Scene mutations arrive as [`SceneCommand`]s and are applied between frames.

pub mod collection;
pub mod command;

pub use collection::{CpuBackend, LayerBackend, LayerCollection, SceneError, SceneLayer};
pub use command::{ApplyReport, CommandQueue, NamedLayer, SceneCommand};
