//! Rendering adapter: frame transforms and a renderer-agnostic interface.
//!
//! # Invariants
//! - Renderers read the layer collection and a [`RenderContext`]; they never
//!   mutate either.
//! - Model, view, and projection are recomputed from the context on every
//!   draw and never carried between frames.

mod renderer;
pub mod transform;

pub use renderer::{DebugTextRenderer, Renderer};
pub use transform::{FrameTransforms, RenderContext, Viewport};
