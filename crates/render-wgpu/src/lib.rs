//! wgpu render backend for the city scene.
//!
//! Each layer owns its buffers and a uniform bind group and draws itself with
//! one of two programs: lit (position + normal) or flat (position only).
//! [`WgpuRenderer`] drives a frame: clear, set the viewport, draw every layer.
//!
//! # Invariants
//! - A layer's GPU resources are created once, when it enters the collection.
//! - No draw relies on bindings left behind by a previous layer.
//! - A program that fails to compile aborts only the layer that needed it.

mod gpu;
mod layer;
mod program;
pub mod shaders;

pub use gpu::{CLEAR_COLOR, WgpuRenderer};
pub use layer::{GpuBackend, GpuLayer, GpuLayerError};
pub use program::{
    DEPTH_FORMAT, LayerUniforms, NORMAL_LOCATION, POSITION_LOCATION, ProgramCache, ProgramSources,
    ShaderError, ShaderProgram, UNIFORM_BINDING,
};
