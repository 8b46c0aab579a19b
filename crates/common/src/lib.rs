//! Shared types for the cityscape renderer.
//!
//! # Invariants
//! - A [`LayerGeometry`] that exists is valid: every index addresses a vertex,
//!   lit layers carry exactly one normal per vertex.
//! - Camera state is plain data; transforms are derived from it elsewhere.

pub mod camera;
pub mod geometry;

pub use camera::{CameraState, ParseProjectionError, ProjectionMode};
pub use geometry::{Color, GeometryError, LayerGeometry, LayerKind, Shading};
