//! Input: UI controls and key presses become [`Action`]s.
//!
//! # Invariants
//! - Camera actions only touch [`cityscape_common::CameraState`].
//! - Scene actions only produce [`cityscape_kernel::SceneCommand`]s; they never
//!   mutate the layer collection directly.

pub mod action;

pub use action::{Action, MAX_ZOOM_PERCENT, MIN_ZOOM_PERCENT};
