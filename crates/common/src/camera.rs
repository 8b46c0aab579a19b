use glam::Vec2;
use serde::{Deserialize, Serialize};

/// Amplitude of the animated X/Y tilt, in radians (5 degrees).
const SPIN_AMPLITUDE: f32 = 5.0 * std::f32::consts::PI / 180.0;
/// Phase advance of the tilt animation, radians per second.
const SPIN_RATE: f32 = 0.8;

/// How the scene is projected onto the viewport.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ProjectionMode {
    #[default]
    Perspective,
    Orthographic,
}

impl ProjectionMode {
    pub fn toggled(self) -> Self {
        match self {
            ProjectionMode::Perspective => ProjectionMode::Orthographic,
            ProjectionMode::Orthographic => ProjectionMode::Perspective,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            ProjectionMode::Perspective => "Perspective",
            ProjectionMode::Orthographic => "Orthographic",
        }
    }
}

impl std::fmt::Display for ProjectionMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown projection mode {0:?} (expected \"perspective\" or \"orthographic\")")]
pub struct ParseProjectionError(pub String);

impl std::str::FromStr for ProjectionMode {
    type Err = ParseProjectionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "perspective" => Ok(ProjectionMode::Perspective),
            "orthographic" | "ortho" => Ok(ProjectionMode::Orthographic),
            _ => Err(ParseProjectionError(s.to_string())),
        }
    }
}

/// Interactive camera parameters, mutated by UI controls and read once per frame.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CameraState {
    /// User rotation about Z, added to the fixed 45 degree base.
    pub rotation_degrees: f32,
    /// Zoom in percent; 100 is the reference camera distance.
    pub zoom_percent: f32,
    pub projection: ProjectionMode,
    /// Animated offsets added to the fixed X and Y rotations, radians.
    pub tilt: Vec2,
    pub auto_spin: bool,
    spin_phase: f32,
}

impl Default for CameraState {
    fn default() -> Self {
        Self {
            rotation_degrees: 60.0,
            zoom_percent: 60.0,
            projection: ProjectionMode::Perspective,
            tilt: Vec2::ZERO,
            auto_spin: false,
            spin_phase: 0.0,
        }
    }
}

impl CameraState {
    /// Zoom percentage divided by 100.
    pub fn zoom_fraction(&self) -> f32 {
        self.zoom_percent / 100.0
    }

    /// Advance the tilt animation by `dt` seconds. No-op unless `auto_spin` is set.
    pub fn advance(&mut self, dt: f32) {
        if !self.auto_spin {
            return;
        }
        self.spin_phase = (self.spin_phase + SPIN_RATE * dt) % std::f32::consts::TAU;
        self.tilt = Vec2::new(
            SPIN_AMPLITUDE * self.spin_phase.sin(),
            SPIN_AMPLITUDE * self.spin_phase.cos() - SPIN_AMPLITUDE,
        );
    }

    pub fn reset_tilt(&mut self) {
        self.tilt = Vec2::ZERO;
        self.spin_phase = 0.0;
    }
}
