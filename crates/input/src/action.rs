use cityscape_common::{CameraState, ProjectionMode};
use cityscape_kernel::SceneCommand;
use std::path::PathBuf;

pub const MIN_ZOOM_PERCENT: f32 = 1.0;
pub const MAX_ZOOM_PERCENT: f32 = 200.0;

/// A high-level action produced by a UI control or a key binding.
#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    /// Set the user rotation about Z, in degrees.
    SetRotation(f32),
    /// Set the zoom, in percent.
    SetZoom(f32),
    SetProjection(ProjectionMode),
    ToggleProjection,
    /// Toggle the small animated X/Y tilt.
    ToggleSpin,
    /// Read a city file and add its layers.
    LoadFile(PathBuf),
    RemoveLayer(String),
    ClearLayers,
    /// No-op (used for input mapping that hasn't been bound yet).
    Noop,
}

impl Action {
    /// Apply a camera action. Returns `true` if the camera changed.
    pub fn apply_to_camera(&self, camera: &mut CameraState) -> bool {
        let before = *camera;
        match *self {
            Action::SetRotation(degrees) => {
                camera.rotation_degrees = degrees.clamp(0.0, 360.0);
            }
            Action::SetZoom(percent) => {
                camera.zoom_percent = percent.clamp(MIN_ZOOM_PERCENT, MAX_ZOOM_PERCENT);
            }
            Action::SetProjection(mode) => camera.projection = mode,
            Action::ToggleProjection => camera.projection = camera.projection.toggled(),
            Action::ToggleSpin => {
                camera.auto_spin = !camera.auto_spin;
                if !camera.auto_spin {
                    camera.reset_tilt();
                }
            }
            _ => return false,
        }
        let changed = *camera != before;
        if changed {
            tracing::debug!(action = ?self, "camera updated");
        }
        changed
    }

    /// The scene command for a scene action, if this is one.
    pub fn scene_command(&self) -> Option<SceneCommand> {
        match self {
            Action::RemoveLayer(name) => Some(SceneCommand::RemoveLayer(name.clone())),
            Action::ClearLayers => Some(SceneCommand::Clear),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rotation_and_zoom_are_clamped() {
        let mut cam = CameraState::default();
        assert!(Action::SetRotation(400.0).apply_to_camera(&mut cam));
        assert_eq!(cam.rotation_degrees, 360.0);
        assert!(Action::SetZoom(0.0).apply_to_camera(&mut cam));
        assert_eq!(cam.zoom_percent, MIN_ZOOM_PERCENT);
        Action::SetZoom(500.0).apply_to_camera(&mut cam);
        assert_eq!(cam.zoom_percent, MAX_ZOOM_PERCENT);
    }

    #[test]
    fn projection_actions() {
        let mut cam = CameraState::default();
        assert!(Action::ToggleProjection.apply_to_camera(&mut cam));
        assert_eq!(cam.projection, ProjectionMode::Orthographic);
        assert!(!Action::SetProjection(ProjectionMode::Orthographic).apply_to_camera(&mut cam));
        Action::SetProjection(ProjectionMode::Perspective).apply_to_camera(&mut cam);
        assert_eq!(cam.projection, ProjectionMode::Perspective);
    }

    #[test]
    fn toggling_spin_off_resets_tilt() {
        let mut cam = CameraState::default();
        Action::ToggleSpin.apply_to_camera(&mut cam);
        assert!(cam.auto_spin);
        cam.advance(0.5);
        Action::ToggleSpin.apply_to_camera(&mut cam);
        assert!(!cam.auto_spin);
        assert_eq!(cam.tilt, CameraState::default().tilt);
    }

    #[test]
    fn scene_actions_leave_camera_alone() {
        let mut cam = CameraState::default();
        let action = Action::RemoveLayer("water".into());
        assert!(!action.apply_to_camera(&mut cam));
        assert_eq!(
            action.scene_command(),
            Some(SceneCommand::RemoveLayer("water".into()))
        );
        assert_eq!(Action::ClearLayers.scene_command(), Some(SceneCommand::Clear));
        assert_eq!(Action::Noop.scene_command(), None);
        assert_eq!(Action::LoadFile("city.json".into()).scene_command(), None);
    }
}
