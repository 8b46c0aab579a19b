//! Model, view, and projection matrices derived from camera state.
//!
//! Clip space follows wgpu: right-handed, depth in `[0, 1]`.

use cityscape_common::{CameraState, ProjectionMode};
use glam::{Mat4, Vec2, Vec3};

/// Uniform model scale.
pub const MODEL_SCALE: f32 = 0.5;
/// Vertical field of view for the perspective projection, degrees.
pub const FOV_Y_DEGREES: f32 = 45.0;
pub const PERSPECTIVE_NEAR: f32 = 1.0;
pub const PERSPECTIVE_FAR: f32 = 40_000.0;
/// Orthographic half-extents at 100% zoom.
pub const ORTHO_HALF_WIDTH: f32 = 5_000.0;
pub const ORTHO_HALF_HEIGHT: f32 = 800.0;
pub const ORTHO_NEAR: f32 = 0.0;
pub const ORTHO_FAR: f32 = 25_000.0;
/// Camera offset from the centroid along each axis at 100% zoom.
pub const EYE_OFFSET: f32 = 4_200.0;
/// Lower bound on the zoom fraction used by view and projection.
pub const MIN_ZOOM_FRACTION: f32 = 0.01;

/// Render target size in physical pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Viewport {
    pub width: u32,
    pub height: u32,
}

impl Viewport {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    pub fn aspect(&self) -> f32 {
        self.width.max(1) as f32 / self.height.max(1) as f32
    }
}

impl Default for Viewport {
    fn default() -> Self {
        Self::new(1280, 720)
    }
}

/// Everything a layer needs to compute its transforms for one frame.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct RenderContext {
    pub camera: CameraState,
    pub viewport: Viewport,
}

impl RenderContext {
    pub fn new(camera: CameraState, viewport: Viewport) -> Self {
        Self { camera, viewport }
    }

    pub fn transforms(&self, centroid: Vec3) -> FrameTransforms {
        FrameTransforms::compute(&self.camera, self.viewport, centroid)
    }
}

/// The three matrices uploaded with every layer draw.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameTransforms {
    pub model: Mat4,
    pub view: Mat4,
    pub projection: Mat4,
}

impl FrameTransforms {
    pub fn compute(camera: &CameraState, viewport: Viewport, centroid: Vec3) -> Self {
        let zf = camera.zoom_fraction();
        Self {
            model: model_matrix(camera.rotation_degrees, camera.tilt),
            view: view_matrix(centroid, zf),
            projection: projection_matrix(camera.projection, viewport.aspect(), zf),
        }
    }

    /// `projection * view * model`.
    pub fn model_view_projection(&self) -> Mat4 {
        self.projection * self.view * self.model
    }
}

/// Scale first, then rotate about X, Y, Z, then translate (by zero).
///
/// `tilt` is the animated offset added to the X and Y rotations, in radians.
pub fn model_matrix(rotation_degrees: f32, tilt: Vec2) -> Mat4 {
    let scale = Mat4::from_scale(Vec3::splat(MODEL_SCALE));
    let rotate_x = Mat4::from_rotation_x(45.0_f32.to_radians() + tilt.x);
    let rotate_y = Mat4::from_rotation_y((-45.0_f32).to_radians() + tilt.y);
    let rotate_z = Mat4::from_rotation_z((45.0 + rotation_degrees).to_radians());
    let position = Mat4::from_translation(Vec3::ZERO);

    position * rotate_z * rotate_y * rotate_x * scale
}

/// Half-width and half-height of the orthographic volume for a zoom fraction.
pub fn ortho_half_extents(zoom_fraction: f32) -> Vec2 {
    let zf = zoom_fraction.max(MIN_ZOOM_FRACTION);
    Vec2::new(ORTHO_HALF_WIDTH * zf, ORTHO_HALF_HEIGHT * zf)
}

pub fn projection_matrix(mode: ProjectionMode, aspect: f32, zoom_fraction: f32) -> Mat4 {
    match mode {
        ProjectionMode::Perspective => Mat4::perspective_rh(
            FOV_Y_DEGREES.to_radians(),
            aspect,
            PERSPECTIVE_NEAR,
            PERSPECTIVE_FAR,
        ),
        ProjectionMode::Orthographic => {
            let half = ortho_half_extents(zoom_fraction);
            Mat4::orthographic_rh(-half.x, half.x, -half.y, half.y, ORTHO_NEAR, ORTHO_FAR)
        }
    }
}

/// Camera position: a fixed diagonal offset from the centroid, scaled by zoom.
pub fn eye_position(centroid: Vec3, zoom_fraction: f32) -> Vec3 {
    let zf = zoom_fraction.max(MIN_ZOOM_FRACTION);
    centroid + Vec3::splat(EYE_OFFSET * zf)
}

/// Look at the centroid from [`eye_position`] with +Z up.
pub fn view_matrix(centroid: Vec3, zoom_fraction: f32) -> Mat4 {
    Mat4::look_at_rh(eye_position(centroid, zoom_fraction), centroid, Vec3::Z)
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPS: f32 = 1e-4;

    fn close(a: Vec3, b: Vec3) -> bool {
        a.abs_diff_eq(b, EPS)
    }

    /// For points at city scale, where f32 spacing is far above `EPS`.
    fn near(a: Vec3, b: Vec3) -> bool {
        a.abs_diff_eq(b, 1e-2)
    }

    #[test]
    fn model_composition_order() {
        let model = model_matrix(0.0, Vec2::ZERO);
        let expected = Mat4::from_scale(Vec3::splat(0.5))
            * Mat4::from_rotation_z(45.0_f32.to_radians())
            * Mat4::from_rotation_y((-45.0_f32).to_radians())
            * Mat4::from_rotation_x(45.0_f32.to_radians())
            * Mat4::from_translation(Vec3::ZERO);
        assert!(model.abs_diff_eq(expected, EPS));

        // +X: rotX leaves it, rotY(-45) lifts it to (c, 0, c), rotZ(45) splits x/y, scale halves.
        let probe = model.transform_vector3(Vec3::X);
        assert!(close(probe, Vec3::new(0.25, 0.25, 0.353_553_4)), "{probe}");
    }

    #[test]
    fn rotation_is_about_z_in_degrees() {
        let base = model_matrix(0.0, Vec2::ZERO);
        let turned = model_matrix(90.0, Vec2::ZERO);
        let expected = Mat4::from_rotation_z(90.0_f32.to_radians()) * base;
        assert!(turned.abs_diff_eq(expected, EPS));
    }

    #[test]
    fn tilt_offsets_x_and_y_rotations() {
        let tilt = Vec2::new(0.05, -0.02);
        let model = model_matrix(0.0, tilt);
        let expected = Mat4::from_rotation_z(45.0_f32.to_radians())
            * Mat4::from_rotation_y((-45.0_f32).to_radians() - 0.02)
            * Mat4::from_rotation_x(45.0_f32.to_radians() + 0.05)
            * Mat4::from_scale(Vec3::splat(0.5));
        assert!(model.abs_diff_eq(expected, EPS));
    }

    #[test]
    fn ortho_extents_scale_with_zoom() {
        assert_eq!(ortho_half_extents(1.0), Vec2::new(5000.0, 800.0));
        assert_eq!(ortho_half_extents(0.5), Vec2::new(2500.0, 400.0));

        let proj = projection_matrix(ProjectionMode::Orthographic, 16.0 / 9.0, 1.0);
        assert!((proj.x_axis.x - 2.0 / 10_000.0).abs() < 1e-9);
        assert!((proj.y_axis.y - 2.0 / 1_600.0).abs() < 1e-9);
        let corner = proj.project_point3(Vec3::new(5000.0, 800.0, -25_000.0));
        assert!(close(corner, Vec3::new(1.0, 1.0, 1.0)), "{corner}");

        let half = projection_matrix(ProjectionMode::Orthographic, 1.0, 0.5);
        let corner = half.project_point3(Vec3::new(2500.0, 400.0, 0.0));
        assert!(close(corner, Vec3::new(1.0, 1.0, 0.0)), "{corner}");
    }

    #[test]
    fn perspective_uses_aspect_and_depth_range() {
        let proj = projection_matrix(ProjectionMode::Perspective, 2.0, 1.0);
        let f = 1.0 / (22.5_f32.to_radians()).tan();
        assert!((proj.y_axis.y - f).abs() < EPS);
        assert!((proj.x_axis.x - f / 2.0).abs() < EPS);
        let near_plane = proj.project_point3(Vec3::new(0.0, 0.0, -1.0));
        let far_plane = proj.project_point3(Vec3::new(0.0, 0.0, -40_000.0));
        assert!(near_plane.z.abs() < EPS);
        assert!((far_plane.z - 1.0).abs() < EPS);
    }

    #[test]
    fn eye_sits_on_the_diagonal() {
        assert_eq!(eye_position(Vec3::ZERO, 1.0), Vec3::splat(4200.0));
        let c = Vec3::new(100.0, -50.0, 10.0);
        assert!(near(eye_position(c, 0.6), c + Vec3::splat(2520.0)));
    }

    #[test]
    fn view_looks_at_centroid() {
        let c = Vec3::new(10.0, 20.0, 0.0);
        let view = view_matrix(c, 1.0);
        let eye = eye_position(c, 1.0);
        assert!(near(view.transform_point3(eye), Vec3::ZERO));
        // Centroid lies straight ahead on -Z in view space.
        let target = view.transform_point3(c);
        assert!(target.x.abs() < 1e-2 && target.y.abs() < 1e-2 && target.z < 0.0);
        assert!((target.z + 4200.0 * 3.0_f32.sqrt()).abs() < 0.05);
    }

    #[test]
    fn zero_zoom_stays_finite() {
        let mut cam = CameraState::default();
        cam.zoom_percent = 0.0;
        for projection in [ProjectionMode::Perspective, ProjectionMode::Orthographic] {
            cam.projection = projection;
            let t = FrameTransforms::compute(
                &cam,
                Viewport::default(),
                Vec3::ZERO,
            );
            assert!(t.view.is_finite());
            assert!(t.projection.is_finite());
        }
    }

    #[test]
    fn context_computes_same_as_free_functions() {
        let ctx = RenderContext::new(CameraState::default(), Viewport::new(800, 600));
        let c = Vec3::new(1.0, 2.0, 3.0);
        let t = ctx.transforms(c);
        assert_eq!(t.model, model_matrix(60.0, Vec2::ZERO));
        assert_eq!(t.view, view_matrix(c, 0.6));
        assert_eq!(
            t.projection,
            projection_matrix(ProjectionMode::Perspective, 800.0 / 600.0, 0.6)
        );
        assert!(t.model_view_projection().is_finite());
    }

    #[test]
    fn viewport_aspect_guards_zero_height() {
        assert_eq!(Viewport::new(100, 0).aspect(), 100.0);
        assert_eq!(Viewport::new(200, 100).aspect(), 2.0);
    }
}
