use crate::transform::{self, RenderContext};
use cityscape_kernel::LayerCollection;
use std::fmt::Write;

/// Renderer-agnostic interface.
///
/// A renderer reads the layer collection and a render context, then produces
/// output. It never mutates either.
pub trait Renderer {
    /// The output type produced by this renderer.
    type Output;

    /// Render one frame from the given layers and context.
    fn render<R>(&self, layers: &LayerCollection<R>, ctx: &RenderContext) -> Self::Output;
}

/// Text renderer for headless inspection.
///
/// Walks the collection through the same draw dispatch as the GPU path and
/// prints each layer with the transforms it would be drawn with.
#[derive(Debug, Default)]
pub struct DebugTextRenderer {
    /// Also print the full matrices, not just the eye and target.
    pub matrices: bool,
}

impl DebugTextRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_matrices() -> Self {
        Self { matrices: true }
    }
}

impl Renderer for DebugTextRenderer {
    type Output = String;

    fn render<R>(&self, layers: &LayerCollection<R>, ctx: &RenderContext) -> String {
        let mut out = String::new();
        let cam = &ctx.camera;
        let c = layers.centroid();
        let eye = transform::eye_position(c, cam.zoom_fraction());

        let _ = writeln!(
            out,
            "=== Scene (layers={}, vertices={}) ===",
            layers.len(),
            layers.vertex_count()
        );
        let _ = writeln!(out, "Centroid: ({:.2}, {:.2}, {:.2})", c.x, c.y, c.z);
        let _ = writeln!(
            out,
            "Camera: rotation={:.1} zoom={:.0}% projection={} viewport={}x{}",
            cam.rotation_degrees,
            cam.zoom_percent,
            cam.projection,
            ctx.viewport.width,
            ctx.viewport.height
        );
        let _ = writeln!(out, "Eye: ({:.2}, {:.2}, {:.2})", eye.x, eye.y, eye.z);

        layers.draw(|layer, centroid| {
            let g = layer.geometry();
            let [r, gr, b, a] = g.color().to_array();
            let _ = writeln!(
                out,
                "  [{}] {} vertices={} triangles={} color=({r:.2}, {gr:.2}, {b:.2}, {a:.2})",
                layer.kind(),
                layer.name(),
                g.vertex_count(),
                g.index_count() / 3,
            );
            if self.matrices {
                let t = ctx.transforms(centroid);
                let _ = writeln!(out, "    model={:?}", t.model.to_cols_array());
                let _ = writeln!(out, "    view={:?}", t.view.to_cols_array());
                let _ = writeln!(out, "    projection={:?}", t.projection.to_cols_array());
            }
        });

        tracing::debug!(layers = layers.len(), "debug frame rendered");
        out
    }
}
