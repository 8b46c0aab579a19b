use crate::layer::{GpuBackend, GpuLayer};
use crate::program::{DEPTH_FORMAT, ProgramCache, ProgramSources, ShaderError};
use cityscape_common::LayerKind;
use cityscape_kernel::LayerCollection;
use cityscape_render::{RenderContext, Viewport};

/// Background color of the scene.
pub const CLEAR_COLOR: wgpu::Color = wgpu::Color {
    r: 190.0 / 255.0,
    g: 210.0 / 255.0,
    b: 215.0 / 255.0,
    a: 1.0,
};

/// wgpu-based scene renderer: owns the program cache and depth target.
pub struct WgpuRenderer {
    programs: ProgramCache,
    depth_texture: wgpu::TextureView,
    size: Viewport,
    surface_format: wgpu::TextureFormat,
}

impl WgpuRenderer {
    pub fn new(
        device: &wgpu::Device,
        surface_format: wgpu::TextureFormat,
        width: u32,
        height: u32,
    ) -> Self {
        Self::with_sources(device, surface_format, width, height, ProgramSources::default())
    }

    /// Use caller-supplied shader sources instead of the built-in ones.
    pub fn with_sources(
        device: &wgpu::Device,
        surface_format: wgpu::TextureFormat,
        width: u32,
        height: u32,
        sources: ProgramSources,
    ) -> Self {
        Self {
            programs: ProgramCache::with_sources(surface_format, sources),
            depth_texture: Self::create_depth_texture(device, width, height),
            size: Viewport::new(width.max(1), height.max(1)),
            surface_format,
        }
    }

    /// Compile both programs up front so the first load does not stall.
    pub fn warm_up(&mut self, device: &wgpu::Device) -> Result<(), ShaderError> {
        for kind in [LayerKind::Flat, LayerKind::Lit] {
            self.programs.get(device, kind)?;
        }
        tracing::info!("layer programs compiled");
        Ok(())
    }

    /// Backend that initializes new layers on `device` with this renderer's programs.
    pub fn backend<'a>(&'a mut self, device: &'a wgpu::Device) -> GpuBackend<'a> {
        GpuBackend::new(device, &mut self.programs)
    }

    pub fn resize(&mut self, device: &wgpu::Device, width: u32, height: u32) {
        self.depth_texture = Self::create_depth_texture(device, width, height);
        self.size = Viewport::new(width.max(1), height.max(1));
        tracing::debug!(width, height, "depth target resized");
    }

    /// Whether the program for `kind` has been compiled and cached.
    pub fn is_compiled(&self, kind: LayerKind) -> bool {
        self.programs.is_compiled(kind)
    }

    pub fn size(&self) -> Viewport {
        self.size
    }

    pub fn surface_format(&self) -> wgpu::TextureFormat {
        self.surface_format
    }

    /// Render one frame: clear, set the viewport, draw every layer.
    pub fn render(
        &self,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        view: &wgpu::TextureView,
        ctx: &RenderContext,
        layers: &LayerCollection<GpuLayer>,
    ) {
        let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("scene_encoder"),
        });

        {
            let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("scene_pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(CLEAR_COLOR),
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                    view: &self.depth_texture,
                    depth_ops: Some(wgpu::Operations {
                        load: wgpu::LoadOp::Clear(1.0),
                        store: wgpu::StoreOp::Store,
                    }),
                    stencil_ops: None,
                }),
                ..Default::default()
            });

            let viewport = clamp_viewport(ctx.viewport, self.size);
            pass.set_viewport(
                0.0,
                0.0,
                viewport.width as f32,
                viewport.height as f32,
                0.0,
                1.0,
            );

            layers.draw(|layer, centroid| {
                layer.resources().draw(queue, &mut pass, ctx, centroid);
            });
        }

        queue.submit(std::iter::once(encoder.finish()));
    }

    fn create_depth_texture(
        device: &wgpu::Device,
        width: u32,
        height: u32,
    ) -> wgpu::TextureView {
        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some("depth_texture"),
            size: wgpu::Extent3d {
                width: width.max(1),
                height: height.max(1),
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: DEPTH_FORMAT,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            view_formats: &[],
        });
        texture.create_view(&Default::default())
    }
}

/// The requested viewport, kept inside the render target.
fn clamp_viewport(requested: Viewport, target: Viewport) -> Viewport {
    Viewport::new(
        requested.width.clamp(1, target.width),
        requested.height.clamp(1, target.height),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clear_color_matches_sky() {
        assert!((CLEAR_COLOR.r - 190.0 / 255.0).abs() < 1e-12);
        assert!((CLEAR_COLOR.g - 210.0 / 255.0).abs() < 1e-12);
        assert!((CLEAR_COLOR.b - 215.0 / 255.0).abs() < 1e-12);
        assert_eq!(CLEAR_COLOR.a, 1.0);
    }

    #[test]
    fn viewport_is_clamped_to_target() {
        let target = Viewport::new(800, 600);
        assert_eq!(clamp_viewport(Viewport::new(1920, 1080), target), target);
        assert_eq!(
            clamp_viewport(Viewport::new(400, 0), target),
            Viewport::new(400, 1)
        );
    }
}
