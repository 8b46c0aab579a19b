use crate::shaders;
use bytemuck::{Pod, Zeroable};
use cityscape_common::{Color, LayerKind};
use cityscape_render::FrameTransforms;
use std::sync::Arc;

/// Attribute location of vertex positions in both programs.
pub const POSITION_LOCATION: u32 = 0;
/// Attribute location of vertex normals in the lit program.
pub const NORMAL_LOCATION: u32 = 1;
/// Binding of [`LayerUniforms`] in bind group 0.
pub const UNIFORM_BINDING: u32 = 0;
pub const DEPTH_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Depth32Float;

const POSITION_ATTRIBUTES: [wgpu::VertexAttribute; 1] =
    wgpu::vertex_attr_array![0 => Float32x3];
const NORMAL_ATTRIBUTES: [wgpu::VertexAttribute; 1] = wgpu::vertex_attr_array![1 => Float32x3];
const VEC3_STRIDE: wgpu::BufferAddress = (3 * std::mem::size_of::<f32>()) as wgpu::BufferAddress;

/// Per-layer uniform block: the frame transforms plus the layer color.
#[repr(C)]
#[derive(Debug, Copy, Clone, PartialEq, Pod, Zeroable)]
pub struct LayerUniforms {
    pub model: [[f32; 4]; 4],
    pub view: [[f32; 4]; 4],
    pub projection: [[f32; 4]; 4],
    pub color: [f32; 4],
}

impl LayerUniforms {
    pub fn new(transforms: &FrameTransforms, color: Color) -> Self {
        Self {
            model: transforms.model.to_cols_array_2d(),
            view: transforms.view.to_cols_array_2d(),
            projection: transforms.projection.to_cols_array_2d(),
            color: color.to_array(),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ShaderError {
    #[error("{program} program failed to compile or link: {diagnostic}")]
    Compile {
        program: LayerKind,
        diagnostic: String,
    },
}

/// Vertex and fragment source text for both programs.
#[derive(Debug, Clone)]
pub struct ProgramSources {
    pub lit_vertex: String,
    pub flat_vertex: String,
    pub fragment: String,
}

impl Default for ProgramSources {
    fn default() -> Self {
        Self {
            lit_vertex: shaders::LIT_VERTEX_SHADER.to_string(),
            flat_vertex: shaders::FLAT_VERTEX_SHADER.to_string(),
            fragment: shaders::FRAGMENT_SHADER.to_string(),
        }
    }
}

impl ProgramSources {
    pub fn vertex(&self, kind: LayerKind) -> &str {
        match kind {
            LayerKind::Lit => &self.lit_vertex,
            LayerKind::Flat => &self.flat_vertex,
        }
    }
}

/// Vertex buffer slots for a program: slot 0 positions, slot 1 normals (lit only).
pub(crate) fn vertex_layouts(kind: LayerKind) -> Vec<wgpu::VertexBufferLayout<'static>> {
    let position = wgpu::VertexBufferLayout {
        array_stride: VEC3_STRIDE,
        step_mode: wgpu::VertexStepMode::Vertex,
        attributes: &POSITION_ATTRIBUTES,
    };
    match kind {
        LayerKind::Flat => vec![position],
        LayerKind::Lit => vec![
            position,
            wgpu::VertexBufferLayout {
                array_stride: VEC3_STRIDE,
                step_mode: wgpu::VertexStepMode::Vertex,
                attributes: &NORMAL_ATTRIBUTES,
            },
        ],
    }
}

/// A compiled and linked layer program: render pipeline plus uniform layout.
#[derive(Debug)]
pub struct ShaderProgram {
    kind: LayerKind,
    pipeline: wgpu::RenderPipeline,
    bind_group_layout: wgpu::BindGroupLayout,
}

impl ShaderProgram {
    /// Compile `vertex_source` and `fragment_source` (WGSL) and link them into a pipeline.
    ///
    /// Validation errors are captured with an error scope and returned with
    /// the compiler diagnostic.
    pub fn new(
        device: &wgpu::Device,
        kind: LayerKind,
        vertex_source: &str,
        fragment_source: &str,
        surface_format: wgpu::TextureFormat,
    ) -> Result<Self, ShaderError> {
        device.push_error_scope(wgpu::ErrorFilter::Validation);

        let vertex_module = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some(&format!("{kind}_vertex_shader")),
            source: wgpu::ShaderSource::Wgsl(vertex_source.into()),
        });
        let fragment_module = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some(&format!("{kind}_fragment_shader")),
            source: wgpu::ShaderSource::Wgsl(fragment_source.into()),
        });

        let bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some(&format!("{kind}_uniform_layout")),
            entries: &[wgpu::BindGroupLayoutEntry {
                binding: UNIFORM_BINDING,
                visibility: wgpu::ShaderStages::VERTEX | wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: false,
                    min_binding_size: wgpu::BufferSize::new(
                        std::mem::size_of::<LayerUniforms>() as u64
                    ),
                },
                count: None,
            }],
        });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some(&format!("{kind}_pipeline_layout")),
            bind_group_layouts: &[&bind_group_layout],
            push_constant_ranges: &[],
        });

        let buffers = vertex_layouts(kind);
        let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some(&format!("{kind}_pipeline")),
            layout: Some(&pipeline_layout),
            vertex: wgpu::VertexState {
                module: &vertex_module,
                entry_point: Some("vs_main"),
                compilation_options: Default::default(),
                buffers: &buffers,
            },
            fragment: Some(wgpu::FragmentState {
                module: &fragment_module,
                entry_point: Some("fs_main"),
                compilation_options: Default::default(),
                targets: &[Some(wgpu::ColorTargetState {
                    format: surface_format,
                    blend: Some(wgpu::BlendState::ALPHA_BLENDING),
                    write_mask: wgpu::ColorWrites::ALL,
                })],
            }),
            primitive: wgpu::PrimitiveState {
                topology: wgpu::PrimitiveTopology::TriangleList,
                cull_mode: Some(wgpu::Face::Back),
                ..Default::default()
            },
            depth_stencil: Some(wgpu::DepthStencilState {
                format: DEPTH_FORMAT,
                depth_write_enabled: true,
                depth_compare: wgpu::CompareFunction::Less,
                stencil: Default::default(),
                bias: Default::default(),
            }),
            multisample: Default::default(),
            multiview: None,
            cache: None,
        });

        if let Some(err) = pollster::block_on(device.pop_error_scope()) {
            let diagnostic = err.to_string();
            tracing::error!(program = %kind, "shader program failed: {diagnostic}");
            return Err(ShaderError::Compile {
                program: kind,
                diagnostic,
            });
        }

        tracing::debug!(program = %kind, "shader program linked");
        Ok(Self {
            kind,
            pipeline,
            bind_group_layout,
        })
    }

    pub fn kind(&self) -> LayerKind {
        self.kind
    }

    pub fn position_location(&self) -> u32 {
        POSITION_LOCATION
    }

    /// `None` for the flat program.
    pub fn normal_location(&self) -> Option<u32> {
        match self.kind {
            LayerKind::Lit => Some(NORMAL_LOCATION),
            LayerKind::Flat => None,
        }
    }

    pub fn bind_group_layout(&self) -> &wgpu::BindGroupLayout {
        &self.bind_group_layout
    }

    /// Make this program current for subsequent draws in `pass`.
    pub fn use_program(&self, pass: &mut wgpu::RenderPass<'_>) {
        pass.set_pipeline(&self.pipeline);
    }
}

/// Compiles each program on first use and shares it among layers of that kind.
///
/// Failures are not cached; the next layer that needs the program retries.
#[derive(Debug)]
pub struct ProgramCache {
    surface_format: wgpu::TextureFormat,
    sources: ProgramSources,
    lit: Option<Arc<ShaderProgram>>,
    flat: Option<Arc<ShaderProgram>>,
}

impl ProgramCache {
    pub fn new(surface_format: wgpu::TextureFormat) -> Self {
        Self::with_sources(surface_format, ProgramSources::default())
    }

    pub fn with_sources(surface_format: wgpu::TextureFormat, sources: ProgramSources) -> Self {
        Self {
            surface_format,
            sources,
            lit: None,
            flat: None,
        }
    }

    pub fn get(
        &mut self,
        device: &wgpu::Device,
        kind: LayerKind,
    ) -> Result<Arc<ShaderProgram>, ShaderError> {
        let slot = match kind {
            LayerKind::Lit => &mut self.lit,
            LayerKind::Flat => &mut self.flat,
        };
        if let Some(program) = slot {
            return Ok(Arc::clone(program));
        }
        let program = Arc::new(ShaderProgram::new(
            device,
            kind,
            self.sources.vertex(kind),
            &self.sources.fragment,
            self.surface_format,
        )?);
        *slot = Some(Arc::clone(&program));
        Ok(program)
    }

    pub fn is_compiled(&self, kind: LayerKind) -> bool {
        match kind {
            LayerKind::Lit => self.lit.is_some(),
            LayerKind::Flat => self.flat.is_some(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cityscape_common::CameraState;
    use cityscape_render::{RenderContext, Viewport};

    #[test]
    fn uniform_block_matches_wgsl_layout() {
        // three mat4x4<f32> + vec4<f32>
        assert_eq!(std::mem::size_of::<LayerUniforms>(), 3 * 64 + 16);
        assert_eq!(std::mem::size_of::<LayerUniforms>() % 16, 0);
    }

    #[test]
    fn uniforms_carry_transforms_and_color() {
        let ctx = RenderContext::new(CameraState::default(), Viewport::new(800, 600));
        let t = ctx.transforms(glam::Vec3::ZERO);
        let color = Color::rgba(0.2, 0.4, 0.6, 0.8);
        let u = LayerUniforms::new(&t, color);
        assert_eq!(u.model, t.model.to_cols_array_2d());
        assert_eq!(u.view, t.view.to_cols_array_2d());
        assert_eq!(u.projection, t.projection.to_cols_array_2d());
        assert_eq!(u.color, [0.2, 0.4, 0.6, 0.8]);
    }

    #[test]
    fn lit_layout_adds_normal_slot() {
        let flat = vertex_layouts(LayerKind::Flat);
        let lit = vertex_layouts(LayerKind::Lit);
        assert_eq!(flat.len(), 1);
        assert_eq!(lit.len(), 2);
        assert_eq!(flat[0].attributes[0].shader_location, POSITION_LOCATION);
        assert_eq!(lit[1].attributes[0].shader_location, NORMAL_LOCATION);
        assert_eq!(lit[0].array_stride, 12);
    }

    #[test]
    fn fresh_cache_has_nothing_compiled() {
        let cache = ProgramCache::new(wgpu::TextureFormat::Bgra8UnormSrgb);
        assert!(!cache.is_compiled(LayerKind::Lit));
        assert!(!cache.is_compiled(LayerKind::Flat));
    }

    #[test]
    fn default_sources_pick_vertex_by_kind() {
        let sources = ProgramSources::default();
        assert!(sources.vertex(LayerKind::Lit).contains("@location(1) normal"));
        assert!(!sources.vertex(LayerKind::Flat).contains("normal"));
        assert!(sources.fragment.contains("fs_main"));
    }
}
