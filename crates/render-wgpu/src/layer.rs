use crate::program::{LayerUniforms, ProgramCache, ShaderError, ShaderProgram};
use bytemuck::Zeroable;
use cityscape_common::{Color, LayerGeometry, LayerKind};
use cityscape_kernel::LayerBackend;
use cityscape_render::RenderContext;
use glam::Vec3;
use std::sync::Arc;
use wgpu::util::DeviceExt;

/// Smallest allocation handed to wgpu; an empty buffer cannot be sliced.
const MIN_BUFFER_BYTES: usize = wgpu::COPY_BUFFER_ALIGNMENT as usize * 4;

#[derive(Debug, thiserror::Error)]
pub enum GpuLayerError {
    #[error(transparent)]
    Shader(#[from] ShaderError),
    #[error("{0} indices exceed the u32 draw range")]
    TooManyIndices(usize),
}

/// GPU resources for one layer: buffers, uniform bind group, and its program.
#[derive(Debug)]
pub struct GpuLayer {
    program: Arc<ShaderProgram>,
    index_buffer: wgpu::Buffer,
    position_buffer: wgpu::Buffer,
    normal_buffer: Option<wgpu::Buffer>,
    uniform_buffer: wgpu::Buffer,
    bind_group: wgpu::BindGroup,
    index_count: u32,
    color: Color,
}

impl GpuLayer {
    /// Upload `geometry` and bind it to `program`'s attribute locations.
    pub fn new(
        device: &wgpu::Device,
        name: &str,
        program: Arc<ShaderProgram>,
        geometry: &LayerGeometry,
    ) -> Result<Self, GpuLayerError> {
        let index_count = u32::try_from(geometry.index_count())
            .map_err(|_| GpuLayerError::TooManyIndices(geometry.index_count()))?;

        let index_buffer = create_buffer(
            device,
            &format!("{name}_index_buffer"),
            bytemuck::cast_slice(geometry.indices()),
            wgpu::BufferUsages::INDEX,
        );
        let position_buffer = create_buffer(
            device,
            &format!("{name}_position_buffer"),
            bytemuck::cast_slice(geometry.positions()),
            wgpu::BufferUsages::VERTEX,
        );
        let normal_buffer = match (program.normal_location(), geometry.normals()) {
            (Some(_), Some(normals)) => Some(create_buffer(
                device,
                &format!("{name}_normal_buffer"),
                bytemuck::cast_slice(normals),
                wgpu::BufferUsages::VERTEX,
            )),
            _ => None,
        };

        // Transforms are rewritten every draw; the color is set once here.
        let uniform_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some(&format!("{name}_uniform_buffer")),
            contents: bytemuck::bytes_of(&LayerUniforms {
                color: geometry.color().to_array(),
                ..LayerUniforms::zeroed()
            }),
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        });
        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some(&format!("{name}_bind_group")),
            layout: program.bind_group_layout(),
            entries: &[wgpu::BindGroupEntry {
                binding: crate::program::UNIFORM_BINDING,
                resource: uniform_buffer.as_entire_binding(),
            }],
        });

        Ok(Self {
            program,
            index_buffer,
            position_buffer,
            normal_buffer,
            uniform_buffer,
            bind_group,
            index_count,
            color: geometry.color(),
        })
    }

    pub fn kind(&self) -> LayerKind {
        self.program.kind()
    }

    pub fn index_count(&self) -> u32 {
        self.index_count
    }

    /// Upload this frame's transforms and record an indexed draw into `pass`.
    ///
    /// Binds program, uniforms, vertex and index buffers every time.
    pub fn draw(
        &self,
        queue: &wgpu::Queue,
        pass: &mut wgpu::RenderPass<'_>,
        ctx: &RenderContext,
        centroid: Vec3,
    ) {
        let transforms = ctx.transforms(centroid);
        queue.write_buffer(
            &self.uniform_buffer,
            0,
            bytemuck::bytes_of(&LayerUniforms::new(&transforms, self.color)),
        );

        self.program.use_program(pass);
        pass.set_bind_group(0, &self.bind_group, &[]);
        pass.set_vertex_buffer(0, self.position_buffer.slice(..));
        if let Some(normals) = &self.normal_buffer {
            pass.set_vertex_buffer(1, normals.slice(..));
        }
        pass.set_index_buffer(self.index_buffer.slice(..), wgpu::IndexFormat::Uint32);
        pass.draw_indexed(0..self.index_count, 0, 0..1);
    }
}

/// Creates layers on the GPU for a [`cityscape_kernel::LayerCollection`].
pub struct GpuBackend<'a> {
    device: &'a wgpu::Device,
    programs: &'a mut ProgramCache,
}

impl<'a> GpuBackend<'a> {
    pub fn new(device: &'a wgpu::Device, programs: &'a mut ProgramCache) -> Self {
        Self { device, programs }
    }
}

impl LayerBackend for GpuBackend<'_> {
    type Resources = GpuLayer;
    type Error = GpuLayerError;

    fn initialize(&mut self, name: &str, geometry: &LayerGeometry) -> Result<GpuLayer, GpuLayerError> {
        let program = self.programs.get(self.device, geometry.kind())?;
        GpuLayer::new(self.device, name, program, geometry)
    }
}

fn create_buffer(
    device: &wgpu::Device,
    label: &str,
    contents: &[u8],
    usage: wgpu::BufferUsages,
) -> wgpu::Buffer {
    device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
        label: Some(label),
        contents: &padded(contents),
        usage,
    })
}

/// `contents`, or a zeroed minimal block when it is empty.
fn padded(contents: &[u8]) -> std::borrow::Cow<'_, [u8]> {
    if contents.is_empty() {
        std::borrow::Cow::Owned(vec![0; MIN_BUFFER_BYTES])
    } else {
        std::borrow::Cow::Borrowed(contents)
    }
}
