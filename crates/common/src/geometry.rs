use glam::Vec3;
use serde::{Deserialize, Serialize};

/// Errors raised when raw layer data does not describe a drawable surface.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum GeometryError {
    #[error("coordinate count {0} is not a multiple of 3")]
    RaggedPositions(usize),
    #[error("normal count {normals} does not match coordinate count {positions}")]
    NormalCountMismatch { normals: usize, positions: usize },
    #[error("index {index} at position {at} is out of range for {vertex_count} vertices")]
    IndexOutOfRange {
        at: usize,
        index: u32,
        vertex_count: usize,
    },
    #[error("color must have 3 or 4 components, got {0}")]
    ColorArity(usize),
    #[error("non-finite {what} value at position {at}")]
    NonFinite { what: &'static str, at: usize },
}

/// RGBA color, components nominally in `[0, 1]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Color(pub [f32; 4]);

impl Color {
    pub const WHITE: Color = Color([1.0, 1.0, 1.0, 1.0]);

    pub fn rgba(r: f32, g: f32, b: f32, a: f32) -> Self {
        Self([r, g, b, a])
    }

    /// Build a color from a 3- or 4-component slice. Three components get alpha 1.
    pub fn from_slice(components: &[f32]) -> Result<Self, GeometryError> {
        let color = match *components {
            [r, g, b] => Self([r, g, b, 1.0]),
            [r, g, b, a] => Self([r, g, b, a]),
            _ => return Err(GeometryError::ColorArity(components.len())),
        };
        check_finite("color", &color.0)?;
        Ok(color)
    }

    pub fn to_array(self) -> [f32; 4] {
        self.0
    }
}

impl Default for Color {
    fn default() -> Self {
        Self::WHITE
    }
}

/// Which shader program and buffer layout a layer uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LayerKind {
    /// Position only, uniform color (water, parks, surface).
    Flat,
    /// Position + normal, directional shading (buildings).
    Lit,
}

impl std::fmt::Display for LayerKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LayerKind::Flat => f.write_str("flat"),
            LayerKind::Lit => f.write_str("lit"),
        }
    }
}

/// Per-vertex shading data carried by a layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Shading {
    Flat,
    Lit { normals: Vec<f32> },
}

/// CPU-side geometry for one named layer.
///
/// Construction validates the data, so a `LayerGeometry` can be uploaded
/// without bounds concerns.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayerGeometry {
    positions: Vec<f32>,
    indices: Vec<u32>,
    color: Color,
    shading: Shading,
}

impl LayerGeometry {
    /// Geometry for a layer without normals.
    pub fn flat(positions: Vec<f32>, indices: Vec<u32>, color: Color) -> Result<Self, GeometryError> {
        Self::new(positions, indices, color, Shading::Flat)
    }

    /// Geometry for a layer with one normal per vertex.
    pub fn lit(
        positions: Vec<f32>,
        indices: Vec<u32>,
        normals: Vec<f32>,
        color: Color,
    ) -> Result<Self, GeometryError> {
        Self::new(positions, indices, color, Shading::Lit { normals })
    }

    pub fn new(
        positions: Vec<f32>,
        indices: Vec<u32>,
        color: Color,
        shading: Shading,
    ) -> Result<Self, GeometryError> {
        if positions.len() % 3 != 0 {
            return Err(GeometryError::RaggedPositions(positions.len()));
        }
        check_finite("coordinate", &positions)?;
        check_finite("color", &color.0)?;
        if let Shading::Lit { normals } = &shading {
            if normals.len() != positions.len() {
                return Err(GeometryError::NormalCountMismatch {
                    normals: normals.len(),
                    positions: positions.len(),
                });
            }
            check_finite("normal", normals)?;
        }

        let vertex_count = positions.len() / 3;
        if let Some((at, &index)) = indices
            .iter()
            .enumerate()
            .find(|&(_, &i)| i as usize >= vertex_count)
        {
            return Err(GeometryError::IndexOutOfRange {
                at,
                index,
                vertex_count,
            });
        }

        Ok(Self {
            positions,
            indices,
            color,
            shading,
        })
    }

    pub fn kind(&self) -> LayerKind {
        match self.shading {
            Shading::Flat => LayerKind::Flat,
            Shading::Lit { .. } => LayerKind::Lit,
        }
    }

    /// Flat `x, y, z` triples.
    pub fn positions(&self) -> &[f32] {
        &self.positions
    }

    pub fn indices(&self) -> &[u32] {
        &self.indices
    }

    /// Flat `x, y, z` normals for lit layers.
    pub fn normals(&self) -> Option<&[f32]> {
        match &self.shading {
            Shading::Flat => None,
            Shading::Lit { normals } => Some(normals),
        }
    }

    pub fn color(&self) -> Color {
        self.color
    }

    pub fn shading(&self) -> &Shading {
        &self.shading
    }

    pub fn vertex_count(&self) -> usize {
        self.positions.len() / 3
    }

    pub fn index_count(&self) -> usize {
        self.indices.len()
    }

    /// Iterate vertices as `Vec3`.
    pub fn vertices(&self) -> impl Iterator<Item = Vec3> + '_ {
        self.positions
            .chunks_exact(3)
            .map(|p| Vec3::new(p[0], p[1], p[2]))
    }

    /// Component-wise sum of all vertices, in f64 so large city coordinates
    /// keep their precision when many layers are averaged together.
    pub fn position_sum(&self) -> [f64; 3] {
        let mut sum = [0.0f64; 3];
        for p in self.positions.chunks_exact(3) {
            sum[0] += p[0] as f64;
            sum[1] += p[1] as f64;
            sum[2] += p[2] as f64;
        }
        sum
    }
}

fn check_finite(what: &'static str, values: &[f32]) -> Result<(), GeometryError> {
    match values.iter().position(|v| !v.is_finite()) {
        Some(at) => Err(GeometryError::NonFinite { what, at }),
        None => Ok(()),
    }
}
