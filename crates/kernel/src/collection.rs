use cityscape_common::{Color, GeometryError, LayerGeometry, LayerKind};
use glam::Vec3;

/// Errors from collection mutations.
#[derive(Debug, thiserror::Error)]
pub enum SceneError {
    #[error("invalid geometry for layer {name:?}: {source}")]
    Geometry {
        name: String,
        #[source]
        source: GeometryError,
    },
    #[error("failed to initialize layer {name:?}: {source}")]
    Backend {
        name: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
}

/// Allocates the resources a layer needs to be drawn.
///
/// The wgpu backend uploads buffers and builds bind groups here; headless
/// consumers use [`CpuBackend`].
pub trait LayerBackend {
    type Resources;
    type Error: std::error::Error + Send + Sync + 'static;

    /// Called exactly once per layer instance, before any draw.
    fn initialize(
        &mut self,
        name: &str,
        geometry: &LayerGeometry,
    ) -> Result<Self::Resources, Self::Error>;
}

/// Backend that allocates nothing. Used by headless tools and tests.
#[derive(Debug, Default, Clone, Copy)]
pub struct CpuBackend;

impl LayerBackend for CpuBackend {
    type Resources = ();
    type Error = std::convert::Infallible;

    fn initialize(&mut self, _name: &str, _geometry: &LayerGeometry) -> Result<(), Self::Error> {
        Ok(())
    }
}

/// One named layer: validated geometry plus whatever the backend allocated for it.
#[derive(Debug)]
pub struct SceneLayer<R> {
    name: String,
    geometry: LayerGeometry,
    resources: R,
}

impl<R> SceneLayer<R> {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn geometry(&self) -> &LayerGeometry {
        &self.geometry
    }

    pub fn kind(&self) -> LayerKind {
        self.geometry.kind()
    }

    pub fn resources(&self) -> &R {
        &self.resources
    }
}

/// Ordered set of named layers sharing one centroid.
#[derive(Debug)]
pub struct LayerCollection<R> {
    layers: Vec<SceneLayer<R>>,
    centroid: Vec3,
}

impl<R> Default for LayerCollection<R> {
    fn default() -> Self {
        Self {
            layers: Vec::new(),
            centroid: Vec3::ZERO,
        }
    }
}

impl<R> LayerCollection<R> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add (or replace) a layer without normals.
    pub fn add_layer<B>(
        &mut self,
        backend: &mut B,
        name: impl Into<String>,
        vertices: Vec<f32>,
        indices: Vec<u32>,
        color: Color,
    ) -> Result<(), SceneError>
    where
        B: LayerBackend<Resources = R>,
    {
        let name = name.into();
        match LayerGeometry::flat(vertices, indices, color) {
            Ok(geometry) => self.insert(backend, name, geometry),
            Err(source) => Err(SceneError::Geometry { name, source }),
        }
    }

    /// Add (or replace) a layer with one normal per vertex.
    pub fn add_building_layer<B>(
        &mut self,
        backend: &mut B,
        name: impl Into<String>,
        vertices: Vec<f32>,
        indices: Vec<u32>,
        normals: Vec<f32>,
        color: Color,
    ) -> Result<(), SceneError>
    where
        B: LayerBackend<Resources = R>,
    {
        let name = name.into();
        match LayerGeometry::lit(vertices, indices, normals, color) {
            Ok(geometry) => self.insert(backend, name, geometry),
            Err(source) => Err(SceneError::Geometry { name, source }),
        }
    }

    /// Initialize `geometry` through the backend and store it under `name`.
    ///
    /// An existing layer with the same name is replaced in place, keeping its
    /// draw position. On backend failure the collection is unchanged.
    pub fn insert<B>(
        &mut self,
        backend: &mut B,
        name: impl Into<String>,
        geometry: LayerGeometry,
    ) -> Result<(), SceneError>
    where
        B: LayerBackend<Resources = R>,
    {
        let name = name.into();
        let resources = backend
            .initialize(&name, &geometry)
            .map_err(|e| SceneError::Backend {
                name: name.clone(),
                source: Box::new(e),
            })?;

        tracing::debug!(
            layer = %name,
            kind = %geometry.kind(),
            vertices = geometry.vertex_count(),
            indices = geometry.index_count(),
            "layer initialized"
        );

        let layer = SceneLayer {
            name,
            geometry,
            resources,
        };
        match self.position(&layer.name) {
            Some(i) => self.layers[i] = layer,
            None => self.layers.push(layer),
        }
        self.recompute_centroid();
        Ok(())
    }

    /// Remove a layer by name, returning it if it existed.
    pub fn remove_layer(&mut self, name: &str) -> Option<SceneLayer<R>> {
        let i = self.position(name)?;
        let removed = self.layers.remove(i);
        self.recompute_centroid();
        Some(removed)
    }

    pub fn clear(&mut self) {
        self.layers.clear();
        self.recompute_centroid();
    }

    /// Invoke `f` for every layer in insertion order with the shared centroid.
    pub fn draw<F>(&self, mut f: F)
    where
        F: FnMut(&SceneLayer<R>, Vec3),
    {
        for layer in &self.layers {
            f(layer, self.centroid);
        }
    }

    pub fn centroid(&self) -> Vec3 {
        self.centroid
    }

    pub fn get(&self, name: &str) -> Option<&SceneLayer<R>> {
        self.layers.iter().find(|l| l.name == name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.position(name).is_some()
    }

    pub fn iter(&self) -> impl Iterator<Item = &SceneLayer<R>> {
        self.layers.iter()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.layers.iter().map(|l| l.name.as_str())
    }

    pub fn len(&self) -> usize {
        self.layers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }

    /// Total vertex count across all layers.
    pub fn vertex_count(&self) -> usize {
        self.layers.iter().map(|l| l.geometry.vertex_count()).sum()
    }

    fn position(&self, name: &str) -> Option<usize> {
        self.layers.iter().position(|l| l.name == name)
    }

    fn recompute_centroid(&mut self) {
        let mut sum = [0.0f64; 3];
        let mut count = 0usize;
        for layer in &self.layers {
            let s = layer.geometry.position_sum();
            sum[0] += s[0];
            sum[1] += s[1];
            sum[2] += s[2];
            count += layer.geometry.vertex_count();
        }
        self.centroid = if count == 0 {
            Vec3::ZERO
        } else {
            let n = count as f64;
            Vec3::new((sum[0] / n) as f32, (sum[1] / n) as f32, (sum[2] / n) as f32)
        };
    }
}
