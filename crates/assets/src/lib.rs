//! City scene loader: reads a JSON layer file into validated layer geometry.
//!
//! The file is a single object mapping layer names to layer records:
//!
//! ```json
//! {
//!   "surface":   { "coordinates": [..], "indices": [..], "color": [r, g, b, a] },
//!   "buildings": { "coordinates": [..], "indices": [..], "normals": [..], "color": [r, g, b, a] }
//! }
//! ```
//!
//! The layer kind comes from an optional `"type"` field (`"flat"`, `"lit"`, or
//! its alias `"building"`); without one, a record carrying `normals` is lit and
//! anything else is flat. Names carry no meaning.
//!
//! Loading is all-or-nothing: one bad record rejects the whole file.

use cityscape_common::{Color, GeometryError, LayerGeometry, LayerKind, Shading};
use cityscape_kernel::{NamedLayer, SceneCommand};
use serde::Deserialize;
use std::path::Path;

/// Errors from reading a city file.
#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("file is not valid JSON: {0}")]
    Json(#[source] serde_json::Error),
    #[error("layer {layer:?} does not follow the layer format: {source}")]
    Schema {
        layer: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("layer {layer:?} is declared lit but has no normals")]
    MissingNormals { layer: String },
    #[error("layer {layer:?} has invalid geometry: {source}")]
    Geometry {
        layer: String,
        #[source]
        source: GeometryError,
    },
}

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(rename_all = "lowercase")]
enum DeclaredKind {
    Flat,
    #[serde(alias = "building")]
    Lit,
}

/// One layer record as it appears in the file.
#[derive(Debug, Deserialize)]
struct LayerRecord {
    coordinates: Vec<f32>,
    indices: Vec<u32>,
    color: Vec<f32>,
    #[serde(default)]
    normals: Option<Vec<f32>>,
    #[serde(default, rename = "type")]
    kind: Option<DeclaredKind>,
}

impl LayerRecord {
    fn into_geometry(self, layer: &str) -> Result<LayerGeometry, LoadError> {
        let kind = match (self.kind, &self.normals) {
            (Some(DeclaredKind::Lit), _) => LayerKind::Lit,
            (Some(DeclaredKind::Flat), _) => LayerKind::Flat,
            (None, Some(_)) => LayerKind::Lit,
            (None, None) => LayerKind::Flat,
        };
        let shading = match (kind, self.normals) {
            (LayerKind::Lit, Some(normals)) => Shading::Lit { normals },
            (LayerKind::Lit, None) => {
                return Err(LoadError::MissingNormals {
                    layer: layer.to_string(),
                });
            }
            (LayerKind::Flat, normals) => {
                if normals.is_some() {
                    tracing::warn!(layer, "normals ignored on a layer declared flat");
                }
                Shading::Flat
            }
        };
        let geometry_error = |source| LoadError::Geometry {
            layer: layer.to_string(),
            source,
        };
        let color = Color::from_slice(&self.color).map_err(geometry_error)?;
        LayerGeometry::new(self.coordinates, self.indices, color, shading).map_err(geometry_error)
    }
}

/// A fully parsed and validated city file.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct CityFile {
    layers: Vec<NamedLayer>,
}

impl CityFile {
    /// Parse a city file from JSON text. Layer order follows key order in the text.
    pub fn parse(text: &str) -> Result<Self, LoadError> {
        let records: serde_json::Map<String, serde_json::Value> =
            serde_json::from_str(text).map_err(LoadError::Json)?;

        let mut layers = Vec::with_capacity(records.len());
        for (name, value) in records {
            let record: LayerRecord =
                serde_json::from_value(value).map_err(|source| LoadError::Schema {
                    layer: name.clone(),
                    source,
                })?;
            let geometry = record.into_geometry(&name)?;
            tracing::debug!(
                layer = %name,
                kind = %geometry.kind(),
                vertices = geometry.vertex_count(),
                "parsed layer"
            );
            layers.push(NamedLayer::new(name, geometry));
        }

        if layers.is_empty() {
            tracing::warn!("city file contains no layers");
        }
        Ok(Self { layers })
    }

    /// Read and parse a city file from disk.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, LoadError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)?;
        let file = Self::parse(&text)?;
        tracing::info!(path = %path.display(), layers = file.len(), "loaded city file");
        Ok(file)
    }

    pub fn layers(&self) -> &[NamedLayer] {
        &self.layers
    }

    pub fn len(&self) -> usize {
        self.layers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }

    /// The scene command that adds every layer of this file at once.
    pub fn into_command(self) -> SceneCommand {
        SceneCommand::AddLayers(self.layers)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cityscape_kernel::{CpuBackend, LayerCollection};
    use std::io::Write;

    const CITY: &str = r#"{
        "surface": {
            "coordinates": [0, 0, 0, 10, 0, 0, 0, 10, 0],
            "indices": [0, 1, 2],
            "color": [0.8, 0.8, 0.8, 1.0]
        },
        "buildings": {
            "coordinates": [0, 0, 0, 2, 0, 0, 0, 2, 0],
            "indices": [0, 1, 2],
            "normals": [0, 0, 1, 0, 0, 1, 0, 0, 1],
            "color": [0.6, 0.6, 0.7]
        },
        "water": {
            "type": "flat",
            "coordinates": [5, 5, 0],
            "indices": [],
            "color": [0.2, 0.4, 0.9, 0.8]
        }
    }"#;

    #[test]
    fn parses_layers_in_file_order() {
        let file = CityFile::parse(CITY).unwrap();
        let names: Vec<&str> = file.layers().iter().map(|l| l.name.as_str()).collect();
        assert_eq!(names, ["surface", "buildings", "water"]);
    }

    #[test]
    fn kind_follows_normals_and_declared_type() {
        let file = CityFile::parse(CITY).unwrap();
        let kinds: Vec<LayerKind> = file.layers().iter().map(|l| l.geometry.kind()).collect();
        assert_eq!(kinds, [LayerKind::Flat, LayerKind::Lit, LayerKind::Flat]);
        assert_eq!(file.layers()[1].geometry.color().to_array(), [0.6, 0.6, 0.7, 1.0]);
    }

    #[test]
    fn building_alias_requires_normals() {
        let text = r#"{"towers": {"type": "building", "coordinates": [0,0,0], "indices": [0], "color": [1,1,1,1]}}"#;
        let err = CityFile::parse(text).unwrap_err();
        assert!(matches!(err, LoadError::MissingNormals { ref layer } if layer == "towers"));
    }

    #[test]
    fn truncated_json_is_rejected() {
        let mut layers = LayerCollection::new();
        layers
            .add_layer(&mut CpuBackend, "existing", vec![1.0, 2.0, 3.0], vec![0], Color::WHITE)
            .unwrap();

        let truncated = &CITY[..CITY.len() / 2];
        let loaded = CityFile::parse(truncated)
            .map(|file| file.into_command().apply(&mut layers, &mut CpuBackend));
        assert!(matches!(loaded, Err(LoadError::Json(_))));

        assert_eq!(layers.names().collect::<Vec<_>>(), ["existing"]);
        let c = layers.centroid();
        assert_eq!((c.x, c.y, c.z), (1.0, 2.0, 3.0));
    }

    #[test]
    fn missing_field_names_the_layer() {
        let text = r#"{"parks": {"coordinates": [0,0,0], "color": [0,1,0,1]}}"#;
        let err = CityFile::parse(text).unwrap_err();
        assert!(matches!(err, LoadError::Schema { ref layer, .. } if layer == "parks"));
    }

    #[test]
    fn unknown_type_is_a_schema_error() {
        let text = r#"{"x": {"type": "glass", "coordinates": [], "indices": [], "color": [0,0,0]}}"#;
        assert!(matches!(CityFile::parse(text), Err(LoadError::Schema { .. })));
    }

    #[test]
    fn out_of_range_index_is_rejected_at_load() {
        let text = r#"{"water": {"coordinates": [0,0,0, 1,0,0], "indices": [0, 1, 2], "color": [0,0,1,1]}}"#;
        let err = CityFile::parse(text).unwrap_err();
        assert!(matches!(
            err,
            LoadError::Geometry {
                source: GeometryError::IndexOutOfRange { index: 2, .. },
                ..
            }
        ));
    }

    #[test]
    fn one_bad_layer_rejects_the_whole_file() {
        let text = r#"{
            "good": {"coordinates": [0,0,0], "indices": [0], "color": [1,1,1,1]},
            "bad": {"coordinates": [0,0,0], "indices": [0], "color": [1,1]}
        }"#;
        let mut layers = LayerCollection::new();
        layers
            .add_layer(&mut CpuBackend, "existing", vec![3.0, 3.0, 3.0], vec![], Color::WHITE)
            .unwrap();

        if let Ok(file) = CityFile::parse(text) {
            file.into_command().apply(&mut layers, &mut CpuBackend);
        }
        assert_eq!(layers.names().collect::<Vec<_>>(), ["existing"]);
        assert_eq!(layers.centroid().x, 3.0);
    }

    #[test]
    fn into_command_adds_everything() {
        let mut layers = LayerCollection::new();
        let report = CityFile::parse(CITY)
            .unwrap()
            .into_command()
            .apply(&mut layers, &mut CpuBackend);
        assert_eq!(report.added.len(), 3);
        assert_eq!(layers.vertex_count(), 7);
    }

    #[test]
    fn load_from_disk() {
        let mut tmp = tempfile::NamedTempFile::new().unwrap();
        tmp.write_all(CITY.as_bytes()).unwrap();
        let file = CityFile::load(tmp.path()).unwrap();
        assert_eq!(file.len(), 3);
    }

    #[test]
    fn missing_file_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = CityFile::load(dir.path().join("nope.json")).unwrap_err();
        assert!(matches!(err, LoadError::Io(_)));
    }

    #[test]
    fn top_level_must_be_an_object() {
        assert!(matches!(CityFile::parse("[1, 2, 3]"), Err(LoadError::Json(_))));
    }

    #[test]
    fn bundled_sample_city_loads() {
        let file = CityFile::parse(include_str!("../../../data/sample_city.json")).unwrap();
        let kinds: Vec<_> = file
            .layers()
            .iter()
            .map(|l| (l.name.as_str(), l.geometry.kind()))
            .collect();
        assert_eq!(
            kinds,
            [
                ("ground", LayerKind::Flat),
                ("roads", LayerKind::Flat),
                ("buildings", LayerKind::Lit),
            ]
        );

        let mut layers = LayerCollection::new();
        file.into_command().apply(&mut layers, &mut CpuBackend);
        let c = layers.centroid();
        assert!((0.0..=1000.0).contains(&c.x) && (0.0..=1000.0).contains(&c.y));
        assert!(c.z >= 0.0);
    }
}
