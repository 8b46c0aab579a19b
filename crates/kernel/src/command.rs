use crate::collection::{LayerBackend, LayerCollection, SceneError};
use cityscape_common::LayerGeometry;
use std::collections::VecDeque;

/// A validated layer waiting to be inserted.
#[derive(Debug, Clone, PartialEq)]
pub struct NamedLayer {
    pub name: String,
    pub geometry: LayerGeometry,
}

impl NamedLayer {
    pub fn new(name: impl Into<String>, geometry: LayerGeometry) -> Self {
        Self {
            name: name.into(),
            geometry,
        }
    }
}

/// A scene mutation, applied to the collection between two frames.
#[derive(Debug, Clone, PartialEq)]
pub enum SceneCommand {
    /// Insert every layer from one loaded file.
    AddLayers(Vec<NamedLayer>),
    RemoveLayer(String),
    Clear,
}

/// Outcome of applying one command.
#[derive(Debug, Default)]
pub struct ApplyReport {
    pub added: Vec<String>,
    pub removed: Vec<String>,
    /// Layers whose initialization failed; they were not inserted.
    pub failed: Vec<SceneError>,
    /// Names that were asked to be removed but were not present.
    pub missing: Vec<String>,
}

impl ApplyReport {
    pub fn is_clean(&self) -> bool {
        self.failed.is_empty() && self.missing.is_empty()
    }
}

impl SceneCommand {
    /// Apply this command to `layers`, initializing new layers through `backend`.
    pub fn apply<B>(self, layers: &mut LayerCollection<B::Resources>, backend: &mut B) -> ApplyReport
    where
        B: LayerBackend,
    {
        let mut report = ApplyReport::default();
        match self {
            SceneCommand::AddLayers(batch) => {
                for NamedLayer { name, geometry } in batch {
                    match layers.insert(backend, name.clone(), geometry) {
                        Ok(()) => report.added.push(name),
                        Err(e) => {
                            tracing::error!("{e}");
                            report.failed.push(e);
                        }
                    }
                }
            }
            SceneCommand::RemoveLayer(name) => {
                if layers.remove_layer(&name).is_some() {
                    report.removed.push(name);
                } else {
                    tracing::warn!(layer = %name, "remove requested for unknown layer");
                    report.missing.push(name);
                }
            }
            SceneCommand::Clear => {
                report.removed = layers.names().map(str::to_string).collect();
                layers.clear();
            }
        }
        tracing::info!(
            added = report.added.len(),
            removed = report.removed.len(),
            failed = report.failed.len(),
            centroid = ?layers.centroid(),
            "scene command applied"
        );
        report
    }
}

/// FIFO of scene commands produced by UI callbacks and file loads.
#[derive(Debug, Default)]
pub struct CommandQueue {
    pending: VecDeque<SceneCommand>,
}

impl CommandQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, command: SceneCommand) {
        self.pending.push_back(command);
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Drain and apply every pending command in order.
    pub fn apply_pending<B>(
        &mut self,
        layers: &mut LayerCollection<B::Resources>,
        backend: &mut B,
    ) -> Vec<ApplyReport>
    where
        B: LayerBackend,
    {
        self.pending
            .drain(..)
            .map(|command| command.apply(layers, backend))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collection::CpuBackend;
    use cityscape_common::Color;
    use glam::Vec3;

    fn point(name: &str, x: f32) -> NamedLayer {
        NamedLayer::new(
            name,
            LayerGeometry::flat(vec![x, 0.0, 0.0], vec![0], Color::WHITE).unwrap(),
        )
    }

    #[test]
    fn commands_apply_in_order() {
        let mut layers = LayerCollection::new();
        let mut queue = CommandQueue::new();
        queue.push(SceneCommand::AddLayers(vec![point("a", 0.0), point("b", 2.0)]));
        queue.push(SceneCommand::RemoveLayer("a".into()));
        assert_eq!(queue.len(), 2);

        let reports = queue.apply_pending(&mut layers, &mut CpuBackend);
        assert!(queue.is_empty());
        assert_eq!(reports.len(), 2);
        assert_eq!(reports[0].added, ["a", "b"]);
        assert_eq!(reports[1].removed, ["a"]);
        assert_eq!(layers.names().collect::<Vec<_>>(), ["b"]);
        assert_eq!(layers.centroid(), Vec3::new(2.0, 0.0, 0.0));
    }

    #[test]
    fn nothing_changes_until_applied() {
        let mut layers: LayerCollection<()> = LayerCollection::new();
        let mut queue = CommandQueue::new();
        queue.push(SceneCommand::AddLayers(vec![point("a", 1.0)]));
        assert!(layers.is_empty());
        queue.apply_pending(&mut layers, &mut CpuBackend);
        assert_eq!(layers.len(), 1);
    }

    #[test]
    fn removing_unknown_layer_is_reported() {
        let mut layers: LayerCollection<()> = LayerCollection::new();
        let report = SceneCommand::RemoveLayer("ghost".into()).apply(&mut layers, &mut CpuBackend);
        assert_eq!(report.missing, ["ghost"]);
        assert!(!report.is_clean());
    }

    #[test]
    fn clear_reports_removed_names() {
        let mut layers = LayerCollection::new();
        SceneCommand::AddLayers(vec![point("a", 1.0), point("b", 2.0)])
            .apply(&mut layers, &mut CpuBackend);
        let report = SceneCommand::Clear.apply(&mut layers, &mut CpuBackend);
        assert_eq!(report.removed, ["a", "b"]);
        assert!(layers.is_empty());
        assert!(report.is_clean());
    }
}
