use anyhow::Context;
use cityscape_assets::CityFile;
use cityscape_common::{CameraState, ProjectionMode};
use cityscape_input::Action;
use cityscape_kernel::{CpuBackend, LayerCollection};
use cityscape_render::{DebugTextRenderer, RenderContext, Renderer, Viewport};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "cityscape-cli", about = "CLI tool for city scene files")]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check that a city file parses and every layer is valid
    Validate {
        file: PathBuf,
    },
    /// List the layers of a city file and the scene centroid
    Inspect {
        file: PathBuf,
    },
    /// Print the transforms a frame would be drawn with
    Frame {
        file: PathBuf,
        /// Rotation about Z, in degrees
        #[arg(long, default_value = "60")]
        rotation: f32,
        /// Zoom, in percent
        #[arg(long, default_value = "60")]
        zoom: f32,
        /// perspective or orthographic
        #[arg(long, default_value = "perspective")]
        projection: ProjectionMode,
        #[arg(long, default_value = "1280")]
        width: u32,
        #[arg(long, default_value = "720")]
        height: u32,
    },
}

fn load_scene(path: &Path) -> anyhow::Result<LayerCollection<()>> {
    let file = CityFile::load(path).with_context(|| format!("loading {}", path.display()))?;
    let mut layers = LayerCollection::new();
    let report = file.into_command().apply(&mut layers, &mut CpuBackend);
    if let Some(e) = report.failed.into_iter().next() {
        return Err(e).context("initializing layers");
    }
    tracing::info!(
        path = %path.display(),
        layers = layers.len(),
        vertices = layers.vertex_count(),
        "scene loaded"
    );
    Ok(layers)
}

/// Camera for `frame`, clamped the same way the desktop controls clamp it.
fn frame_camera(rotation: f32, zoom: f32, projection: ProjectionMode) -> CameraState {
    let mut camera = CameraState::default();
    for action in [
        Action::SetRotation(rotation),
        Action::SetZoom(zoom),
        Action::SetProjection(projection),
    ] {
        action.apply_to_camera(&mut camera);
    }
    camera
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .init();

    match cli.command {
        Commands::Validate { file } => {
            let city = CityFile::load(&file)
                .with_context(|| format!("{} is not a valid city file", file.display()))?;
            println!("{}: OK ({} layers)", file.display(), city.len());
        }
        Commands::Inspect { file } => {
            let layers = load_scene(&file)?;
            let ctx = RenderContext::new(CameraState::default(), Viewport::default());
            print!("{}", DebugTextRenderer::new().render(&layers, &ctx));
        }
        Commands::Frame {
            file,
            rotation,
            zoom,
            projection,
            width,
            height,
        } => {
            let layers = load_scene(&file)?;
            let camera = frame_camera(rotation, zoom, projection);
            let ctx = RenderContext::new(camera, Viewport::new(width.max(1), height.max(1)));
            print!("{}", DebugTextRenderer::with_matrices().render(&layers, &ctx));
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use cityscape_input::{MAX_ZOOM_PERCENT, MIN_ZOOM_PERCENT};

    #[test]
    fn frame_camera_takes_arguments_in_range() {
        let camera = frame_camera(90.0, 120.0, ProjectionMode::Orthographic);
        assert_eq!(camera.rotation_degrees, 90.0);
        assert_eq!(camera.zoom_percent, 120.0);
        assert_eq!(camera.projection, ProjectionMode::Orthographic);
    }

    #[test]
    fn frame_camera_clamps_like_the_controls() {
        let low = frame_camera(-30.0, 0.0, ProjectionMode::Perspective);
        assert_eq!(low.rotation_degrees, 0.0);
        assert_eq!(low.zoom_percent, MIN_ZOOM_PERCENT);

        let high = frame_camera(720.0, 1000.0, ProjectionMode::Perspective);
        assert_eq!(high.rotation_degrees, 360.0);
        assert_eq!(high.zoom_percent, MAX_ZOOM_PERCENT);
    }

    #[test]
    fn cli_parses_frame_arguments() {
        let cli = Cli::try_parse_from([
            "cityscape-cli",
            "frame",
            "city.json",
            "--zoom",
            "0",
            "--projection",
            "ortho",
        ])
        .unwrap();
        let Commands::Frame {
            zoom, projection, ..
        } = cli.command
        else {
            panic!("expected frame subcommand");
        };
        assert_eq!(zoom, 0.0);
        assert_eq!(projection, ProjectionMode::Orthographic);
    }
}
