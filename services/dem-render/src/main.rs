//! DEM render service.
//!
//! Renders a shaded-relief image of a terrain extent to a PNG file.

mod terrain;

use anyhow::{Context, Result};
use clap::Parser;
use dem_common::BoundingBox;
use projection::ProjectionKind;
use renderer::{png, Canvas, RenderConfig, RenderMode, TileDriver};
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{debug, info, warn};
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser, Debug)]
#[command(name = "dem-render")]
#[command(about = "Render a digital elevation model to a PNG image")]
struct Args {
    /// JSON configuration file (defaults plus DEM_* environment overrides otherwise)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Output PNG path
    #[arg(short, long, default_value = "terrain.png")]
    output: PathBuf,

    /// Output width in pixels
    #[arg(long)]
    width: Option<usize>,

    /// Output height in pixels
    #[arg(long)]
    height: Option<usize>,

    #[arg(long, default_value = "47.5", allow_hyphen_values = true)]
    north: f64,

    #[arg(long, default_value = "45.5", allow_hyphen_values = true)]
    south: f64,

    #[arg(long, default_value = "11.0", allow_hyphen_values = true)]
    east: f64,

    #[arg(long, default_value = "6.0", allow_hyphen_values = true)]
    west: f64,

    /// Grid spacing of the generated terrain, degrees
    #[arg(long, default_value = "0.01")]
    resolution: f64,

    /// direct or pipelined
    #[arg(long, env = "DEM_RENDER_MODE")]
    mode: Option<String>,

    /// equirectangular or mercator
    #[arg(long)]
    projection: Option<String>,

    /// Vertical exaggeration
    #[arg(long)]
    elevation_multiple: Option<f64>,

    /// View pitch in degrees
    #[arg(long, allow_hyphen_values = true)]
    rotate_x: Option<f64>,

    /// View yaw in degrees
    #[arg(long, allow_hyphen_values = true)]
    rotate_y: Option<f64>,

    #[arg(long)]
    zoom: Option<f64>,

    /// Draw a latitude/longitude grid under the terrain
    #[arg(long)]
    base_grid: bool,

    /// Print the render report as JSON on stdout
    #[arg(long)]
    report: bool,

    /// Log level
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Emit logs as JSON
    #[arg(long)]
    json_logs: bool,
}

impl Args {
    fn bounds(&self) -> BoundingBox {
        BoundingBox::new(self.north, self.south, self.east, self.west)
    }

    /// Layer command-line overrides on top of `config`.
    fn apply(&self, config: &mut RenderConfig) {
        if let Some(width) = self.width {
            config.width = width;
        }
        if let Some(height) = self.height {
            config.height = height;
        }
        if let Some(mode) = &self.mode {
            config.mode = RenderMode::from_str(mode);
        }
        if let Some(projection) = &self.projection {
            config.map_projection = ProjectionKind::from_str(projection);
        }
        if let Some(multiple) = self.elevation_multiple {
            config.elevation_multiple = multiple;
        }
        if let Some(rotate_x) = self.rotate_x {
            config.projection.rotate_x = rotate_x;
        }
        if let Some(rotate_y) = self.rotate_y {
            config.projection.rotate_y = rotate_y;
        }
        if let Some(zoom) = self.zoom {
            config.projection.zoom = zoom;
        }
        if self.base_grid {
            config.paint_base_grid = true;
        }
    }
}

fn init_tracing(args: &Args) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));

    let builder = fmt().with_env_filter(filter).with_target(true).with_level(true);
    if args.json_logs {
        builder.json().init();
    } else {
        builder.init();
    }
}

fn main() -> Result<()> {
    let args = Args::parse();
    init_tracing(&args);

    let mut config = match &args.config {
        Some(path) => RenderConfig::from_json_file(path)
            .with_context(|| format!("reading config {}", path.display()))?,
        None => RenderConfig::from_env(),
    };
    args.apply(&mut config);
    config.validate()?;

    let bounds = args.bounds();
    if !bounds.is_valid() {
        anyhow::bail!("invalid bounds {:?}", bounds);
    }
    if !(args.resolution > 0.0) {
        anyhow::bail!("resolution must be > 0, got {}", args.resolution);
    }

    info!(
        north = bounds.north,
        south = bounds.south,
        east = bounds.east,
        west = bounds.west,
        resolution = args.resolution,
        mode = %config.mode,
        "Generating terrain"
    );
    let grid = terrain::synthetic_grid(bounds, args.resolution)?;
    info!(rows = grid.rows(), columns = grid.columns(), "Terrain ready");

    let mut driver = TileDriver::new(config, Arc::new(grid));

    // Log roughly every tenth of the way.
    let last_decile = Arc::new(AtomicU64::new(0));
    driver.add_listener(move |canvas: &Canvas, fraction: f64| {
        let decile = (fraction * 10.0).floor() as u64;
        if decile > last_decile.swap(decile, Ordering::Relaxed) {
            info!(
                percent = (fraction * 100.0).round() as u64,
                fragments = canvas.written_fragments(),
                "Render progress"
            );
        } else {
            debug!(fraction, "Tile submitted");
        }
    });

    let output = driver.render()?;
    let report = &output.report;
    if report.failed_tiles > 0 {
        warn!(failed = report.failed_tiles, "Some tiles were skipped");
    }
    if report.dropped_fragments > 0 {
        warn!(dropped = report.dropped_fragments, "Fragments fell outside the canvas");
    }

    png::write_png(&output.image, &args.output)
        .with_context(|| format!("writing {}", args.output.display()))?;
    info!(
        path = %args.output.display(),
        width = output.image.width,
        height = output.image.height,
        covered = output.image.covered_pixels(),
        elapsed_ms = report.elapsed_ms,
        "Image written"
    );

    if args.report {
        println!("{}", serde_json::to_string_pretty(report)?);
    }

    Ok(())
}
