//! Work items exchanged between the driver and the pipeline stages.

use crate::geometry::{ScanlinePath, TriangleStrip};
use crate::tile::Tile;
use dem_common::{GeoPoint, Rgba};

/// Build the triangle strips of one tile.
#[derive(Debug, Clone, PartialEq)]
pub struct TileJob {
    pub tile: Tile,
}

/// Rasterize a projected triangle strip.
#[derive(Debug, Clone, PartialEq)]
pub struct TriangleStripFillJob {
    /// Index of the tile the strip came from, if any.
    pub tile: Option<usize>,
    pub strip: TriangleStrip,
}

/// Scanline-fill a projected path.
#[derive(Debug, Clone, PartialEq)]
pub struct ScanlinePathFillJob {
    pub path: ScanlinePath,
    /// Flat fill color; `None` interpolates vertex colors.
    pub fill: Option<Rgba>,
}

/// Geographic vector data, projected by the shape stage.
#[derive(Debug, Clone, PartialEq)]
pub enum Shape {
    /// Closed rings, filled with the even-odd rule.
    Polygon { rings: Vec<Vec<GeoPoint>> },
    /// An open run of connected segments.
    Polyline { points: Vec<GeoPoint> },
}

impl Shape {
    pub fn point_count(&self) -> usize {
        match self {
            Self::Polygon { rings } => rings.iter().map(Vec::len).sum(),
            Self::Polyline { points } => points.len(),
        }
    }
}

/// Project and draw a vector shape.
#[derive(Debug, Clone, PartialEq)]
pub struct ShapeFillJob {
    pub shape: Shape,
    pub color: Rgba,
}

/// Which queue, and therefore which stage, an item belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum WorkKind {
    TileProcess,
    TriangleStripFill,
    ScanlinePathFill,
    ShapeFill,
}

impl WorkKind {
    pub const ALL: [WorkKind; 4] = [
        WorkKind::TileProcess,
        WorkKind::TriangleStripFill,
        WorkKind::ScanlinePathFill,
        WorkKind::ShapeFill,
    ];

    #[inline]
    pub fn index(self) -> usize {
        self as usize
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::TileProcess => "tile-process",
            Self::TriangleStripFill => "triangle-strip-fill",
            Self::ScanlinePathFill => "scanline-path-fill",
            Self::ShapeFill => "shape-fill",
        }
    }

    /// Stages whose items can enqueue work of this kind.
    pub fn upstream(self) -> &'static [WorkKind] {
        match self {
            Self::TriangleStripFill => &[WorkKind::TileProcess],
            _ => &[],
        }
    }

    /// Fed from outside the pipeline rather than by another stage.
    pub fn is_source(self) -> bool {
        self.upstream().is_empty()
    }
}

impl std::fmt::Display for WorkKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum WorkItem {
    Tile(TileJob),
    TriangleStripFill(TriangleStripFillJob),
    ScanlinePathFill(ScanlinePathFillJob),
    ShapeFill(ShapeFillJob),
}

impl WorkItem {
    pub fn kind(&self) -> WorkKind {
        match self {
            Self::Tile(_) => WorkKind::TileProcess,
            Self::TriangleStripFill(_) => WorkKind::TriangleStripFill,
            Self::ScanlinePathFill(_) => WorkKind::ScanlinePathFill,
            Self::ShapeFill(_) => WorkKind::ShapeFill,
        }
    }
}

impl From<TileJob> for WorkItem {
    fn from(job: TileJob) -> Self {
        Self::Tile(job)
    }
}

impl From<TriangleStripFillJob> for WorkItem {
    fn from(job: TriangleStripFillJob) -> Self {
        Self::TriangleStripFill(job)
    }
}

impl From<ScanlinePathFillJob> for WorkItem {
    fn from(job: ScanlinePathFillJob) -> Self {
        Self::ScanlinePathFill(job)
    }
}

impl From<ShapeFillJob> for WorkItem {
    fn from(job: ShapeFillJob) -> Self {
        Self::ShapeFill(job)
    }
}
