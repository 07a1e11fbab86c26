//! Common types shared across the dem-render workspace.

pub mod bbox;
pub mod color;
pub mod dimensions;
pub mod error;
pub mod grid;

pub use bbox::BoundingBox;
pub use color::Rgba;
pub use dimensions::{LatLonResolution, ModelDimensions, EARTH_MEAN_RADIUS};
pub use error::{DemError, DemResult};
pub use grid::{is_no_data, ElevationGrid, GeoPoint, MemoryGrid, NO_DATA};
