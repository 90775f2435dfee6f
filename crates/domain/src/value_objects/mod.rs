//! Value objects - Immutable objects defined by their attributes

mod admin_level;
mod coordinates;
mod geo_path;
mod names;
mod short_name;

pub use admin_level::AdminLevel;
pub use coordinates::{Coordinates, CountryCode};
pub use geo_path::GeoPath;
pub use names::NodeName;
pub use short_name::{ShortName, STATS_SEGMENT};
