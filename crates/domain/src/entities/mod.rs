//! Entity module - plain data records persisted by the engine.

mod geographic_node;
mod legacy;
mod place;

pub use geographic_node::{GeographicNode, LegacyLinkage, NewGeographicNode};
pub use legacy::{LegacyRow, LegacyRowPatch, NewLegacyRow};
pub use place::{NewPlace, Page, Place, PlaceKind, PlaceSort, PlaceTypeFilter, SpotNameId};
