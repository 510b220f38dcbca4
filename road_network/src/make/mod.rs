//! Everything that derives geometry from the editable state. Nothing in here owns data; the
//! network calls these after each edit, or ships them to the worker pool.

pub mod circle;
pub mod junction_geometry;
pub mod lane_links;
pub mod ref_roads;
pub mod sections;
