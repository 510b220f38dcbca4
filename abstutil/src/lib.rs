//! The contents of this crate need to be organized better:
//!
//! - Logging setup shared by every binary
//! - JSON file helpers
//! - Serde helpers for maps keyed by structs

#[macro_use]
extern crate log;

mod collections;
mod io;
pub mod logger;

pub use crate::collections::wraparound_get;
pub use crate::io::{
    deserialize_btreemap, from_json, read_json, serialize_btreemap, to_json, write_json,
};
