//! Synthesizes a road network from a handful of user-placed points. Control point groups define
//! reference lines; roads are cut into sections of lanes along them; junctions stitch road ends
//! together with a boundary mesh and lane-level connectors.
//!
//! Junction work runs on a small thread pool (see `pool`), so edits stay responsive while
//! geometry catches up.

#[macro_use]
extern crate anyhow;
#[macro_use]
extern crate log;

mod config;
pub mod edits;
pub mod make;
mod network;
mod objects;
pub mod pool;
mod selection;

pub use crate::config::EngineConfig;
pub use crate::edits::{EditCmd, EntityDiff, History};
pub use crate::network::{NetworkState, RoadNetwork};
pub use crate::objects::*;
pub use crate::pool::{ExecutionPool, JunctionUpdate, KernelError, Task, TaskOutput};
pub use crate::selection::{Selectable, SelectableKind, Selection};
