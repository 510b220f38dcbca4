use std::fmt;

use serde::{Deserialize, Serialize};

use geom::{Distance, Pt3D, Side};

use crate::Direction;

/// A lane within one section. Negative IDs run forward along the reference line, on its right;
/// positive IDs run in reverse, on its left. The magnitude counts outwards from the reference
/// line, starting at 1.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct LaneID(pub i32);

impl fmt::Display for LaneID {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "Lane {}", self.0)
    }
}

impl LaneID {
    pub fn new(direction: Direction, idx: usize) -> LaneID {
        let magnitude = idx as i32;
        match direction {
            Direction::Forward => LaneID(-magnitude),
            Direction::Reverse => LaneID(magnitude),
        }
    }

    pub fn direction(self) -> Direction {
        if self.0 < 0 {
            Direction::Forward
        } else {
            Direction::Reverse
        }
    }

    /// 1 for the lane touching the reference line, and so on.
    pub fn index(self) -> usize {
        self.0.unsigned_abs() as usize
    }
}

#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct BoundaryID(pub usize);

/// How wide a lane is along its section.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub enum LaneWidth {
    Constant(Distance),
    /// The width eases from one value to the other over the section, following a smooth tween
    /// curve instead of a linear ramp.
    Transition { from: Distance, to: Distance },
}

impl LaneWidth {
    pub fn at_start(self) -> Distance {
        match self {
            LaneWidth::Constant(w) => w,
            LaneWidth::Transition { from, .. } => from,
        }
    }

    pub fn at_end(self) -> Distance {
        match self {
            LaneWidth::Constant(w) => w,
            LaneWidth::Transition { to, .. } => to,
        }
    }
}

/// Renderable triangles.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GeoAttr {
    /// Flattened xyz triples
    pub vertices: Vec<f32>,
    pub indices: Vec<u32>,
}

impl GeoAttr {
    pub fn num_triangles(&self) -> usize {
        self.indices.len() / 3
    }
}

/// The edge curve between two adjacent lanes, or between a lane and the edge of its section.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LaneBoundary {
    pub id: BoundaryID,
    /// `None` only for the reference line, which both directions share.
    pub side: Option<Side>,
    pub sample_points: Vec<Pt3D>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Lane {
    pub id: LaneID,
    pub width: LaneWidth,
    /// Along the middle of the lane
    pub sample_points: Vec<Pt3D>,
    pub inner_boundary: BoundaryID,
    pub outer_boundary: BoundaryID,
    pub geo_attr: Option<GeoAttr>,
}

impl Lane {
    pub fn new(id: LaneID, width: LaneWidth) -> Lane {
        Lane {
            id,
            width,
            sample_points: Vec::new(),
            inner_boundary: BoundaryID(0),
            outer_boundary: BoundaryID(0),
            geo_attr: None,
        }
    }

    /// The full width, ignoring any transition.
    pub fn normal_width(&self) -> Distance {
        match self.width {
            LaneWidth::Constant(w) => w,
            LaneWidth::Transition { from, to } => from.max(to),
        }
    }

    pub fn is_transition(&self) -> bool {
        matches!(self.width, LaneWidth::Transition { .. })
    }

    pub fn direction(&self) -> Direction {
        self.id.direction()
    }
}
