use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use anyhow::Result;
use serde::{Deserialize, Serialize};

use geom::{Angle, CatmullRom, Curve, Distance, Pt3D, Side};

use crate::{ControlPointID, JunctionID, Section, SectionID};

#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RoadID(pub usize);

impl fmt::Display for RoadID {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "Road #{}", self.0)
    }
}

/// Which way traffic moves, relative to the road's reference line.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Direction {
    Forward,
    Reverse,
}

impl Direction {
    pub fn opposite(self) -> Direction {
        match self {
            Direction::Forward => Direction::Reverse,
            Direction::Reverse => Direction::Forward,
        }
    }

    /// Forward lanes sit on the right of the reference line.
    pub fn side(self) -> Side {
        match self {
            Direction::Forward => Side::Forward,
            Direction::Reverse => Side::Reverse,
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Direction::Forward => write!(f, "forward"),
            Direction::Reverse => write!(f, "reverse"),
        }
    }
}

impl FromStr for Direction {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Direction> {
        match s {
            "forward" => Ok(Direction::Forward),
            "reverse" => Ok(Direction::Reverse),
            _ => bail!("Unknown direction {}", s),
        }
    }
}

/// One end of a road. The end is also called the tail, the start the head.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum RoadEnd {
    Start,
    End,
}

impl RoadEnd {
    pub fn percent(self) -> f64 {
        match self {
            RoadEnd::Start => 0.0,
            RoadEnd::End => 1.0,
        }
    }

    pub fn is_tail(self) -> bool {
        self == RoadEnd::End
    }
}

impl fmt::Display for RoadEnd {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            RoadEnd::Start => write!(f, "start"),
            RoadEnd::End => write!(f, "end"),
        }
    }
}

/// Roads drawn as circular arcs remember the arc, so dragging an end can regenerate the control
/// points.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct CircleOption {
    pub center: Pt3D,
    pub radius: f64,
    pub start: Angle,
    pub end: Angle,
    pub clockwise: bool,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Road {
    pub id: RoadID,
    pub group: ControlPointID,
    /// Derived from the control points; never edited directly.
    pub key_path: CatmullRom,
    pub length: Distance,
    /// Contiguous, covering [0, 1] of the length in order
    pub sections: Vec<Section>,
    /// Control points of (distance along the road, 0, height). When present, overrides the
    /// elevation of the reference line.
    pub elevation_path: Option<CatmullRom>,
    pub link_junction: BTreeSet<JunctionID>,
    pub circle: Option<CircleOption>,
}

impl Road {
    pub fn get_section(&self, id: SectionID) -> Option<&Section> {
        self.sections.get(id.0)
    }

    /// The section touching one end of the road.
    pub fn end_section(&self, end: RoadEnd) -> Option<&Section> {
        match end {
            RoadEnd::Start => self.sections.first(),
            RoadEnd::End => self.sections.last(),
        }
    }

    /// Position on the reference line, honoring the elevation path.
    pub fn point_at(&self, percent: f64) -> Pt3D {
        let pt = self.key_path.point_at(percent);
        match self.elevation_path {
            Some(ref elevation) => pt.with_z(elevation.point_at(percent).z()),
            None => pt,
        }
    }

    /// Unit tangent on the ground plane, in the direction of the reference line.
    pub fn tangent_at(&self, percent: f64) -> Pt3D {
        self.key_path.tangent_at(percent).ground_normalize()
    }

    /// The direction pointing out of the road past one of its ends.
    pub fn outward_tangent(&self, end: RoadEnd) -> Pt3D {
        match end {
            RoadEnd::Start => -self.tangent_at(0.0),
            RoadEnd::End => self.tangent_at(1.0),
        }
    }

    pub fn is_circle_road(&self) -> bool {
        self.circle.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn direction_strings() {
        assert_eq!(Direction::Forward.to_string(), "forward");
        assert_eq!("reverse".parse::<Direction>().unwrap(), Direction::Reverse);
        assert!("sideways".parse::<Direction>().is_err());
    }
}
