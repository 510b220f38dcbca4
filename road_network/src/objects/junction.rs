use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use anyhow::Result;
use serde::{Deserialize, Serialize};

use geom::Pt3D;

use crate::{Direction, GeoAttr, LaneLink, LaneLinkID, RoadEnd, RoadID};

#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct JunctionID(pub usize);

impl fmt::Display for JunctionID {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "Junction #{}", self.0)
    }
}

/// One side of one road end taking part in a junction. Written as `roadId_percent_direction`,
/// like `3_1_forward`.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct LinkRoad {
    pub road: RoadID,
    pub end: RoadEnd,
    pub direction: Direction,
}

impl LinkRoad {
    pub fn new(road: RoadID, end: RoadEnd, direction: Direction) -> LinkRoad {
        LinkRoad {
            road,
            end,
            direction,
        }
    }

    /// Traffic on this side of the road flows into the junction.
    pub fn is_incoming(self) -> bool {
        match (self.end, self.direction) {
            (RoadEnd::End, Direction::Forward) | (RoadEnd::Start, Direction::Reverse) => true,
            (RoadEnd::End, Direction::Reverse) | (RoadEnd::Start, Direction::Forward) => false,
        }
    }
}

impl fmt::Display for LinkRoad {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let percent = match self.end {
            RoadEnd::Start => 0,
            RoadEnd::End => 1,
        };
        write!(f, "{}_{}_{}", self.road.0, percent, self.direction)
    }
}

impl FromStr for LinkRoad {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<LinkRoad> {
        let parts: Vec<&str> = s.split('_').collect();
        if parts.len() != 3 {
            bail!("Link road {} isn't roadId_percent_direction", s);
        }
        let road = RoadID(parts[0].parse()?);
        let end = match parts[1] {
            "0" => RoadEnd::Start,
            "1" => RoadEnd::End,
            x => bail!("Link road {} has percent {}; only 0 or 1 are allowed", s, x),
        };
        Ok(LinkRoad::new(road, end, parts[2].parse()?))
    }
}

/// How one link road meets the junction, derived from the road's current geometry.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RefRoad {
    pub link: LinkRoad,
    /// Unit vector on the ground pointing out of the road, into the junction
    pub along_vec: Pt3D,
    /// The corners of the road mouth, to the left and right of the reference line's direction
    pub left_point: Pt3D,
    pub right_point: Pt3D,
}

impl RefRoad {
    pub fn is_tail(&self) -> bool {
        self.link.end.is_tail()
    }

    pub fn mouth_center(&self) -> Pt3D {
        self.left_point.midpoint(self.right_point)
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Junction {
    pub id: JunctionID,
    pub link_roads: BTreeSet<LinkRoad>,
    pub ref_roads: Vec<RefRoad>,
    pub lane_links: Vec<LaneLink>,
    /// `None` until at least two link roads produce a boundary
    pub geo_attr: Option<GeoAttr>,
}

impl Junction {
    pub fn new(id: JunctionID) -> Junction {
        Junction {
            id,
            link_roads: BTreeSet::new(),
            ref_roads: Vec::new(),
            lane_links: Vec::new(),
            geo_attr: None,
        }
    }

    pub fn roads(&self) -> BTreeSet<RoadID> {
        self.link_roads.iter().map(|l| l.road).collect()
    }

    pub fn get_lane_link(&self, id: LaneLinkID) -> Option<&LaneLink> {
        self.lane_links.iter().find(|l| l.id == id)
    }

    pub fn is_multiple_road(&self) -> bool {
        self.link_roads.len() > 2
    }
}
