use std::fmt;

use serde::{Deserialize, Serialize};

use geom::{Angle, Distance, Pt3D};

use crate::{Direction, LaneID, LinkRoad, RoadEnd, RoadID, SectionID};

#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct LaneLinkID(pub usize);

impl fmt::Display for LaneLinkID {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "LaneLink #{}", self.0)
    }
}

/// One end of one lane, at the mouth of a junction. Displays as
/// `roadId_sectionId_laneId_{start|end}_{forward|reverse}`, which is unique per junction.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct LaneEnd {
    pub road: RoadID,
    pub section: SectionID,
    pub lane: LaneID,
    pub end: RoadEnd,
}

impl LaneEnd {
    pub fn direction(self) -> Direction {
        self.lane.direction()
    }

    /// The side of the road end this lane belongs to.
    pub fn link_road(self) -> LinkRoad {
        LinkRoad::new(self.road, self.end, self.direction())
    }

    /// Traffic in this lane flows into the junction.
    pub fn is_incoming(self) -> bool {
        self.link_road().is_incoming()
    }
}

impl fmt::Display for LaneEnd {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "{}_{}_{}_{}_{}",
            self.road.0,
            self.section.0,
            self.lane.0,
            self.end,
            self.direction()
        )
    }
}

/// Where a lane meets the junction.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LaneEndInfo {
    pub lane_end: LaneEnd,
    pub point: Pt3D,
    /// Unit vector pointing out of the lane, into the junction
    pub tangent: Pt3D,
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct HeadingPoint {
    pub pos: Pt3D,
    pub hdg: Angle,
}

/// A connector curve inside a junction from the end of one lane to the start of another.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LaneLink {
    pub id: LaneLinkID,
    pub from: LaneEnd,
    pub to: LaneEnd,
    /// The connector is also exported as a road of its own
    pub road_id: RoadID,
    pub length: Distance,
    pub sample_points: Vec<Pt3D>,
    /// A few points along the connector, plus one mirrored point past each end
    pub control_points: Vec<HeadingPoint>,
    pub enabled: bool,
}

impl LaneLink {
    pub fn flag(&self) -> (LaneEnd, LaneEnd) {
        (self.from, self.to)
    }
}
