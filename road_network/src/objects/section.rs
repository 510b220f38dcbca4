use std::fmt;

use serde::{Deserialize, Serialize};

use geom::Distance;

use crate::{Direction, Lane, LaneBoundary, LaneID};

/// Sections are numbered from the start of their road, starting at 0.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SectionID(pub usize);

impl fmt::Display for SectionID {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "Section #{}", self.0)
    }
}

/// A longitudinal slice of a road with a fixed set of lanes. `p_start` and `p_end` are fractions
/// of the road's length.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Section {
    pub id: SectionID,
    pub p_start: f64,
    pub p_end: f64,
    pub length: Distance,
    /// Forward lanes from the reference line outwards, then reverse lanes likewise
    pub lanes: Vec<Lane>,
    /// The reference line first, then one outer boundary per lane
    pub boundaries: Vec<LaneBoundary>,
}

impl Section {
    pub fn new(id: SectionID, p_start: f64, p_end: f64, lanes: Vec<Lane>) -> Section {
        let mut section = Section {
            id,
            p_start,
            p_end,
            length: Distance::ZERO,
            lanes,
            boundaries: Vec::new(),
        };
        section.sort_lanes();
        section
    }

    pub fn get_lane(&self, id: LaneID) -> Option<&Lane> {
        self.lanes.iter().find(|l| l.id == id)
    }

    /// Lanes going one way, from the reference line outwards.
    pub fn lanes_in(&self, direction: Direction) -> Vec<&Lane> {
        self.lanes
            .iter()
            .filter(|l| l.direction() == direction)
            .collect()
    }

    pub fn has_direction(&self, direction: Direction) -> bool {
        self.lanes.iter().any(|l| l.direction() == direction)
    }

    pub fn contains(&self, percent: f64) -> bool {
        self.p_start <= percent && percent <= self.p_end
    }

    pub(crate) fn sort_lanes(&mut self) {
        self.lanes
            .sort_by_key(|l| (l.direction() != Direction::Forward, l.id.index()));
    }

    /// Drops one lane, shifting the lanes outside of it inwards so the indices stay contiguous.
    pub(crate) fn remove_lane(&mut self, id: LaneID) -> Option<Lane> {
        let idx = self.lanes.iter().position(|l| l.id == id)?;
        let removed = self.lanes.remove(idx);
        for lane in &mut self.lanes {
            if lane.direction() == id.direction() && lane.id.index() > id.index() {
                lane.id = LaneID::new(id.direction(), lane.id.index() - 1);
            }
        }
        Some(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::LaneWidth;

    #[test]
    fn removing_renumbers_outer_lanes() {
        let width = LaneWidth::Constant(Distance::meters(3.5));
        let mut section = Section::new(
            SectionID(0),
            0.0,
            1.0,
            vec![
                Lane::new(LaneID(2), width),
                Lane::new(LaneID(-2), width),
                Lane::new(LaneID(-1), width),
                Lane::new(LaneID(-3), width),
                Lane::new(LaneID(1), width),
            ],
        );
        let ids: Vec<i32> = section.lanes.iter().map(|l| l.id.0).collect();
        assert_eq!(ids, vec![-1, -2, -3, 1, 2]);

        section.remove_lane(LaneID(-2)).unwrap();
        let ids: Vec<i32> = section.lanes.iter().map(|l| l.id.0).collect();
        assert_eq!(ids, vec![-1, -2, 1, 2]);
        assert!(section.remove_lane(LaneID(-3)).is_none());
    }
}
