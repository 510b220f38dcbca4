use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use abstutil::{deserialize_btreemap, serialize_btreemap};
use geom::{CatmullRom, Curve, Distance, Pt3D};

use crate::RoadID;

/// How finely a group's curve is walked when projecting a new point onto it.
const PROJECTION_DIVISIONS: usize = 1000;

/// Identifies a group of control points, which defines one reference line.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ControlPointID(pub usize);

impl fmt::Display for ControlPointID {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "ControlPoint #{}", self.0)
    }
}

#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RefPointID(pub usize);

impl fmt::Display for RefPointID {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "RefPoint #{}", self.0)
    }
}

/// One point placed by the user.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct RefPoint {
    pub id: RefPointID,
    pub parent: ControlPointID,
    pub pos: Pt3D,
}

/// An ordered list of points defining a reference line. The first road follows the points in
/// order; an optional second road shares the line in the opposite direction.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ControlPoint {
    pub id: ControlPointID,
    pub road_ids: Vec<RoadID>,
    pub points: Vec<RefPoint>,
}

impl ControlPoint {
    pub fn positions(&self) -> Vec<Pt3D> {
        self.points.iter().map(|pt| pt.pos).collect()
    }

    /// The positions a particular road follows.
    pub fn positions_for(&self, road: RoadID) -> Option<Vec<Pt3D>> {
        let idx = self.road_ids.iter().position(|r| *r == road)?;
        let mut pts = self.positions();
        if idx == 1 {
            pts.reverse();
        }
        Some(pts)
    }

    pub fn curve(&self) -> CatmullRom {
        CatmullRom::centripetal(self.positions())
    }

    fn too_close(&self, pos: Pt3D, min_spacing: Distance) -> bool {
        self.points.iter().any(|pt| pt.pos.dist_to(pos) < min_spacing)
    }
}

/// The result of placing a point.
#[derive(Clone, Debug, PartialEq)]
pub struct AddedPoint {
    pub point: RefPoint,
    /// Fraction along the group's curve where the point landed
    pub percent: f64,
    /// Set when the point started a new group, and thus a new road
    pub new_road: Option<RoadID>,
}

#[derive(Clone, Debug, PartialEq)]
pub enum PointRemoval {
    /// At least two points remain
    Removed,
    /// One point remains, so the group's roads have collapsed to a point
    Degenerate,
    /// The last point was removed, so the group is gone
    GroupDeleted(ControlPoint),
}

/// Owns every control point group. Nothing here recomputes road geometry; callers do that after
/// a successful edit.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ControlPointGraph {
    #[serde(
        serialize_with = "serialize_btreemap",
        deserialize_with = "deserialize_btreemap"
    )]
    groups: BTreeMap<ControlPointID, ControlPoint>,
    min_spacing: Distance,
    next_group: usize,
    next_point: usize,
    next_road: usize,
}

impl ControlPointGraph {
    pub fn new(min_spacing: Distance) -> ControlPointGraph {
        ControlPointGraph {
            groups: BTreeMap::new(),
            min_spacing,
            next_group: 0,
            next_point: 0,
            next_road: 0,
        }
    }

    pub fn get(&self, id: ControlPointID) -> Option<&ControlPoint> {
        self.groups.get(&id)
    }

    pub fn all_groups(&self) -> &BTreeMap<ControlPointID, ControlPoint> {
        &self.groups
    }

    /// Road IDs are shared with the connector roads synthesized inside junctions, so they all come
    /// from here.
    pub fn allocate_road_id(&mut self) -> RoadID {
        let id = RoadID(self.next_road);
        self.next_road += 1;
        id
    }

    fn allocate_point(&mut self, parent: ControlPointID, pos: Pt3D) -> RefPoint {
        let id = RefPointID(self.next_point);
        self.next_point += 1;
        RefPoint { id, parent, pos }
    }

    /// Places a point at one end of an existing group, or starts a new group (and road) when
    /// `group` is `None`. Returns `None` without changing anything if the point is too close to
    /// another point of the group, or the group doesn't exist.
    pub fn add_point(
        &mut self,
        pos: Pt3D,
        group: Option<ControlPointID>,
        at_tail: bool,
    ) -> Option<AddedPoint> {
        let group = match group {
            Some(id) => id,
            None => {
                let (id, road) = self.create_group(vec![pos]);
                let point = self.groups[&id].points[0];
                return Some(AddedPoint {
                    point,
                    percent: 0.0,
                    new_road: Some(road),
                });
            }
        };

        let min_spacing = self.min_spacing;
        if self.groups.get(&group)?.too_close(pos, min_spacing) {
            debug!("Rejecting {} for {}: too close to another point", pos, group);
            return None;
        }
        let point = self.allocate_point(group, pos);
        let cp = self.groups.get_mut(&group)?;
        if at_tail {
            cp.points.push(point);
        } else {
            cp.points.insert(0, point);
        }
        Some(AddedPoint {
            point,
            percent: if at_tail { 1.0 } else { 0.0 },
            new_road: None,
        })
    }

    /// Starts a new group through all of the given points, without any spacing checks.
    pub fn create_group(&mut self, pts: Vec<Pt3D>) -> (ControlPointID, RoadID) {
        let id = ControlPointID(self.next_group);
        self.next_group += 1;
        let road = self.allocate_road_id();
        let points = pts
            .into_iter()
            .map(|pos| self.allocate_point(id, pos))
            .collect();
        self.groups.insert(
            id,
            ControlPoint {
                id,
                road_ids: vec![road],
                points,
            },
        );
        (id, road)
    }

    /// Projects `pos` onto the group's curve and inserts it between the existing points it falls
    /// between.
    pub fn insert_tween_point(&mut self, group: ControlPointID, pos: Pt3D) -> Option<AddedPoint> {
        let min_spacing = self.min_spacing;
        let cp = self.groups.get(&group)?;
        if cp.points.len() < 2 {
            return None;
        }
        if cp.too_close(pos, min_spacing) {
            debug!("Rejecting tween {} for {}: too close to another point", pos, group);
            return None;
        }

        let curve = cp.curve();
        let percent = curve.closest_percent(pos, PROJECTION_DIVISIONS);
        // Each existing point sits at a known percent; the list is increasing, so the first one
        // past the projection is where the new point goes.
        let idx = (0..cp.points.len())
            .find(|idx| curve.percent_of_control_point(*idx) > percent)
            .unwrap_or(cp.points.len());
        // Inserting before the first or after the last point isn't a tween
        let idx = idx.clamp(1, cp.points.len() - 1);

        let point = self.allocate_point(group, pos);
        self.groups.get_mut(&group)?.points.insert(idx, point);
        Some(AddedPoint {
            point,
            percent,
            new_road: None,
        })
    }

    pub fn remove_point(
        &mut self,
        group: ControlPointID,
        point: RefPointID,
    ) -> Option<PointRemoval> {
        let cp = self.groups.get_mut(&group)?;
        let idx = cp.points.iter().position(|pt| pt.id == point)?;
        cp.points.remove(idx);
        match cp.points.len() {
            0 => self.groups.remove(&group).map(PointRemoval::GroupDeleted),
            1 => Some(PointRemoval::Degenerate),
            _ => Some(PointRemoval::Removed),
        }
    }

    /// Moves any number of points in one group. Order doesn't change. Returns false if the group
    /// or any of the points is unknown, or if a moved point would land too close to another, in
    /// which case nothing moves.
    pub fn move_points(&mut self, group: ControlPointID, updates: &[(RefPointID, Pt3D)]) -> bool {
        let min_spacing = self.min_spacing;
        let cp = match self.groups.get_mut(&group) {
            Some(cp) => cp,
            None => return false,
        };
        if !updates
            .iter()
            .all(|(id, _)| cp.points.iter().any(|pt| pt.id == *id))
        {
            return false;
        }
        let mut moved = cp.points.clone();
        for (id, pos) in updates {
            for pt in &mut moved {
                if pt.id == *id {
                    pt.pos = *pos;
                }
            }
        }
        let dragged = |pt: &RefPoint| updates.iter().any(|(id, _)| *id == pt.id);
        for (idx, pt1) in moved.iter().enumerate() {
            for pt2 in &moved[idx + 1..] {
                if (dragged(pt1) || dragged(pt2)) && pt1.pos.dist_to(pt2.pos) < min_spacing {
                    return false;
                }
            }
        }
        cp.points = moved;
        true
    }

    /// Replaces all of a group's points, keeping its roads.
    pub fn replace_points(&mut self, group: ControlPointID, pts: Vec<Pt3D>) -> bool {
        if pts.is_empty() || !self.groups.contains_key(&group) {
            return false;
        }
        let points: Vec<RefPoint> = pts
            .into_iter()
            .map(|pos| self.allocate_point(group, pos))
            .collect();
        if let Some(cp) = self.groups.get_mut(&group) {
            cp.points = points;
        }
        true
    }

    /// Attaches a second road to the group, running opposite to the first. At most two roads
    /// share a group.
    pub fn add_reverse_road(&mut self, group: ControlPointID) -> Option<RoadID> {
        if self.groups.get(&group)?.road_ids.len() != 1 {
            return None;
        }
        let road = self.allocate_road_id();
        self.groups.get_mut(&group)?.road_ids.push(road);
        Some(road)
    }

    /// Wholesale replacement used when restoring history. `None` deletes.
    pub(crate) fn restore(&mut self, id: ControlPointID, cp: Option<ControlPoint>) {
        match cp {
            Some(cp) => {
                self.groups.insert(id, cp);
            }
            None => {
                self.groups.remove(&id);
            }
        }
    }
}
