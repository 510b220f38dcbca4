//! What the user has picked, across every kind of entity. Selections are plain IDs, so they may
//! go stale after an edit; `retain_valid` drops those.

use std::collections::BTreeSet;

use crate::{
    ControlPointID, JunctionID, LaneID, LaneLinkID, RefPointID, RoadID, RoadNetwork, SectionID,
};

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Selectable {
    ControlPoint(ControlPointID),
    RefPoint(ControlPointID, RefPointID),
    Road(RoadID),
    Section(RoadID, SectionID),
    Lane(RoadID, SectionID, LaneID),
    Junction(JunctionID),
    LaneLink(JunctionID, LaneLinkID),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum SelectableKind {
    ControlPoint,
    RefPoint,
    Road,
    Section,
    Lane,
    Junction,
    LaneLink,
}

impl Selectable {
    pub fn kind(self) -> SelectableKind {
        match self {
            Selectable::ControlPoint(_) => SelectableKind::ControlPoint,
            Selectable::RefPoint(_, _) => SelectableKind::RefPoint,
            Selectable::Road(_) => SelectableKind::Road,
            Selectable::Section(_, _) => SelectableKind::Section,
            Selectable::Lane(_, _, _) => SelectableKind::Lane,
            Selectable::Junction(_) => SelectableKind::Junction,
            Selectable::LaneLink(_, _) => SelectableKind::LaneLink,
        }
    }

    /// Does this still refer to something in the network?
    pub fn exists(self, net: &RoadNetwork) -> bool {
        match self {
            Selectable::ControlPoint(id) => net.get_cp(id).is_some(),
            Selectable::RefPoint(group, pt) => net
                .get_cp(group)
                .map(|cp| cp.points.iter().any(|p| p.id == pt))
                .unwrap_or(false),
            Selectable::Road(id) => net.maybe_get_r(id).is_some(),
            Selectable::Section(r, s) => net
                .maybe_get_r(r)
                .and_then(|r| r.get_section(s))
                .is_some(),
            Selectable::Lane(r, s, l) => net
                .maybe_get_r(r)
                .and_then(|r| r.get_section(s))
                .and_then(|s| s.get_lane(l))
                .is_some(),
            Selectable::Junction(id) => net.maybe_get_j(id).is_some(),
            Selectable::LaneLink(j, id) => net
                .maybe_get_j(j)
                .and_then(|j| j.get_lane_link(id))
                .is_some(),
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct Selection {
    selected: BTreeSet<Selectable>,
}

impl Selection {
    pub fn new() -> Selection {
        Selection::default()
    }

    pub fn select(&mut self, item: Selectable) {
        self.selected.insert(item);
    }

    /// Returns true if the item is now selected.
    pub fn toggle(&mut self, item: Selectable) -> bool {
        if self.selected.remove(&item) {
            false
        } else {
            self.selected.insert(item);
            true
        }
    }

    pub fn is_selected(&self, item: Selectable) -> bool {
        self.selected.contains(&item)
    }

    pub fn clear(&mut self) {
        self.selected.clear();
    }

    /// Picking one kind of thing deselects everything of other kinds.
    pub fn unselect_all_except(&mut self, kind: SelectableKind) {
        self.selected.retain(|item| item.kind() == kind);
    }

    pub fn selected_of(&self, kind: SelectableKind) -> Vec<Selectable> {
        self.selected
            .iter()
            .filter(|item| item.kind() == kind)
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.selected.len()
    }

    pub fn is_empty(&self) -> bool {
        self.selected.is_empty()
    }

    /// Forgets anything that was deleted.
    pub fn retain_valid(&mut self, net: &RoadNetwork) {
        self.selected.retain(|item| item.exists(net));
    }
}
