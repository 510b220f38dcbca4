//! Every edit to a `RoadNetwork` produces an `EditCmd`, holding the before and after state of
//! each entity it touched. Undo and redo swap those states back in wholesale, without
//! recomputing anything.

use std::collections::BTreeMap;

use crate::{ControlPoint, ControlPointID, Junction, JunctionID, Road, RoadID, RoadNetwork};

/// The entities of one kind that changed. `None` means the entity didn't exist on that side.
#[derive(Clone, Debug, PartialEq)]
pub struct EntityDiff<K: Ord, V> {
    pub old: BTreeMap<K, Option<V>>,
    pub new: BTreeMap<K, Option<V>>,
}

impl<K: Ord + Copy, V: PartialEq> EntityDiff<K, V> {
    /// Compares the state of some entities from before an edit against their current state,
    /// keeping only the ones that changed.
    pub fn from_before<F: Fn(&K) -> Option<V>>(
        before: BTreeMap<K, Option<V>>,
        current: F,
    ) -> EntityDiff<K, V> {
        let mut old = BTreeMap::new();
        let mut new = BTreeMap::new();
        for (k, v) in before {
            let now = current(&k);
            if now != v {
                new.insert(k, now);
                old.insert(k, v);
            }
        }
        EntityDiff { old, new }
    }

    pub fn is_empty(&self) -> bool {
        self.old.is_empty()
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct EditCmd {
    pub control_points: EntityDiff<ControlPointID, ControlPoint>,
    pub roads: EntityDiff<RoadID, Road>,
    pub junctions: EntityDiff<JunctionID, Junction>,
}

impl EditCmd {
    pub fn is_empty(&self) -> bool {
        self.control_points.is_empty() && self.roads.is_empty() && self.junctions.is_empty()
    }

    /// Human-readable summary, for logging.
    pub fn describe(&self) -> String {
        format!(
            "{} control point groups, {} roads, {} junctions changed",
            self.control_points.old.len(),
            self.roads.old.len(),
            self.junctions.old.len()
        )
    }

    fn apply_old(&self, net: &mut RoadNetwork) {
        net.apply_control_point_state(self.control_points.old.clone());
        net.apply_road_state(self.roads.old.clone());
        net.apply_junction_state(self.junctions.old.clone());
    }

    fn apply_new(&self, net: &mut RoadNetwork) {
        net.apply_control_point_state(self.control_points.new.clone());
        net.apply_road_state(self.roads.new.clone());
        net.apply_junction_state(self.junctions.new.clone());
    }
}

/// Undo and redo stacks of edits.
#[derive(Default)]
pub struct History {
    undo_stack: Vec<EditCmd>,
    redo_stack: Vec<EditCmd>,
}

impl History {
    pub fn new() -> History {
        History::default()
    }

    /// Remembers an edit that was just applied. No-op edits aren't recorded. Anything that was
    /// undone can't be redone anymore.
    pub fn record(&mut self, cmd: EditCmd) {
        if cmd.is_empty() {
            return;
        }
        debug!("Recording edit: {}", cmd.describe());
        self.undo_stack.push(cmd);
        self.redo_stack.clear();
    }

    pub fn undo(&mut self, net: &mut RoadNetwork) -> bool {
        match self.undo_stack.pop() {
            Some(cmd) => {
                cmd.apply_old(net);
                self.redo_stack.push(cmd);
                true
            }
            None => false,
        }
    }

    pub fn redo(&mut self, net: &mut RoadNetwork) -> bool {
        match self.redo_stack.pop() {
            Some(cmd) => {
                cmd.apply_new(net);
                self.undo_stack.push(cmd);
                true
            }
            None => false,
        }
    }

    pub fn can_undo(&self) -> bool {
        !self.undo_stack.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        !self.redo_stack.is_empty()
    }
}
