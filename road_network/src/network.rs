use std::collections::{BTreeMap, BTreeSet};

use anyhow::Result;
use serde::{Deserialize, Serialize};

use abstutil::{deserialize_btreemap, serialize_btreemap};
use geom::{Angle, Distance, Pt3D};

use crate::edits::{EditCmd, EntityDiff};
use crate::make::junction_geometry::JunctionBoundaryRequest;
use crate::make::lane_links::{resolve_lane_links, LaneLinkRequest, ResolvedLaneLink};
use crate::make::ref_roads::{lane_end_infos, ref_road};
use crate::make::sections;
use crate::pool::{ExecutionPool, JunctionUpdate};
use crate::{
    AddedPoint, CircleOption, ControlPoint, ControlPointGraph, ControlPointID, Direction,
    EngineConfig, Junction, JunctionID, LaneEnd, LaneEndInfo, LaneID, LaneLink, LaneLinkID,
    LinkRoad, PointRemoval, RefPointID, RefRoad, Road, RoadEnd, RoadID, SectionID,
};

/// Everything needed to rebuild a `RoadNetwork`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct NetworkState {
    pub config: EngineConfig,
    pub control_points: ControlPointGraph,
    #[serde(
        serialize_with = "serialize_btreemap",
        deserialize_with = "deserialize_btreemap"
    )]
    pub roads: BTreeMap<RoadID, Road>,
    #[serde(
        serialize_with = "serialize_btreemap",
        deserialize_with = "deserialize_btreemap"
    )]
    pub junctions: BTreeMap<JunctionID, Junction>,
    pub next_junction: usize,
    pub next_lane_link: usize,
}

/// Owns all editable state. Every edit goes through here, recomputes whatever geometry depends
/// on it, and returns an `EditCmd` describing what changed.
pub struct RoadNetwork {
    config: EngineConfig,
    control_points: ControlPointGraph,
    roads: BTreeMap<RoadID, Road>,
    junctions: BTreeMap<JunctionID, Junction>,
    next_junction: usize,
    next_lane_link: usize,

    pool: ExecutionPool,
    /// Ref roads computed when a junction update was dispatched, waiting for the results
    pending: BTreeMap<JunctionID, (u64, Vec<RefRoad>)>,
    /// Only set while an edit runs
    touched: Option<Touched>,
}

/// The state of every entity an edit has touched so far, from before the edit started. `None`
/// means the entity didn't exist yet.
#[derive(Default)]
struct Touched {
    control_points: BTreeMap<ControlPointID, Option<ControlPoint>>,
    roads: BTreeMap<RoadID, Option<Road>>,
    junctions: BTreeMap<JunctionID, Option<Junction>>,
}

impl RoadNetwork {
    pub fn new(config: EngineConfig) -> RoadNetwork {
        let pool = ExecutionPool::new(config.num_workers);
        RoadNetwork {
            control_points: ControlPointGraph::new(config.min_point_spacing),
            config,
            roads: BTreeMap::new(),
            junctions: BTreeMap::new(),
            next_junction: 0,
            next_lane_link: 0,
            pool,
            pending: BTreeMap::new(),
            touched: None,
        }
    }

    pub fn from_state(state: NetworkState) -> RoadNetwork {
        let pool = ExecutionPool::new(state.config.num_workers);
        RoadNetwork {
            config: state.config,
            control_points: state.control_points,
            roads: state.roads,
            junctions: state.junctions,
            next_junction: state.next_junction,
            next_lane_link: state.next_lane_link,
            pool,
            pending: BTreeMap::new(),
            touched: None,
        }
    }

    pub fn snapshot(&self) -> NetworkState {
        NetworkState {
            config: self.config.clone(),
            control_points: self.control_points.clone(),
            roads: self.roads.clone(),
            junctions: self.junctions.clone(),
            next_junction: self.next_junction,
            next_lane_link: self.next_lane_link,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn get_r(&self, id: RoadID) -> &Road {
        &self.roads[&id]
    }

    pub fn maybe_get_r(&self, id: RoadID) -> Option<&Road> {
        self.roads.get(&id)
    }

    pub fn get_j(&self, id: JunctionID) -> &Junction {
        &self.junctions[&id]
    }

    pub fn maybe_get_j(&self, id: JunctionID) -> Option<&Junction> {
        self.junctions.get(&id)
    }

    pub fn get_cp(&self, id: ControlPointID) -> Option<&ControlPoint> {
        self.control_points.get(id)
    }

    pub fn all_roads(&self) -> &BTreeMap<RoadID, Road> {
        &self.roads
    }

    pub fn all_junctions(&self) -> &BTreeMap<JunctionID, Junction> {
        &self.junctions
    }

    pub fn all_control_points(&self) -> &BTreeMap<ControlPointID, ControlPoint> {
        self.control_points.all_groups()
    }

    /// Runs an edit, diffing everything it touched. Edits must check everything that could make
    /// them fail before mutating anything.
    fn edit<T, F>(&mut self, f: F) -> Option<(T, EditCmd)>
    where
        F: FnOnce(&mut RoadNetwork) -> Option<T>,
    {
        self.touched = Some(Touched::default());
        let result = f(self);
        let touched = self.touched.take().unwrap_or_default();
        Some((result?, self.diff_touched(touched)))
    }

    fn try_edit<T, F>(&mut self, f: F) -> Result<(T, EditCmd)>
    where
        F: FnOnce(&mut RoadNetwork) -> Result<T>,
    {
        self.touched = Some(Touched::default());
        let result = f(self);
        let touched = self.touched.take().unwrap_or_default();
        Ok((result?, self.diff_touched(touched)))
    }

    fn diff_touched(&self, touched: Touched) -> EditCmd {
        EditCmd {
            control_points: EntityDiff::from_before(touched.control_points, |id| {
                self.control_points.get(*id).cloned()
            }),
            roads: EntityDiff::from_before(touched.roads, |id| self.roads.get(id).cloned()),
            junctions: EntityDiff::from_before(touched.junctions, |id| {
                self.junctions.get(id).cloned()
            }),
        }
    }
}

// Every mutation during an edit goes through these, so the edit knows what to diff.
impl RoadNetwork {
    fn touch_group(&mut self, id: ControlPointID) {
        if let Some(ref mut touched) = self.touched {
            let graph = &self.control_points;
            touched
                .control_points
                .entry(id)
                .or_insert_with(|| graph.get(id).cloned());
        }
    }

    /// For a group that was just created
    fn created_group(&mut self, id: ControlPointID) {
        if let Some(ref mut touched) = self.touched {
            touched.control_points.entry(id).or_insert(None);
        }
    }

    fn touch_road(&mut self, id: RoadID) {
        if let Some(ref mut touched) = self.touched {
            let roads = &self.roads;
            touched
                .roads
                .entry(id)
                .or_insert_with(|| roads.get(&id).cloned());
        }
    }

    fn touch_junction(&mut self, id: JunctionID) {
        if let Some(ref mut touched) = self.touched {
            let junctions = &self.junctions;
            touched
                .junctions
                .entry(id)
                .or_insert_with(|| junctions.get(&id).cloned());
        }
    }

    fn road_mut(&mut self, id: RoadID) -> Option<&mut Road> {
        self.touch_road(id);
        self.roads.get_mut(&id)
    }

    fn insert_road(&mut self, road: Road) {
        self.touch_road(road.id);
        self.roads.insert(road.id, road);
    }

    fn take_road(&mut self, id: RoadID) -> Option<Road> {
        self.touch_road(id);
        self.roads.remove(&id)
    }

    fn junction_mut(&mut self, id: JunctionID) -> Option<&mut Junction> {
        self.touch_junction(id);
        self.junctions.get_mut(&id)
    }

    fn insert_junction(&mut self, junction: Junction) {
        self.touch_junction(junction.id);
        self.junctions.insert(junction.id, junction);
    }

    fn take_junction(&mut self, id: JunctionID) -> Option<Junction> {
        self.touch_junction(id);
        self.junctions.remove(&id)
    }
}

// Control point edits
impl RoadNetwork {
    /// Places a point at one end of a group, or starts a new road when `group` is `None`. Points
    /// too close to another point of the group are rejected.
    pub fn add_point(
        &mut self,
        pos: Pt3D,
        group: Option<ControlPointID>,
        at_tail: bool,
    ) -> Option<(AddedPoint, EditCmd)> {
        self.edit(|net| {
            if let Some(group) = group {
                net.touch_group(group);
            }
            let added = net.control_points.add_point(pos, group, at_tail)?;
            let group = added.point.parent;
            if let Some(id) = added.new_road {
                net.created_group(group);
                let road = sections::new_road(id, group, vec![pos], &net.config);
                net.insert_road(road);
                info!("Started {} at {}", id, pos);
                return Some(added);
            }
            let end = if at_tail { RoadEnd::End } else { RoadEnd::Start };
            net.follow_group(group, Some(end));
            Some(added)
        })
    }

    /// Places a point between two existing points of a group, wherever it projects onto the
    /// curve.
    pub fn insert_tween_point(
        &mut self,
        group: ControlPointID,
        pos: Pt3D,
    ) -> Option<(AddedPoint, EditCmd)> {
        self.edit(|net| {
            net.touch_group(group);
            let added = net.control_points.insert_tween_point(group, pos)?;
            net.follow_group(group, None);
            Some(added)
        })
    }

    /// Removing the last point of a group deletes its roads, disconnecting them from junctions.
    pub fn remove_point(
        &mut self,
        group: ControlPointID,
        point: RefPointID,
    ) -> Option<(PointRemoval, EditCmd)> {
        self.edit(|net| {
            net.touch_group(group);
            let removal = net.control_points.remove_point(group, point)?;
            match removal {
                PointRemoval::GroupDeleted(ref cp) => {
                    for road in &cp.road_ids {
                        net.delete_road(*road);
                    }
                }
                PointRemoval::Removed | PointRemoval::Degenerate => {
                    net.follow_group(group, None);
                }
            }
            Some(removal)
        })
    }

    pub fn move_points(
        &mut self,
        group: ControlPointID,
        updates: &[(RefPointID, Pt3D)],
    ) -> Option<((), EditCmd)> {
        self.edit(|net| {
            net.touch_group(group);
            if !net.control_points.move_points(group, updates) {
                debug!("Can't move points of {}", group);
                return None;
            }
            // Free dragging breaks the arc
            for road in net.group_roads(group) {
                if let Some(r) = net.road_mut(road) {
                    r.circle = None;
                }
            }
            net.follow_group(group, None);
            Some(())
        })
    }

    /// Adds a second road sharing a group's reference line, running the other way. It only gets
    /// forward lanes, since reverse traffic is the first road's.
    pub fn add_reverse_road(&mut self, group: ControlPointID) -> Option<(RoadID, EditCmd)> {
        self.edit(|net| {
            net.touch_group(group);
            let id = net.control_points.add_reverse_road(group)?;
            let pts = net.control_points.get(group)?.positions_for(id)?;
            let cfg = EngineConfig {
                default_reverse_lanes: 0,
                ..net.config.clone()
            };
            net.insert_road(sections::new_road(id, group, pts, &cfg));
            Some(id)
        })
    }

    /// Builds a road along a circular arc.
    pub fn create_circle_road(&mut self, circle: CircleOption) -> Result<(RoadID, EditCmd)> {
        circle.validate(self.config.min_circle_sweep())?;
        self.try_edit(|net| {
            let pts = circle.control_points(net.config.circle_step(), net.config.min_point_spacing);
            let (group, id) = net.control_points.create_group(pts.clone());
            net.created_group(group);
            let mut road = sections::new_road(id, group, pts, &net.config);
            road.circle = Some(circle);
            net.insert_road(road);
            info!("Created circle {} sweeping {}", id, circle.sweep());
            Ok(id)
        })
    }

    /// Moves one end of a circle road around its circle. Rejected if the arc would get too short
    /// or too close to a full circle.
    pub fn drag_circle_endpoint(
        &mut self,
        road: RoadID,
        end: RoadEnd,
        angle: Angle,
    ) -> Option<((), EditCmd)> {
        let min = self.config.min_circle_sweep();
        let r = self.roads.get(&road)?;
        let moved = match r.circle?.with_endpoint(end, angle, min) {
            Some(moved) => moved,
            None => {
                debug!("Rejecting drag of {} {} to {}", road, end, angle);
                return None;
            }
        };
        let group = r.group;
        self.edit(|net| {
            let pts = moved.control_points(net.config.circle_step(), net.config.min_point_spacing);
            net.touch_group(group);
            if !net.control_points.replace_points(group, pts) {
                return None;
            }
            net.follow_group(group, Some(end));
            if let Some(r) = net.road_mut(road) {
                r.circle = Some(moved);
            }
            Some(())
        })
    }

    fn group_roads(&self, group: ControlPointID) -> Vec<RoadID> {
        self.control_points
            .get(group)
            .map(|cp| cp.road_ids.clone())
            .unwrap_or_default()
    }

    /// After a group's points change, reshapes its roads and the junctions they touch. `grown_at`
    /// is relative to the group's point order.
    fn follow_group(&mut self, group: ControlPointID, grown_at: Option<RoadEnd>) {
        let cp = match self.control_points.get(group) {
            Some(cp) => cp.clone(),
            None => return,
        };
        for (idx, id) in cp.road_ids.iter().enumerate() {
            let pts = match cp.positions_for(*id) {
                Some(pts) => pts,
                None => continue,
            };
            // The second road runs backwards
            let grown_at = grown_at.map(|end| match (idx, end) {
                (0, end) => end,
                (_, RoadEnd::Start) => RoadEnd::End,
                (_, RoadEnd::End) => RoadEnd::Start,
            });
            if let Some(road) = self.road_mut(*id) {
                sections::update_key_path(road, pts, grown_at);
            }
        }
        self.refresh_roads(&cp.road_ids);
    }

    fn delete_road(&mut self, id: RoadID) {
        let road = match self.take_road(id) {
            Some(road) => road,
            None => return,
        };
        info!("Deleted {}", id);
        for j in road.link_junction {
            let links: Vec<LinkRoad> = match self.junctions.get(&j) {
                Some(junction) => junction
                    .link_roads
                    .iter()
                    .filter(|l| l.road == id)
                    .cloned()
                    .collect(),
                None => continue,
            };
            self.remove_links(j, &links);
        }
    }
}

// Junction connectivity
impl RoadNetwork {
    /// Attaches road ends to a junction, creating it when `junction` is `None`. Each side of a
    /// road end belongs to at most one junction.
    pub fn connect_link_road(
        &mut self,
        junction: Option<JunctionID>,
        links: Vec<LinkRoad>,
    ) -> Result<(JunctionID, EditCmd)> {
        if links.is_empty() {
            bail!("Nothing to connect");
        }
        if let Some(j) = junction {
            if !self.junctions.contains_key(&j) {
                bail!("{} doesn't exist", j);
            }
        }
        for link in &links {
            if !self.roads.contains_key(&link.road) {
                bail!("Can't connect {}; {} doesn't exist", link, link.road);
            }
            if let Some(other) = self
                .junctions
                .values()
                .find(|other| other.link_roads.contains(link))
            {
                bail!("{} already belongs to {}", link, other.id);
            }
        }

        self.try_edit(|net| {
            let j = match junction {
                Some(j) => j,
                None => {
                    let j = JunctionID(net.next_junction);
                    net.next_junction += 1;
                    net.insert_junction(Junction::new(j));
                    info!("Created {}", j);
                    j
                }
            };
            for link in links {
                if let Some(junction) = net.junction_mut(j) {
                    junction.link_roads.insert(link);
                }
                if let Some(road) = net.road_mut(link.road) {
                    road.link_junction.insert(j);
                }
            }
            net.update_junction(j);
            Ok(j)
        })
    }

    /// Detaches road ends from a junction. The junction is deleted if fewer than 2 ends remain.
    pub fn disconnect_link_road(
        &mut self,
        junction: JunctionID,
        links: Vec<LinkRoad>,
    ) -> Result<((), EditCmd)> {
        let existing = &self
            .junctions
            .get(&junction)
            .ok_or_else(|| anyhow!("{} doesn't exist", junction))?
            .link_roads;
        if let Some(link) = links.iter().find(|l| !existing.contains(l)) {
            bail!("{} isn't part of {}", link, junction);
        }
        self.try_edit(|net| {
            net.remove_links(junction, &links);
            Ok(())
        })
    }

    pub fn remove_junction(&mut self, junction: JunctionID) -> Result<((), EditCmd)> {
        if !self.junctions.contains_key(&junction) {
            bail!("{} doesn't exist", junction);
        }
        self.try_edit(|net| {
            net.delete_junction(junction);
            Ok(())
        })
    }

    fn remove_links(&mut self, j: JunctionID, links: &[LinkRoad]) {
        let junction = match self.junction_mut(j) {
            Some(junction) => junction,
            None => return,
        };
        for link in links {
            junction.link_roads.remove(link);
        }
        junction.lane_links.retain(|l| {
            !links.contains(&l.from.link_road()) && !links.contains(&l.to.link_road())
        });
        let still_linked = junction.roads();
        let remaining = junction.link_roads.len();

        for link in links {
            if !still_linked.contains(&link.road) {
                if let Some(road) = self.road_mut(link.road) {
                    road.link_junction.remove(&j);
                }
            }
        }
        if remaining < 2 {
            self.delete_junction(j);
        } else {
            self.update_junction(j);
        }
    }

    fn delete_junction(&mut self, j: JunctionID) {
        if let Some(junction) = self.take_junction(j) {
            for road in junction.roads() {
                if let Some(road) = self.road_mut(road) {
                    road.link_junction.remove(&j);
                }
            }
            info!("Deleted {}", j);
        }
        self.pool.invalidate(j);
        self.pending.remove(&j);
    }

    /// Connects one lane end to another through a junction by hand. The link survives later
    /// recomputes.
    pub fn add_lane_link(
        &mut self,
        junction: JunctionID,
        from: LaneEnd,
        to: LaneEnd,
    ) -> Result<(LaneLinkID, EditCmd)> {
        let j = self
            .junctions
            .get(&junction)
            .ok_or_else(|| anyhow!("{} doesn't exist", junction))?;
        if !from.is_incoming() || to.is_incoming() {
            bail!(
                "A lane link must go from an incoming lane to an outgoing one, not {} to {}",
                from,
                to
            );
        }
        if j.lane_links.iter().any(|l| l.flag() == (from, to)) {
            bail!("{} already links {} to {}", junction, from, to);
        }
        let infos = self.lane_infos(j);
        let from_info = find_info(&infos, from)?;
        let to_info = find_info(&infos, to)?;

        self.try_edit(|net| {
            let id = LaneLinkID(net.next_lane_link);
            net.next_lane_link += 1;
            let road_id = net.control_points.allocate_road_id();
            // Resolving against a placeholder with the new identity builds the geometry
            let placeholder = LaneLink {
                id,
                from,
                to,
                road_id,
                length: Distance::ZERO,
                sample_points: Vec::new(),
                control_points: Vec::new(),
                enabled: true,
            };
            let resolved = resolve_lane_links(&LaneLinkRequest {
                lane_infos: vec![from_info, to_info],
                previous: vec![placeholder],
                sample_segments: net.config.lane_link_segments,
            })?;
            let link = resolved
                .into_iter()
                .find(|l| l.identity == Some((id, road_id)))
                .ok_or_else(|| anyhow!("No geometry for {} to {}", from, to))?
                .into_lane_link(id, road_id);
            if let Some(j) = net.junction_mut(junction) {
                j.lane_links.push(link);
            }
            Ok(id)
        })
    }

    pub fn remove_lane_link(
        &mut self,
        junction: JunctionID,
        id: LaneLinkID,
    ) -> Result<((), EditCmd)> {
        let j = self
            .junctions
            .get(&junction)
            .ok_or_else(|| anyhow!("{} doesn't exist", junction))?;
        if j.get_lane_link(id).is_none() {
            bail!("{} has no {}", junction, id);
        }
        self.try_edit(|net| {
            if let Some(j) = net.junction_mut(junction) {
                j.lane_links.retain(|l| l.id != id);
            }
            Ok(())
        })
    }
}

// Section and lane edits
impl RoadNetwork {
    fn edit_road<T, F: FnOnce(&mut Road, &EngineConfig) -> Result<T>>(
        &mut self,
        id: RoadID,
        f: F,
    ) -> Result<(T, EditCmd)> {
        if !self.roads.contains_key(&id) {
            bail!("{} doesn't exist", id);
        }
        self.try_edit(|net| {
            net.touch_road(id);
            let road = net
                .roads
                .get_mut(&id)
                .ok_or_else(|| anyhow!("{} doesn't exist", id))?;
            let result = f(road, &net.config)?;
            net.refresh_roads(&[id]);
            Ok(result)
        })
    }

    pub fn split_section(
        &mut self,
        road: RoadID,
        section: SectionID,
        lane: LaneID,
        left: usize,
        right: usize,
        segments: usize,
    ) -> Result<(Vec<SectionID>, EditCmd)> {
        self.edit_road(road, |r, _| {
            sections::split_section(r, section, lane, left, right, segments)
        })
    }

    pub fn divide_section(&mut self, road: RoadID, percent: f64) -> Result<(SectionID, EditCmd)> {
        self.edit_road(road, |r, _| sections::divide_section(r, percent))
    }

    /// Adds an outermost lane. The width defaults to the configured one.
    pub fn add_lane(
        &mut self,
        road: RoadID,
        section: SectionID,
        direction: Direction,
        width: Option<Distance>,
    ) -> Result<(LaneID, EditCmd)> {
        self.edit_road(road, |r, cfg| {
            let width = cfg.clamp_lane_width(width.unwrap_or(cfg.lane_width));
            sections::add_lane(r, section, direction, width)
        })
    }

    pub fn remove_lane(
        &mut self,
        road: RoadID,
        section: SectionID,
        lane: LaneID,
    ) -> Result<((), EditCmd)> {
        self.edit_road(road, |r, _| sections::remove_lane(r, section, lane))
    }

    /// The width is clamped to the configured range.
    pub fn set_lane_width(
        &mut self,
        road: RoadID,
        section: SectionID,
        lane: LaneID,
        width: Distance,
    ) -> Result<((), EditCmd)> {
        self.edit_road(road, |r, cfg| {
            sections::set_lane_width(r, section, lane, cfg.clamp_lane_width(width))
        })
    }

    pub fn set_road_elevation(
        &mut self,
        road: RoadID,
        profile: Option<Vec<(Distance, f64)>>,
    ) -> Result<((), EditCmd)> {
        self.edit_road(road, |r, _| sections::set_elevation(r, profile))
    }
}

// Junction recomputes
impl RoadNetwork {
    /// Recomputes one junction, blocking until it's done.
    pub fn update_junction(&mut self, j: JunctionID) {
        self.update_junctions(vec![j]);
    }

    /// Recomputes junctions in parallel, blocking until all of them are done.
    pub fn update_junctions(&mut self, junctions: Vec<JunctionID>) {
        let mut requested = Vec::new();
        for j in junctions {
            if let Some(version) = self.request_junction_update(j) {
                requested.push((j, version));
            }
        }
        for (j, version) in requested {
            if let Some(update) = self.pool.wait_for(j, version) {
                self.commit(update);
            }
        }
    }

    /// Starts recomputing a junction in the background, returning the version to expect. A
    /// junction with fewer than 2 link roads has nothing to compute; it's cleared immediately and
    /// `None` is returned.
    pub fn request_junction_update(&mut self, j: JunctionID) -> Option<u64> {
        let junction = self.junctions.get(&j)?;
        let ref_roads: Vec<RefRoad> = junction
            .link_roads
            .iter()
            .filter_map(|link| ref_road(self.roads.get(&link.road)?, *link))
            .collect();
        let num_links = junction.link_roads.len();

        if num_links < 2 {
            self.pool.invalidate(j);
            self.pending.remove(&j);
            if let Some(junction) = self.junction_mut(j) {
                junction.ref_roads = ref_roads;
                junction.geo_attr = None;
                junction.lane_links.clear();
            }
            return None;
        }

        let lane_infos = self.lane_infos(junction);
        let previous = junction
            .lane_links
            .iter()
            .map(|l| self.remap_lane_link(l))
            .collect();
        let boundary = JunctionBoundaryRequest {
            ref_roads: ref_roads.clone(),
            enable_close_point: num_links == 2,
            is_multiple_road: num_links > 2,
            edge_segments: self.config.junction_edge_segments,
        };
        let links = LaneLinkRequest {
            lane_infos,
            previous,
            sample_segments: self.config.lane_link_segments,
        };
        let version = self.pool.dispatch(j, boundary, links);
        self.pending.insert(j, (version, ref_roads));
        Some(version)
    }

    /// Commits every background recompute that's finished, without blocking. Returns the
    /// junctions that changed.
    pub fn commit_finished(&mut self) -> Vec<JunctionID> {
        let mut changed = Vec::new();
        for update in self.pool.try_finished() {
            let j = update.junction;
            if self.commit(update) {
                changed.push(j);
            }
        }
        changed
    }

    fn commit(&mut self, update: JunctionUpdate) -> bool {
        let j = update.junction;
        let ref_roads = match self.pending.remove(&j) {
            Some((version, ref_roads)) if version == update.version => ref_roads,
            Some(other) => {
                debug!("Dropping version {} of {}; waiting for {}", update.version, j, other.0);
                self.pending.insert(j, other);
                return false;
            }
            None => {
                debug!("Dropping version {} of {}; nothing is pending", update.version, j);
                return false;
            }
        };
        if !self.junctions.contains_key(&j) {
            return false;
        }

        let lane_links = match update.lane_links {
            Ok(resolved) => Some(
                resolved
                    .into_iter()
                    .map(|l| self.assign_identity(l))
                    .collect::<Vec<_>>(),
            ),
            Err(err) => {
                warn!("Keeping old lane links of {}: {}", j, err);
                None
            }
        };
        let junction = match self.junction_mut(j) {
            Some(junction) => junction,
            None => return false,
        };
        junction.ref_roads = ref_roads;
        match update.geo_attr {
            Ok(geo) => junction.geo_attr = geo,
            Err(err) => warn!("Keeping old geometry of {}: {}", j, err),
        }
        if let Some(links) = lane_links {
            junction.lane_links = links;
        }
        true
    }

    fn assign_identity(&mut self, link: ResolvedLaneLink) -> LaneLink {
        let (id, road_id) = match link.identity {
            Some(identity) => identity,
            None => {
                let id = LaneLinkID(self.next_lane_link);
                self.next_lane_link += 1;
                (id, self.control_points.allocate_road_id())
            }
        };
        link.into_lane_link(id, road_id)
    }

    fn refresh_roads(&mut self, roads: &[RoadID]) {
        let junctions: BTreeSet<JunctionID> = roads
            .iter()
            .filter_map(|r| self.roads.get(r))
            .flat_map(|r| r.link_junction.iter().cloned())
            .collect();
        self.update_junctions(junctions.into_iter().collect());
    }

    fn lane_infos(&self, junction: &Junction) -> Vec<LaneEndInfo> {
        junction
            .link_roads
            .iter()
            .filter_map(|link| Some(lane_end_infos(self.roads.get(&link.road)?, *link)))
            .flatten()
            .collect()
    }

    /// Section IDs shift when the end section of a road is split, but a link still means the
    /// same lane at the same road end.
    fn remap_lane_link(&self, link: &LaneLink) -> LaneLink {
        let mut link = link.clone();
        link.from = self.remap_lane_end(link.from);
        link.to = self.remap_lane_end(link.to);
        link
    }

    fn remap_lane_end(&self, end: LaneEnd) -> LaneEnd {
        let section = self
            .roads
            .get(&end.road)
            .and_then(|r| r.end_section(end.end))
            .map(|s| s.id);
        match section {
            Some(section) => LaneEnd { section, ..end },
            None => end,
        }
    }
}

// Wholesale state replacement, used by undo and redo. Nothing is recomputed.
impl RoadNetwork {
    pub fn apply_control_point_state(
        &mut self,
        state: BTreeMap<ControlPointID, Option<ControlPoint>>,
    ) {
        for (id, cp) in state {
            self.control_points.restore(id, cp);
        }
    }

    pub fn apply_road_state(&mut self, state: BTreeMap<RoadID, Option<Road>>) {
        for (id, road) in state {
            match road {
                Some(road) => {
                    self.roads.insert(id, road);
                }
                None => {
                    self.roads.remove(&id);
                }
            }
        }
    }

    pub fn apply_junction_state(&mut self, state: BTreeMap<JunctionID, Option<Junction>>) {
        for (id, junction) in state {
            // Anything in flight was computed from the state being replaced
            self.pool.invalidate(id);
            self.pending.remove(&id);
            match junction {
                Some(junction) => {
                    self.junctions.insert(id, junction);
                }
                None => {
                    self.junctions.remove(&id);
                }
            }
        }
    }
}

fn find_info(infos: &[LaneEndInfo], end: LaneEnd) -> Result<LaneEndInfo> {
    infos
        .iter()
        .find(|info| info.lane_end == end)
        .cloned()
        .ok_or_else(|| anyhow!("{} doesn't touch the junction", end))
}
