//! Decides which lanes are connected through a junction, and builds the connector curves.
//!
//! Every pairing of an incoming lane with an outgoing lane is a candidate. Candidates matching an
//! existing link keep its identity, so history diffed by link ID doesn't see every link deleted
//! and recreated after an unrelated edit. Other candidates are only created by a simple default
//! rule, when they touch a road that just joined the junction, so links a user removed aren't
//! resurrected on every recompute. Everything else is discarded.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use geom::{bezier_with_endpoint_tangents, round_to, with_virtual_points, Curve, Distance, Pt3D};

use crate::pool::KernelError;
use crate::{HeadingPoint, LaneEnd, LaneEndInfo, LaneLink, LaneLinkID, LinkRoad, RoadID};

/// Where along a connector its control points sit
const CONTROL_POINT_PERCENTS: [f64; 5] = [0.0, 0.15, 0.5, 0.85, 1.0];

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LaneLinkRequest {
    /// Every linkable lane end touching the junction
    pub lane_infos: Vec<LaneEndInfo>,
    /// The junction's links before this recompute
    pub previous: Vec<LaneLink>,
    pub sample_segments: usize,
}

/// A connector produced off the main thread. Brand new connectors have no identity yet; that's
/// handed out when the result is committed.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ResolvedLaneLink {
    pub identity: Option<(LaneLinkID, RoadID)>,
    pub from: LaneEnd,
    pub to: LaneEnd,
    pub length: Distance,
    pub sample_points: Vec<Pt3D>,
    pub control_points: Vec<HeadingPoint>,
}

impl ResolvedLaneLink {
    pub fn into_lane_link(self, id: LaneLinkID, road_id: RoadID) -> LaneLink {
        LaneLink {
            id,
            from: self.from,
            to: self.to,
            road_id,
            length: self.length,
            sample_points: self.sample_points,
            control_points: self.control_points,
            enabled: true,
        }
    }
}

pub fn resolve_lane_links(req: &LaneLinkRequest) -> Result<Vec<ResolvedLaneLink>, KernelError> {
    let (from_infos, to_infos): (Vec<&LaneEndInfo>, Vec<&LaneEndInfo>) = req
        .lane_infos
        .iter()
        .partition(|info| info.lane_end.is_incoming());

    let new_link_roads: BTreeSet<LinkRoad> = req
        .lane_infos
        .iter()
        .map(|info| info.lane_end.link_road())
        .collect();
    let mut origin_link_roads: BTreeSet<LinkRoad> = BTreeSet::new();
    let mut previous: BTreeMap<(LaneEnd, LaneEnd), &LaneLink> = BTreeMap::new();
    for link in &req.previous {
        origin_link_roads.insert(link.from.link_road());
        origin_link_roads.insert(link.to.link_road());
        previous.insert(link.flag(), link);
    }
    let added: BTreeSet<LinkRoad> = new_link_roads
        .difference(&origin_link_roads)
        .cloned()
        .collect();

    let mut results = Vec::new();
    for from in &from_infos {
        for to in &to_infos {
            let identity = match previous.get(&(from.lane_end, to.lane_end)) {
                Some(old) => Some((old.id, old.road_id)),
                None if default_enabled(&added, from.lane_end, to.lane_end) => None,
                None => continue,
            };
            let (length, sample_points, control_points) =
                connector(from, to, req.sample_segments)?;
            results.push(ResolvedLaneLink {
                identity,
                from: from.lane_end,
                to: to.lane_end,
                length,
                sample_points,
                control_points,
            });
        }
    }
    Ok(results)
}

/// A new connection is made if it touches a road that just joined the junction, keeps the
/// lane index, and isn't a U-turn back onto the same road end.
fn default_enabled(added: &BTreeSet<LinkRoad>, from: LaneEnd, to: LaneEnd) -> bool {
    if !added.contains(&from.link_road()) && !added.contains(&to.link_road()) {
        return false;
    }
    if from.lane.index() != to.lane.index() {
        return false;
    }
    !is_u_turn(from, to)
}

fn is_u_turn(from: LaneEnd, to: LaneEnd) -> bool {
    from.road == to.road
        && from.section == to.section
        && from.end == to.end
        && from.direction() != to.direction()
}

fn connector(
    from: &LaneEndInfo,
    to: &LaneEndInfo,
    segments: usize,
) -> Result<(Distance, Vec<Pt3D>, Vec<HeadingPoint>), KernelError> {
    let curve = bezier_with_endpoint_tangents(from.point, from.tangent, to.point, to.tangent);
    let length = curve.length().inner_meters();
    if !length.is_finite() {
        return Err(KernelError::Degenerate(format!(
            "Connector from {} to {} has no finite length",
            from.lane_end, to.lane_end
        )));
    }
    let control_points = CONTROL_POINT_PERCENTS
        .iter()
        .map(|pct| HeadingPoint {
            pos: curve.point_at(*pct),
            hdg: curve.tangent_at(*pct).heading(),
        })
        .collect::<Vec<_>>();
    Ok((
        Distance::meters(round_to(length, 3)),
        curve.spaced_points(segments),
        with_virtual_heading_points(control_points),
    ))
}

/// Mirrors the neighbor of each end past it, copying the end's heading.
fn with_virtual_heading_points(pts: Vec<HeadingPoint>) -> Vec<HeadingPoint> {
    if pts.len() < 2 {
        return pts;
    }
    let positions: Vec<Pt3D> = pts.iter().map(|pt| pt.pos).collect();
    let mut headings = vec![pts[0].hdg];
    headings.extend(pts.iter().map(|pt| pt.hdg));
    headings.push(pts[pts.len() - 1].hdg);
    with_virtual_points(&positions)
        .into_iter()
        .zip(headings)
        .map(|(pos, hdg)| HeadingPoint { pos, hdg })
        .collect()
}
