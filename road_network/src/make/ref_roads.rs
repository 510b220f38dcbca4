use geom::Distance;

use crate::{Direction, LaneEnd, LaneEndInfo, LinkRoad, RefRoad, Road, RoadEnd};

/// Lanes narrower than this at the junction mouth have been tapered away and get no links.
const MIN_MOUTH_WIDTH: Distance = Distance::const_meters(0.01);

/// Describes how one side of a road end meets a junction. `None` if the road has no geometry.
pub fn ref_road(road: &Road, link: LinkRoad) -> Option<RefRoad> {
    let section = road.end_section(link.end)?;
    let reference = &section.boundaries.first()?.sample_points;
    let idx = end_idx(reference.len(), link.end)?;
    let on_reference = reference[idx];

    let outer = section
        .lanes_in(link.direction)
        .last()
        .and_then(|lane| section.boundaries.get(lane.outer_boundary.0))
        .and_then(|b| b.sample_points.get(idx).cloned())
        .unwrap_or(on_reference);

    // Forward lanes are right of the reference line, reverse lanes left
    let (left_point, right_point) = match link.direction {
        Direction::Forward => (on_reference, outer),
        Direction::Reverse => (outer, on_reference),
    };
    Some(RefRoad {
        link,
        along_vec: road.outward_tangent(link.end),
        left_point,
        right_point,
    })
}

/// Every lane on one side of a road end that can be linked through a junction.
pub fn lane_end_infos(road: &Road, link: LinkRoad) -> Vec<LaneEndInfo> {
    let section = match road.end_section(link.end) {
        Some(s) => s,
        None => return Vec::new(),
    };
    let tangent = road.outward_tangent(link.end);
    let mut infos = Vec::new();
    for lane in section.lanes_in(link.direction) {
        let width = match link.end {
            RoadEnd::Start => lane.width.at_start(),
            RoadEnd::End => lane.width.at_end(),
        };
        if width < MIN_MOUTH_WIDTH {
            continue;
        }
        let idx = match end_idx(lane.sample_points.len(), link.end) {
            Some(idx) => idx,
            None => continue,
        };
        infos.push(LaneEndInfo {
            lane_end: LaneEnd {
                road: road.id,
                section: section.id,
                lane: lane.id,
                end: link.end,
            },
            point: lane.sample_points[idx],
            tangent,
        });
    }
    infos
}

fn end_idx(len: usize, end: RoadEnd) -> Option<usize> {
    if len == 0 {
        return None;
    }
    Some(match end {
        RoadEnd::Start => 0,
        RoadEnd::End => len - 1,
    })
}
