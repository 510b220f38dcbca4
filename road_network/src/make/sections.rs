//! Sections and lanes are pure projections of a road's reference line and lane widths. Every
//! structural edit ends with `recompute_road`, which resamples every boundary.

use std::collections::BTreeSet;

use anyhow::Result;

use geom::{
    bezier_with_endpoint_tangents, offset_curve_range, segment_count_for_length, CatmullRom,
    Curve, Distance, Pt3D, Tessellation,
};

use crate::{
    BoundaryID, ControlPointID, Direction, EngineConfig, GeoAttr, Lane, LaneBoundary, LaneID,
    LaneWidth, Road, RoadEnd, RoadID, Section, SectionID,
};

/// Transition boundaries are found by walking a tween curve sampled this many times more finely
/// than the road.
const TWEEN_DENSITY: usize = 10;
/// Sections shorter than this fraction of the road have no geometry.
const MIN_SPAN: f64 = 1e-9;

/// A fresh road with a single section and the default lanes.
pub fn new_road(id: RoadID, group: ControlPointID, pts: Vec<Pt3D>, cfg: &EngineConfig) -> Road {
    let mut lanes = Vec::new();
    for idx in 1..=cfg.default_forward_lanes {
        lanes.push(Lane::new(
            LaneID::new(Direction::Forward, idx),
            LaneWidth::Constant(cfg.lane_width),
        ));
    }
    for idx in 1..=cfg.default_reverse_lanes {
        lanes.push(Lane::new(
            LaneID::new(Direction::Reverse, idx),
            LaneWidth::Constant(cfg.lane_width),
        ));
    }

    let mut road = Road {
        id,
        group,
        key_path: CatmullRom::centripetal(pts),
        length: Distance::ZERO,
        sections: vec![Section::new(SectionID(0), 0.0, 1.0, lanes)],
        elevation_path: None,
        link_junction: BTreeSet::new(),
        circle: None,
    };
    recompute_road(&mut road);
    road
}

/// Follows new control points. When the road grew at one end, the section there absorbs the
/// change and the others keep their absolute lengths; otherwise sections keep their fractions.
pub fn update_key_path(road: &mut Road, pts: Vec<Pt3D>, grown_at: Option<RoadEnd>) {
    let old_length = road.length;
    road.key_path = CatmullRom::centripetal(pts);
    road.length = road.key_path.length();
    if let Some(end) = grown_at {
        refit_sections(road, old_length, end);
    }
    recompute_road(road);
}

fn refit_sections(road: &mut Road, old_length: Distance, end: RoadEnd) {
    let new_length = road.length;
    if road.sections.len() < 2 || old_length == Distance::ZERO || new_length == Distance::ZERO {
        return;
    }
    let mut lengths: Vec<f64> = road
        .sections
        .iter()
        .map(|s| (s.p_end - s.p_start) * old_length.inner_meters())
        .collect();
    let idx = match end {
        RoadEnd::Start => 0,
        RoadEnd::End => lengths.len() - 1,
    };
    lengths[idx] += new_length.inner_meters() - old_length.inner_meters();
    if lengths[idx] <= 0.0 {
        // The end section would vanish; keep the fractions instead
        return;
    }

    let total = new_length.inner_meters();
    let mut cumulative = 0.0;
    for (section, len) in road.sections.iter_mut().zip(lengths) {
        section.p_start = cumulative / total;
        cumulative += len;
        section.p_end = cumulative / total;
    }
    if let Some(last) = road.sections.last_mut() {
        last.p_end = 1.0;
    }
}

/// Resamples the reference line and every lane boundary of every section.
pub fn recompute_road(road: &mut Road) {
    road.length = road.key_path.length();
    let mut sections = std::mem::take(&mut road.sections);
    for (idx, section) in sections.iter_mut().enumerate() {
        section.id = SectionID(idx);
        recompute_section(road, section);
    }
    if let Some(first) = sections.first_mut() {
        first.p_start = 0.0;
    }
    if let Some(last) = sections.last_mut() {
        last.p_end = 1.0;
    }
    road.sections = sections;
}

fn recompute_section(road: &Road, section: &mut Section) {
    section.sort_lanes();
    let span = section.p_end - section.p_start;
    section.length = road.length * span.max(0.0);
    if road.length == Distance::ZERO || span <= MIN_SPAN {
        section.boundaries = vec![LaneBoundary {
            id: BoundaryID(0),
            side: None,
            sample_points: Vec::new(),
        }];
        for lane in &mut section.lanes {
            lane.sample_points.clear();
            lane.geo_attr = None;
            lane.inner_boundary = BoundaryID(0);
            lane.outer_boundary = BoundaryID(0);
        }
        return;
    }

    let n = segment_count_for_length(section.length.inner_meters());
    let params: Vec<f64> = (0..=n)
        .map(|i| section.p_start + span * i as f64 / n as f64)
        .collect();
    let reference: Vec<Pt3D> = params.iter().map(|p| road.point_at(*p)).collect();
    let tangents: Vec<Pt3D> = params.iter().map(|p| road.tangent_at(*p)).collect();

    let mut boundaries = vec![LaneBoundary {
        id: BoundaryID(0),
        side: None,
        sample_points: reference.clone(),
    }];

    for direction in [Direction::Forward, Direction::Reverse] {
        let side = direction.side();
        let normals: Vec<Pt3D> = tangents.iter().map(|t| side.normal(*t)).collect();
        let mut inner = reference.clone();
        let mut inner_id = BoundaryID(0);
        let mut offsets = vec![0.0; n + 1];
        // While every lane so far has a constant width, the boundary is a plain offset curve
        let mut uniform = true;

        for lane in section
            .lanes
            .iter_mut()
            .filter(|l| l.direction() == direction)
        {
            let widths = match lane.width {
                LaneWidth::Constant(w) => vec![w.inner_meters(); n + 1],
                LaneWidth::Transition { from, to } => {
                    uniform = false;
                    transition_widths(&inner, &normals, &tangents, from, to)
                }
            };
            for (offset, width) in offsets.iter_mut().zip(widths) {
                *offset += width;
            }

            let outer: Vec<Pt3D> = if uniform {
                offset_curve_range(
                    &road.key_path,
                    offsets[0],
                    side,
                    section.p_start,
                    section.p_end,
                    n,
                )
                .into_iter()
                .zip(reference.iter())
                .map(|(pt, on_reference)| pt.with_z(on_reference.z()))
                .collect()
            } else {
                reference
                    .iter()
                    .zip(normals.iter())
                    .zip(offsets.iter())
                    .map(|((pt, normal), offset)| *pt + *normal * *offset)
                    .collect()
            };

            let id = BoundaryID(boundaries.len());
            lane.sample_points = inner
                .iter()
                .zip(outer.iter())
                .map(|(a, b)| a.midpoint(*b))
                .collect();
            lane.geo_attr = Tessellation::strip(&inner, &outer)
                .ok()
                .map(|tess| {
                    let (vertices, indices) = tess.consume();
                    GeoAttr { vertices, indices }
                });
            lane.inner_boundary = inner_id;
            lane.outer_boundary = id;
            boundaries.push(LaneBoundary {
                id,
                side: Some(side),
                sample_points: outer.clone(),
            });

            inner = outer;
            inner_id = id;
        }
    }

    section.boundaries = boundaries;
}

/// The lateral width of a transitioning lane at each sample. A Bezier tween runs from the lane's
/// width at the start to its width at the end, leaving and arriving parallel to the road; each
/// sample takes the tween point lying on its normal.
fn transition_widths(
    inner: &[Pt3D],
    normals: &[Pt3D],
    tangents: &[Pt3D],
    from: Distance,
    to: Distance,
) -> Vec<f64> {
    let n = inner.len() - 1;
    let start = inner[0] + normals[0] * from.inner_meters();
    let end = inner[n] + normals[n] * to.inner_meters();
    let tween = bezier_with_endpoint_tangents(start, tangents[0], end, -tangents[n]);
    let dense = tween.spaced_points(n * TWEEN_DENSITY);

    let mut widths = Vec::with_capacity(n + 1);
    widths.push(from.inner_meters());
    let mut cursor = 0;
    for i in 1..n {
        let along = |pt: Pt3D| (pt - inner[i]).dot(tangents[i]).abs();
        while cursor + 1 < dense.len() && along(dense[cursor + 1]) <= along(dense[cursor]) {
            cursor += 1;
        }
        widths.push((dense[cursor] - inner[i]).dot(normals[i]).max(0.0));
    }
    widths.push(to.inner_meters());
    widths
}

/// Cuts one lane of a section at two sample indices on a grid of `segments` segments. If
/// `left < right`, the lane appears: it's absent before the first cut and widens from nothing to
/// full width between the cuts. Otherwise the lane disappears, narrowing between the cuts. Cuts
/// at the very ends of the section don't produce empty pieces, so the result has up to three
/// sections, which are returned. Sections before an appearing lane and after a disappearing one
/// lose the lane too.
pub fn split_section(
    road: &mut Road,
    section: SectionID,
    lane: LaneID,
    left: usize,
    right: usize,
    segments: usize,
) -> Result<Vec<SectionID>> {
    if segments == 0 || left > segments || right > segments {
        bail!(
            "Cut indices {} and {} don't fit a grid of {} segments",
            left,
            right,
            segments
        );
    }
    if left == right {
        bail!("Both cuts are at index {}", left);
    }
    let original = road
        .get_section(section)
        .ok_or_else(|| anyhow!("{} has no {}", road.id, section))?
        .clone();
    let target = original
        .get_lane(lane)
        .ok_or_else(|| anyhow!("{} of {} has no {}", section, road.id, lane))?
        .clone();

    let extend = left < right;
    let (a, b) = (left.min(right), left.max(right));
    let span = original.p_end - original.p_start;
    let pa = original.p_start + span * a as f64 / segments as f64;
    let pb = original.p_start + span * b as f64 / segments as f64;

    let full = target.normal_width();
    let mut without = original.clone();
    without.remove_lane(lane);
    let mut tween = original.clone();
    for l in &mut tween.lanes {
        if l.id == lane {
            l.width = if extend {
                LaneWidth::Transition {
                    from: Distance::ZERO,
                    to: full,
                }
            } else {
                LaneWidth::Transition {
                    from: full,
                    to: Distance::ZERO,
                }
            };
        }
    }
    let (front, back) = if extend {
        (without.lanes, original.lanes.clone())
    } else {
        (original.lanes.clone(), without.lanes)
    };

    let mut pieces = Vec::new();
    if a > 0 {
        pieces.push(Section::new(section, original.p_start, pa, front));
    }
    pieces.push(Section::new(section, pa, pb, tween.lanes));
    if b < segments {
        pieces.push(Section::new(section, pb, original.p_end, back));
    }
    let first = section.0;
    let count = pieces.len();
    let ids = (first..first + count).map(SectionID).collect();
    road.sections.splice(first..first + 1, pieces);
    // The lane can't be present on the other side of the taper either
    let others = if extend {
        0..first
    } else {
        first + count..road.sections.len()
    };
    for s in &mut road.sections[others] {
        s.remove_lane(lane);
    }
    recompute_road(road);
    Ok(ids)
}

/// Splits the section containing `percent` into two with identical lanes. Returns the second
/// piece.
pub fn divide_section(road: &mut Road, percent: f64) -> Result<SectionID> {
    let idx = road
        .sections
        .iter()
        .position(|s| s.p_start + MIN_SPAN < percent && percent < s.p_end - MIN_SPAN)
        .ok_or_else(|| anyhow!("{} has no section strictly containing {}", road.id, percent))?;
    let mut second = road.sections[idx].clone();
    second.p_start = percent;
    road.sections[idx].p_end = percent;
    road.sections.insert(idx + 1, second);
    recompute_road(road);
    Ok(SectionID(idx + 1))
}

/// Adds a lane on the outside of one direction. Returns its ID.
pub fn add_lane(
    road: &mut Road,
    section: SectionID,
    direction: Direction,
    width: Distance,
) -> Result<LaneID> {
    let road_id = road.id;
    let s = road
        .sections
        .get_mut(section.0)
        .ok_or_else(|| anyhow!("{} has no {}", road_id, section))?;
    let id = LaneID::new(direction, s.lanes_in(direction).len() + 1);
    s.lanes.push(Lane::new(id, LaneWidth::Constant(width)));
    recompute_road(road);
    Ok(id)
}

pub fn remove_lane(road: &mut Road, section: SectionID, lane: LaneID) -> Result<()> {
    let road_id = road.id;
    road.sections
        .get_mut(section.0)
        .ok_or_else(|| anyhow!("{} has no {}", road_id, section))?
        .remove_lane(lane)
        .ok_or_else(|| anyhow!("{} of {} has no {}", section, road_id, lane))?;
    recompute_road(road);
    Ok(())
}

/// Changes the full width of a lane. A transitioning lane keeps transitioning to or from zero.
pub fn set_lane_width(
    road: &mut Road,
    section: SectionID,
    lane: LaneID,
    width: Distance,
) -> Result<()> {
    let road_id = road.id;
    let l = road
        .sections
        .get_mut(section.0)
        .and_then(|s| s.lanes.iter_mut().find(|l| l.id == lane))
        .ok_or_else(|| anyhow!("{} of {} has no {}", section, road_id, lane))?;
    l.width = match l.width {
        LaneWidth::Constant(_) => LaneWidth::Constant(width),
        LaneWidth::Transition { from, .. } if from == Distance::ZERO => LaneWidth::Transition {
            from: Distance::ZERO,
            to: width,
        },
        LaneWidth::Transition { .. } => LaneWidth::Transition {
            from: width,
            to: Distance::ZERO,
        },
    };
    recompute_road(road);
    Ok(())
}

/// Sets or clears the elevation profile, given as (distance along the road, height) pairs.
pub fn set_elevation(road: &mut Road, profile: Option<Vec<(Distance, f64)>>) -> Result<()> {
    road.elevation_path = match profile {
        Some(pts) => {
            if pts.len() < 2 {
                bail!("An elevation profile needs at least 2 points, not {}", pts.len());
            }
            Some(CatmullRom::centripetal(
                pts.into_iter()
                    .map(|(dist, z)| Pt3D::new(dist.inner_meters(), 0.0, z))
                    .collect(),
            ))
        }
        None => None,
    };
    recompute_road(road);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn straight_road(length: f64) -> Road {
        new_road(
            RoadID(0),
            ControlPointID(0),
            vec![Pt3D::ORIGIN, Pt3D::new(length, 0.0, 0.0)],
            &EngineConfig::default(),
        )
    }

    fn percents(road: &Road) -> Vec<(f64, f64)> {
        road.sections
            .iter()
            .map(|s| {
                (
                    (s.p_start * 1e6).round() / 1e6,
                    (s.p_end * 1e6).round() / 1e6,
                )
            })
            .collect()
    }

    #[test]
    fn boundaries_follow_cumulative_widths() {
        let mut road = straight_road(40.0);
        add_lane(&mut road, SectionID(0), Direction::Forward, Distance::meters(3.0)).unwrap();
        let section = &road.sections[0];
        assert_eq!(section.boundaries.len(), 4);
        assert_eq!(section.boundaries[0].sample_points.len(), 21);

        let lane1 = section.get_lane(LaneID(-1)).unwrap();
        let lane2 = section.get_lane(LaneID(-2)).unwrap();
        assert_eq!(lane2.inner_boundary, lane1.outer_boundary);
        let outer = &section.boundaries[lane2.outer_boundary.0].sample_points;
        for pt in outer {
            assert!((pt.y() + 6.5).abs() < 1e-6);
        }
        let reverse = section.get_lane(LaneID(1)).unwrap();
        for pt in &reverse.sample_points {
            assert!((pt.y() - 1.75).abs() < 1e-6);
        }
        assert_eq!(lane1.geo_attr.as_ref().unwrap().num_triangles(), 40);
    }

    #[test]
    fn three_way_split() {
        let mut road = straight_road(10.0);
        let ids = split_section(&mut road, SectionID(0), LaneID(-1), 2, 5, 10).unwrap();
        assert_eq!(ids, vec![SectionID(0), SectionID(1), SectionID(2)]);
        assert_eq!(percents(&road), vec![(0.0, 0.2), (0.2, 0.5), (0.5, 1.0)]);

        // The lane appears: absent, then widening, then full
        assert!(road.sections[0].get_lane(LaneID(-1)).is_none());
        assert!(road.sections[1].get_lane(LaneID(-1)).unwrap().is_transition());
        assert!(!road.sections[2].get_lane(LaneID(-1)).unwrap().is_transition());

        let tween = &road.sections[1];
        let lane = tween.get_lane(LaneID(-1)).unwrap();
        let outer = &tween.boundaries[lane.outer_boundary.0].sample_points;
        let widths: Vec<f64> = outer.iter().map(|pt| -pt.y()).collect();
        assert!(widths[0].abs() < 1e-6);
        assert!((widths[widths.len() - 1] - 3.5).abs() < 1e-6);
        for pair in widths.windows(2) {
            assert!(pair[1] >= pair[0] - 1e-6);
        }
    }

    #[test]
    fn shrinking_split_at_the_end() {
        let mut road = straight_road(10.0);
        let ids = split_section(&mut road, SectionID(0), LaneID(1), 10, 6, 10).unwrap();
        assert_eq!(ids.len(), 2);
        assert_eq!(percents(&road), vec![(0.0, 0.6), (0.6, 1.0)]);
        let last = road.sections[1].get_lane(LaneID(1)).unwrap();
        assert_eq!(
            last.width,
            LaneWidth::Transition {
                from: Distance::meters(3.5),
                to: Distance::ZERO
            }
        );

        assert!(split_section(&mut road, SectionID(0), LaneID(1), 3, 3, 10).is_err());
        assert!(split_section(&mut road, SectionID(7), LaneID(1), 1, 3, 10).is_err());
        assert!(split_section(&mut road, SectionID(0), LaneID(5), 1, 3, 10).is_err());
    }

    #[test]
    fn growing_at_the_tail_keeps_other_section_lengths() {
        let mut road = straight_road(10.0);
        divide_section(&mut road, 0.5).unwrap();
        update_key_path(
            &mut road,
            vec![Pt3D::ORIGIN, Pt3D::new(20.0, 0.0, 0.0)],
            Some(RoadEnd::End),
        );
        assert_eq!(percents(&road), vec![(0.0, 0.25), (0.25, 1.0)]);
        assert!((road.sections[0].length.inner_meters() - 5.0).abs() < 1e-3);

        // Moving points without growing keeps the fractions
        update_key_path(&mut road, vec![Pt3D::ORIGIN, Pt3D::new(40.0, 0.0, 0.0)], None);
        assert_eq!(percents(&road), vec![(0.0, 0.25), (0.25, 1.0)]);
    }

    #[test]
    fn degenerate_road_has_no_geometry() {
        let road = new_road(
            RoadID(0),
            ControlPointID(0),
            vec![Pt3D::ORIGIN],
            &EngineConfig::default(),
        );
        assert_eq!(road.length, Distance::ZERO);
        assert!(road.sections[0].boundaries[0].sample_points.is_empty());
        assert!(road.sections[0].lanes.iter().all(|l| l.geo_attr.is_none()));
    }

    #[test]
    fn elevation_overrides_heights() {
        let mut road = straight_road(10.0);
        set_elevation(
            &mut road,
            Some(vec![(Distance::ZERO, 2.0), (Distance::meters(10.0), 2.0)]),
        )
        .unwrap();
        for boundary in &road.sections[0].boundaries {
            for pt in &boundary.sample_points {
                assert!((pt.z() - 2.0).abs() < 1e-9);
            }
        }
        assert!(set_elevation(&mut road, Some(vec![(Distance::ZERO, 1.0)])).is_err());
    }

    #[test]
    fn lane_width_edits() {
        let mut road = straight_road(10.0);
        set_lane_width(&mut road, SectionID(0), LaneID(-1), Distance::meters(5.0)).unwrap();
        let outer = &road.sections[0].boundaries[1].sample_points;
        assert!((outer[0].y() + 5.0).abs() < 1e-6);
        remove_lane(&mut road, SectionID(0), LaneID(-1)).unwrap();
        assert!(!road.sections[0].has_direction(Direction::Forward));
        assert!(remove_lane(&mut road, SectionID(0), LaneID(-1)).is_err());
    }
}
