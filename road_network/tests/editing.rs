use geom::{Angle, Distance, Pt3D, EPSILON_DIST};
use road_network::make::sections::recompute_road;
use road_network::{
    CircleOption, ControlPointID, EngineConfig, History, LaneID, NetworkState, RoadEnd, RoadID,
    RoadNetwork, SectionID,
};

fn straight_road(net: &mut RoadNetwork, from: Pt3D, to: Pt3D) -> (ControlPointID, RoadID) {
    let (first, _) = net.add_point(from, None, true).unwrap();
    let group = first.point.parent;
    net.add_point(to, Some(group), true).unwrap();
    (group, first.new_road.unwrap())
}

fn rounded_percents(net: &RoadNetwork, road: RoadID) -> Vec<(f64, f64)> {
    net.get_r(road)
        .sections
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
fn build_and_split_a_road() {
    let mut net = RoadNetwork::new(EngineConfig::default());
    let (first, _) = net.add_point(Pt3D::ORIGIN, None, true).unwrap();
    let group = first.point.parent;
    let road = first.new_road.unwrap();
    assert_eq!(first.percent, 0.0);

    let (second, _) = net
        .add_point(Pt3D::new(10.0, 0.0, 0.0), Some(group), true)
        .unwrap();
    assert_eq!(second.percent, 1.0);
    assert!(second.new_road.is_none());
    assert_eq!(net.get_cp(group).unwrap().points.len(), 2);
    assert!((net.get_r(road).length.inner_meters() - 10.0).abs() < 1e-2);
    assert_eq!(rounded_percents(&net, road), vec![(0.0, 1.0)]);

    let (ids, _) = net
        .split_section(road, SectionID(0), LaneID(-1), 2, 5, 10)
        .unwrap();
    assert_eq!(ids, vec![SectionID(0), SectionID(1), SectionID(2)]);
    assert_eq!(
        rounded_percents(&net, road),
        vec![(0.0, 0.2), (0.2, 0.5), (0.5, 1.0)]
    );

    // The lane appears partway along, widening across the middle section
    let r = net.get_r(road);
    assert!(r.sections[0].get_lane(LaneID(-1)).is_none());
    assert!(r.sections[1].get_lane(LaneID(-1)).unwrap().is_transition());
    assert!(!r.sections[2].get_lane(LaneID(-1)).unwrap().is_transition());
}

#[test]
fn splitting_a_divided_road_tapers_across_sections() {
    let mut net = RoadNetwork::new(EngineConfig::default());
    let (_, road) = straight_road(&mut net, Pt3D::ORIGIN, Pt3D::new(20.0, 0.0, 0.0));
    net.divide_section(road, 0.5).unwrap();
    assert_eq!(rounded_percents(&net, road), vec![(0.0, 0.5), (0.5, 1.0)]);

    net.split_section(road, SectionID(1), LaneID(-1), 2, 5, 10)
        .unwrap();
    assert_eq!(
        rounded_percents(&net, road),
        vec![(0.0, 0.5), (0.5, 0.6), (0.6, 0.75), (0.75, 1.0)]
    );
    let r = net.get_r(road);
    assert!(r.sections[0].get_lane(LaneID(-1)).is_none());
    assert!(r.sections[1].get_lane(LaneID(-1)).is_none());
    assert!(r.sections[2].get_lane(LaneID(-1)).unwrap().is_transition());
    assert!(!r.sections[3].get_lane(LaneID(-1)).unwrap().is_transition());
    // Other lanes are untouched
    assert!(r.sections[0].get_lane(LaneID(1)).is_some());

    // Narrowing the reverse lane in the first section drops it from everything after
    net.split_section(road, SectionID(0), LaneID(1), 10, 6, 10)
        .unwrap();
    let r = net.get_r(road);
    assert_eq!(r.sections.len(), 5);
    assert!(r.sections[1].get_lane(LaneID(1)).unwrap().is_transition());
    for s in &r.sections[2..] {
        assert!(s.get_lane(LaneID(1)).is_none());
    }
}

#[test]
fn close_points_are_rejected() {
    let mut net = RoadNetwork::new(EngineConfig::default());
    let (group, road) = straight_road(&mut net, Pt3D::ORIGIN, Pt3D::new(10.0, 0.0, 0.0));
    let before = net.snapshot();

    assert!(net
        .add_point(Pt3D::new(10.3, 0.0, 0.0), Some(group), true)
        .is_none());
    assert!(net
        .add_point(Pt3D::new(0.0, 0.2, 0.0), Some(group), false)
        .is_none());
    assert!(net
        .insert_tween_point(group, Pt3D::new(0.1, 0.1, 0.0))
        .is_none());
    let end = net.get_cp(group).unwrap().points[1].id;
    assert!(net
        .move_points(group, &[(end, Pt3D::new(0.3, 0.0, 0.0))])
        .is_none());
    assert_eq!(net.get_cp(group).unwrap().points.len(), 2);
    assert_eq!(net.snapshot(), before);

    // Far enough away is fine
    net.insert_tween_point(group, Pt3D::new(5.0, 2.0, 0.0))
        .unwrap();
    let cp = net.get_cp(group).unwrap();
    assert_eq!(cp.points.len(), 3);
    assert_eq!(cp.points[1].pos, Pt3D::new(5.0, 2.0, 0.0));
    assert!(net.get_r(road).length.inner_meters() > 10.0);
}

#[test]
fn removing_every_point_deletes_the_road() {
    let mut net = RoadNetwork::new(EngineConfig::default());
    let (group, road) = straight_road(&mut net, Pt3D::ORIGIN, Pt3D::new(10.0, 0.0, 0.0));
    let ids: Vec<_> = net
        .get_cp(group)
        .unwrap()
        .points
        .iter()
        .map(|pt| pt.id)
        .collect();

    net.remove_point(group, ids[0]).unwrap();
    assert!(net.maybe_get_r(road).is_some());
    net.remove_point(group, ids[1]).unwrap();
    assert!(net.maybe_get_r(road).is_none());
    assert!(net.get_cp(group).is_none());
    assert!(net.remove_point(group, ids[1]).is_none());
}

#[test]
fn undo_and_redo() {
    let mut net = RoadNetwork::new(EngineConfig::default());
    let mut history = History::new();
    let (group, road) = straight_road(&mut net, Pt3D::ORIGIN, Pt3D::new(10.0, 0.0, 0.0));
    let original = net.snapshot();

    let (_, cmd) = net
        .split_section(road, SectionID(0), LaneID(-1), 2, 5, 10)
        .unwrap();
    history.record(cmd);
    let split = net.snapshot();
    let pt = net.get_cp(group).unwrap().points[1].id;
    let (_, cmd) = net
        .move_points(group, &[(pt, Pt3D::new(20.0, 0.0, 0.0))])
        .unwrap();
    history.record(cmd);
    assert!((net.get_r(road).length.inner_meters() - 20.0).abs() < 1e-2);

    assert!(history.undo(&mut net));
    assert_eq!(net.snapshot().roads, split.roads);
    assert!(history.undo(&mut net));
    assert_eq!(net.snapshot().roads, original.roads);
    assert_eq!(net.get_r(road).sections.len(), 1);
    assert!(!history.can_undo());
    assert!(!history.undo(&mut net));

    assert!(history.redo(&mut net));
    assert_eq!(net.get_r(road).sections.len(), 3);
    assert!(history.can_redo());

    // A fresh edit forgets what could be redone
    let (_, cmd) = net.divide_section(road, 0.8).unwrap();
    history.record(cmd);
    assert!(!history.can_redo());
    assert_eq!(net.get_r(road).sections.len(), 4);
}

#[test]
fn edits_only_record_what_they_touch() {
    let mut net = RoadNetwork::new(EngineConfig::default());
    let (group1, road1) = straight_road(&mut net, Pt3D::ORIGIN, Pt3D::new(10.0, 0.0, 0.0));
    let (group2, _) = straight_road(
        &mut net,
        Pt3D::new(0.0, 20.0, 0.0),
        Pt3D::new(10.0, 20.0, 0.0),
    );

    let pt = net.get_cp(group1).unwrap().points[1].id;
    let (_, cmd) = net
        .move_points(group1, &[(pt, Pt3D::new(15.0, 0.0, 0.0))])
        .unwrap();
    assert_eq!(cmd.control_points.old.keys().collect::<Vec<_>>(), vec![&group1]);
    assert_eq!(cmd.roads.old.keys().collect::<Vec<_>>(), vec![&road1]);
    assert!(cmd.junctions.is_empty());
    assert!(!cmd.control_points.old.contains_key(&group2));

    // A brand new road didn't exist before
    let (added, cmd) = net
        .add_point(Pt3D::new(0.0, 40.0, 0.0), None, true)
        .unwrap();
    let group3 = added.point.parent;
    let road3 = added.new_road.unwrap();
    assert_eq!(cmd.control_points.old.get(&group3), Some(&None));
    assert_eq!(cmd.roads.old.get(&road3), Some(&None));
    assert!(cmd.roads.new[&road3].is_some());
    assert_eq!(cmd.roads.old.len(), 1);

    // Nothing changes, nothing is recorded
    let (_, cmd) = net
        .move_points(group1, &[(pt, Pt3D::new(15.0, 0.0, 0.0))])
        .unwrap();
    assert!(cmd.is_empty());
}

#[test]
fn lane_edits_are_clamped() {
    let mut net = RoadNetwork::new(EngineConfig::default());
    let (_, road) = straight_road(&mut net, Pt3D::ORIGIN, Pt3D::new(30.0, 0.0, 0.0));

    let (lane, _) = net
        .add_lane(road, SectionID(0), road_network::Direction::Forward, None)
        .unwrap();
    assert_eq!(lane, LaneID(-2));
    net.set_lane_width(road, SectionID(0), lane, Distance::meters(500.0))
        .unwrap();
    assert_eq!(
        net.get_r(road).sections[0].get_lane(lane).unwrap().normal_width(),
        Distance::meters(99.0)
    );
    net.set_lane_width(road, SectionID(0), lane, Distance::meters(0.1))
        .unwrap();
    assert_eq!(
        net.get_r(road).sections[0].get_lane(lane).unwrap().normal_width(),
        Distance::meters(0.4)
    );

    net.remove_lane(road, SectionID(0), lane).unwrap();
    assert!(net.remove_lane(road, SectionID(0), lane).is_err());
    assert!(net
        .add_lane(RoadID(99), SectionID(0), road_network::Direction::Forward, None)
        .is_err());
}

#[test]
fn elevation_profile() {
    let mut net = RoadNetwork::new(EngineConfig::default());
    let (_, road) = straight_road(&mut net, Pt3D::ORIGIN, Pt3D::new(40.0, 0.0, 0.0));
    net.set_road_elevation(
        road,
        Some(vec![(Distance::ZERO, 0.0), (Distance::meters(40.0), 4.0)]),
    )
    .unwrap();

    let reference = &net.get_r(road).sections[0].boundaries[0].sample_points;
    assert!(reference[0].z().abs() < 1e-6);
    assert!((reference[reference.len() - 1].z() - 4.0).abs() < 1e-6);

    assert!(net
        .set_road_elevation(road, Some(vec![(Distance::ZERO, 1.0)]))
        .is_err());
    net.set_road_elevation(road, None).unwrap();
    let reference = &net.get_r(road).sections[0].boundaries[0].sample_points;
    assert!(reference.iter().all(|pt| pt.z().abs() < 1e-6));
}

#[test]
fn circle_roads() {
    let mut net = RoadNetwork::new(EngineConfig::default());
    let circle = CircleOption {
        center: Pt3D::ORIGIN,
        radius: 50.0,
        start: Angle::ZERO,
        end: Angle::degrees(90.0),
        clockwise: false,
    };
    let (road, _) = net.create_circle_road(circle).unwrap();
    let quarter = std::f64::consts::PI * 50.0 / 2.0;
    assert!((net.get_r(road).length.inner_meters() - quarter).abs() < 0.5);

    // Too short, then too close to a full circle
    assert!(net
        .drag_circle_endpoint(road, RoadEnd::End, Angle::degrees(10.0))
        .is_none());
    assert!(net
        .drag_circle_endpoint(road, RoadEnd::End, Angle::degrees(355.0))
        .is_none());
    assert_eq!(net.get_r(road).circle, Some(circle));

    net.drag_circle_endpoint(road, RoadEnd::End, Angle::degrees(180.0))
        .unwrap();
    let moved = net.get_r(road).circle.unwrap();
    assert!((moved.sweep().normalized_degrees() - 180.0).abs() < 1e-6);
    assert!((net.get_r(road).length.inner_meters() - 2.0 * quarter).abs() < 1.0);

    // Dragging points by hand turns it into a plain road
    let group = net.get_r(road).group;
    let pt = net.get_cp(group).unwrap().points[0].id;
    net.move_points(group, &[(pt, Pt3D::new(60.0, 0.0, 0.0))])
        .unwrap();
    assert!(!net.get_r(road).is_circle_road());

    let bad = CircleOption {
        end: Angle::degrees(5.0),
        ..circle
    };
    assert!(net.create_circle_road(bad).is_err());
}

#[test]
fn state_survives_json() {
    let mut net = RoadNetwork::new(EngineConfig::default());
    let (_, road) = straight_road(&mut net, Pt3D::ORIGIN, Pt3D::new(25.0, 5.0, 1.0));
    net.split_section(road, SectionID(0), LaneID(1), 6, 3, 10)
        .unwrap();

    let raw = abstutil::to_json(&net.snapshot()).unwrap();
    let state: NetworkState = abstutil::from_json(&raw).unwrap();
    let restored = RoadNetwork::from_state(state);

    let before = net.get_r(road);
    let mut after = restored.get_r(road).clone();
    recompute_road(&mut after);
    assert_eq!(before.sections.len(), after.sections.len());
    for (s1, s2) in before.sections.iter().zip(after.sections.iter()) {
        assert!((s1.p_start - s2.p_start).abs() < 1e-9);
        assert!((s1.p_end - s2.p_end).abs() < 1e-9);
        assert_eq!(s1.boundaries.len(), s2.boundaries.len());
        for (b1, b2) in s1.boundaries.iter().zip(s2.boundaries.iter()) {
            assert_eq!(b1.sample_points.len(), b2.sample_points.len());
            if let (Some(first), Some(last)) = (b1.sample_points.first(), b1.sample_points.last())
            {
                assert!(first.approx_eq(b2.sample_points[0], EPSILON_DIST));
                let other = b2.sample_points[b2.sample_points.len() - 1];
                assert!(last.approx_eq(other, EPSILON_DIST));
            }
        }
    }
}
