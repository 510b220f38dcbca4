use anyhow::{Context, Result};
use serde::Deserialize;

use geom::{Angle, Pt3D};
use road_network::{CircleOption, EngineConfig, JunctionID, LinkRoad, RoadID, RoadNetwork};

#[derive(Deserialize)]
struct Scenario {
    #[serde(default)]
    roads: Vec<ScenarioRoad>,
    #[serde(default)]
    circles: Vec<ScenarioCircle>,
    /// Each junction lists link roads as `index_percent_direction`, where `index` counts roads
    /// first, then circles, in the order given here.
    #[serde(default)]
    junctions: Vec<Vec<String>>,
}

#[derive(Deserialize)]
struct ScenarioRoad {
    points: Vec<Pt3D>,
    /// Also add a second road running the other way along the same points
    #[serde(default)]
    reverse: bool,
}

#[derive(Deserialize)]
struct ScenarioCircle {
    center: Pt3D,
    radius: f64,
    start_degrees: f64,
    end_degrees: f64,
    #[serde(default)]
    clockwise: bool,
}

pub fn run(input: String, config: EngineConfig, output: Option<String>) -> Result<()> {
    let scenario: Scenario = abstutil::read_json(&input)?;
    let mut net = RoadNetwork::new(config);

    let mut roads: Vec<RoadID> = Vec::new();
    for (idx, road) in scenario.roads.iter().enumerate() {
        roads.push(add_road(&mut net, road).with_context(|| format!("road {}", idx))?);
    }
    for circle in &scenario.circles {
        let (id, _) = net.create_circle_road(CircleOption {
            center: circle.center,
            radius: circle.radius,
            start: Angle::degrees(circle.start_degrees),
            end: Angle::degrees(circle.end_degrees),
            clockwise: circle.clockwise,
        })?;
        roads.push(id);
    }

    let mut junctions: Vec<JunctionID> = Vec::new();
    for tokens in &scenario.junctions {
        let mut links = Vec::new();
        for token in tokens {
            let link: LinkRoad = token.parse()?;
            let road = roads
                .get(link.road.0)
                .ok_or_else(|| anyhow!("{} refers to a missing road", token))?;
            links.push(LinkRoad { road: *road, ..link });
        }
        let (j, _) = net.connect_link_road(None, links)?;
        junctions.push(j);
    }

    for road in net.all_roads().values() {
        info!(
            "{} is {} long, with {} sections",
            road.id,
            road.length,
            road.sections.len()
        );
    }
    for j in junctions {
        let junction = net.get_j(j);
        info!(
            "{} joins {} road ends with {} triangles and {} lane links",
            j,
            junction.link_roads.len(),
            junction
                .geo_attr
                .as_ref()
                .map(|geo| geo.num_triangles())
                .unwrap_or(0),
            junction.lane_links.len()
        );
    }

    if let Some(path) = output {
        abstutil::write_json(&path, &net.snapshot())?;
    }
    Ok(())
}

fn add_road(net: &mut RoadNetwork, input: &ScenarioRoad) -> Result<RoadID> {
    let mut pts = input.points.iter();
    let first = pts
        .next()
        .ok_or_else(|| anyhow!("a road needs at least one point"))?;
    let (added, _) = net
        .add_point(*first, None, true)
        .ok_or_else(|| anyhow!("couldn't start a road at {}", first))?;
    let group = added.point.parent;
    let road = added
        .new_road
        .ok_or_else(|| anyhow!("starting a road at {} didn't create one", first))?;
    for pt in pts {
        if net.add_point(*pt, Some(group), true).is_none() {
            warn!("Skipping {}; it's too close to another point of {}", pt, road);
        }
    }
    if input.reverse && net.add_reverse_road(group).is_none() {
        warn!("Couldn't add a reverse road to {}", road);
    }
    Ok(road)
}
