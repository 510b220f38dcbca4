//! The closed region where road ends meet. Consecutive road mouths, in angular order, are joined
//! with smooth edges, and the resulting outline is triangulated.

use ordered_float::OrderedFloat;
use serde::{Deserialize, Serialize};

use abstutil::wraparound_get;
use geom::{bezier_with_endpoint_tangents, Curve, Pt3D, Tessellation, EPSILON_DIST};

use crate::pool::KernelError;
use crate::{GeoAttr, RefRoad};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct JunctionBoundaryRequest {
    pub ref_roads: Vec<RefRoad>,
    /// Keep edges whose two corners coincide. Only set when exactly two roads meet, where those
    /// edges are still needed to close the outline.
    pub enable_close_point: bool,
    pub is_multiple_road: bool,
    /// Even, so every edge has a middle sample
    pub edge_segments: usize,
}

/// Computes the junction's surface. Fewer than two road mouths produce no geometry at all.
pub fn junction_boundary(req: &JunctionBoundaryRequest) -> Result<Option<GeoAttr>, KernelError> {
    if req.ref_roads.len() < 2 {
        return Ok(None);
    }
    let sorted = sort_ref_roads(req.ref_roads.clone());
    let edges = boundary_edges(&sorted, req.enable_close_point, req.edge_segments);

    let tess = if req.is_multiple_road {
        let mut ring: Vec<Pt3D> = Vec::new();
        for pt in edges.into_iter().flatten() {
            if ring
                .last()
                .map(|last| last.approx_eq(pt, EPSILON_DIST))
                .unwrap_or(false)
            {
                continue;
            }
            ring.push(pt);
        }
        while ring.len() > 1 && ring[0].approx_eq(ring[ring.len() - 1], EPSILON_DIST) {
            ring.pop();
        }
        Tessellation::from_ring(ring).map_err(|err| KernelError::Degenerate(err.to_string()))?
    } else {
        if edges.len() != 2 {
            return Err(KernelError::Degenerate(format!(
                "Two roads meeting should make 2 boundary edges, not {}",
                edges.len()
            )));
        }
        let mut opposite = edges[1].clone();
        opposite.reverse();
        Tessellation::strip(&edges[0], &opposite)
            .map_err(|err| KernelError::Degenerate(err.to_string()))?
    };

    let (vertices, indices) = tess.consume();
    Ok(Some(GeoAttr { vertices, indices }))
}

/// Orders road mouths clockwise around the junction center. The sort is stable, so the same
/// input always produces the same winding.
pub fn sort_ref_roads(mut ref_roads: Vec<RefRoad>) -> Vec<RefRoad> {
    let center = junction_center(&ref_roads);
    ref_roads.sort_by_key(|r| {
        let mouth = r.mouth_center();
        let angle = (mouth.y() - center.y()).atan2(mouth.x() - center.x());
        // Decreasing angle is clockwise
        std::cmp::Reverse(OrderedFloat(normalize_angle(angle)))
    });
    ref_roads
}

fn normalize_angle(rads: f64) -> f64 {
    if rads < 0.0 {
        rads + 2.0 * std::f64::consts::PI
    } else {
        rads
    }
}

/// Every pair of road mouths is joined with a curve leaving each mouth along its road, and the
/// middles of those curves are averaged.
fn junction_center(ref_roads: &[RefRoad]) -> Pt3D {
    let mut midpoints = Vec::new();
    for (idx, r1) in ref_roads.iter().enumerate() {
        for r2 in ref_roads.iter().skip(idx + 1) {
            let curve = bezier_with_endpoint_tangents(
                r1.mouth_center(),
                r1.along_vec,
                r2.mouth_center(),
                r2.along_vec,
            );
            midpoints.push(curve.point(0.5));
        }
    }
    Pt3D::center(&midpoints)
}

/// One edge per consecutive pair of sorted road mouths, each with `segments + 1` points. Which
/// corners an edge joins depends on whether each road ends or starts at the junction.
pub fn boundary_edges(
    sorted: &[RefRoad],
    enable_close_point: bool,
    segments: usize,
) -> Vec<Vec<Pt3D>> {
    let mut edges = Vec::new();
    for idx in 0..sorted.len() {
        let current = &sorted[idx];
        let next = wraparound_get(sorted, idx as isize + 1);
        let (first, second) = match (current.is_tail(), next.is_tail()) {
            (true, true) => (current.left_point, next.right_point),
            (false, false) => (current.right_point, next.left_point),
            (true, false) => (current.left_point, next.left_point),
            (false, true) => (current.right_point, next.right_point),
        };
        if !enable_close_point && first.approx_eq(second, EPSILON_DIST) {
            continue;
        }
        let curve =
            bezier_with_endpoint_tangents(first, current.along_vec, second, next.along_vec);
        edges.push(curve.spaced_points(segments));
    }
    edges
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Direction, LinkRoad, RoadEnd, RoadID};

    fn mouth(road: usize, end: RoadEnd, dir: Direction, along: Pt3D, l: Pt3D, r: Pt3D) -> RefRoad {
        RefRoad {
            link: LinkRoad::new(RoadID(road), end, dir),
            along_vec: along,
            left_point: l,
            right_point: r,
        }
    }

    fn east() -> Pt3D {
        Pt3D::new(1.0, 0.0, 0.0)
    }

    // A road ending at x=0 and another starting at x=5, both one-way eastbound
    fn two_roads() -> Vec<RefRoad> {
        vec![
            mouth(
                0,
                RoadEnd::End,
                Direction::Forward,
                east(),
                Pt3D::new(0.0, 0.0, 0.0),
                Pt3D::new(0.0, -3.5, 0.0),
            ),
            mouth(
                1,
                RoadEnd::Start,
                Direction::Forward,
                -east(),
                Pt3D::new(5.0, 0.0, 0.0),
                Pt3D::new(5.0, -3.5, 0.0),
            ),
        ]
    }

    #[test]
    fn two_road_strip() {
        let req = JunctionBoundaryRequest {
            ref_roads: two_roads(),
            enable_close_point: true,
            is_multiple_road: false,
            edge_segments: 30,
        };
        let geo = junction_boundary(&req).unwrap().unwrap();
        assert_eq!(geo.vertices.len(), 62 * 3);
        assert_eq!(geo.num_triangles(), 60);

        let tess = Tessellation::new(
            geo.vertices
                .chunks_exact(3)
                .map(|v| Pt3D::new(v[0] as f64, v[1] as f64, v[2] as f64))
                .collect(),
            geo.indices.clone(),
        );
        assert!((tess.area() - 5.0 * 3.5).abs() < 1e-3);

        // Same input, same output
        assert_eq!(junction_boundary(&req).unwrap().unwrap(), geo);
    }

    #[test]
    fn fewer_than_two_roads() {
        let mut roads = two_roads();
        roads.pop();
        let req = JunctionBoundaryRequest {
            ref_roads: roads,
            enable_close_point: false,
            is_multiple_road: false,
            edge_segments: 30,
        };
        assert_eq!(junction_boundary(&req).unwrap(), None);
    }

    #[test]
    fn three_way_junction() {
        let w = 3.5;
        // Two-way roads from the west, east and south, each split into its forward and reverse
        // halves
        let west_end = Pt3D::new(-10.0, 0.0, 0.0);
        let east_start = Pt3D::new(10.0, 0.0, 0.0);
        let south_end = Pt3D::new(0.0, -10.0, 0.0);
        let north = Pt3D::new(0.0, 1.0, 0.0);
        let dx = Pt3D::new(w, 0.0, 0.0);
        let dy = Pt3D::new(0.0, w, 0.0);
        let ref_roads = vec![
            mouth(0, RoadEnd::End, Direction::Forward, east(), west_end, west_end - dy),
            mouth(0, RoadEnd::End, Direction::Reverse, east(), west_end + dy, west_end),
            mouth(1, RoadEnd::Start, Direction::Forward, -east(), east_start, east_start - dy),
            mouth(1, RoadEnd::Start, Direction::Reverse, -east(), east_start + dy, east_start),
            mouth(2, RoadEnd::End, Direction::Forward, north, south_end, south_end + dx),
            mouth(2, RoadEnd::End, Direction::Reverse, north, south_end - dx, south_end),
        ];
        let sorted = sort_ref_roads(ref_roads.clone());
        // The two halves of each road are adjacent, so the edge between them collapses
        let edges = boundary_edges(&sorted, false, 30);
        assert_eq!(edges.len(), 3);
        for edge in &edges {
            assert_eq!(edge.len(), 31);
        }

        let geo = junction_boundary(&JunctionBoundaryRequest {
            ref_roads,
            enable_close_point: false,
            is_multiple_road: true,
            edge_segments: 30,
        })
        .unwrap()
        .unwrap();
        assert!(geo.num_triangles() > 0);
        assert!(geo.indices.iter().all(|idx| (*idx as usize) < geo.vertices.len() / 3));
    }
}
