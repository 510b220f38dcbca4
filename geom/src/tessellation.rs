use anyhow::Result;

use crate::Pt3D;

// Deliberately not serializable
/// A triangulated surface, ready to be handed over as vertex and index buffers.
#[derive(Clone, Debug, PartialEq)]
pub struct Tessellation {
    points: Vec<Pt3D>,
    /// Groups of three indices make up the triangles
    indices: Vec<u32>,
}

impl Tessellation {
    pub fn new(points: Vec<Pt3D>, indices: Vec<u32>) -> Tessellation {
        Tessellation { points, indices }
    }

    /// Triangulates a simple closed ring, using only the ground-plane coordinates. The ring
    /// shouldn't repeat the first point at the end.
    pub fn from_ring(points: Vec<Pt3D>) -> Result<Tessellation> {
        if points.len() < 3 {
            bail!("Can't triangulate a ring with only {} points", points.len());
        }

        let mut vertices = Vec::new();
        for pt in &points {
            vertices.push(pt.x());
            vertices.push(pt.y());
        }
        let indices: Vec<u32> = earcutr::earcut(&vertices, &[], 2)?
            .into_iter()
            .map(|idx| idx as u32)
            .collect();
        if indices.is_empty() {
            bail!("Ring with {} points produced no triangles", points.len());
        }
        Ok(Tessellation { points, indices })
    }

    /// Fills the band between two polylines with the same number of points. This is how a lane
    /// is drawn between its boundaries.
    pub fn strip(left: &[Pt3D], right: &[Pt3D]) -> Result<Tessellation> {
        if left.len() != right.len() {
            bail!(
                "Can't fill between polylines of {} and {} points",
                left.len(),
                right.len()
            );
        }
        if left.len() < 2 {
            bail!("Can't fill between polylines of {} points", left.len());
        }
        let n = left.len() as u32;
        let mut points = left.to_vec();
        points.extend_from_slice(right);
        let mut indices = Vec::new();
        for i in 0..n - 1 {
            indices.extend([i, n + i, i + 1]);
            indices.extend([i + 1, n + i, n + i + 1]);
        }
        Ok(Tessellation { points, indices })
    }

    pub fn points(&self) -> &Vec<Pt3D> {
        &self.points
    }

    pub fn indices(&self) -> &Vec<u32> {
        &self.indices
    }

    pub fn num_triangles(&self) -> usize {
        self.indices.len() / 3
    }

    /// The area covered on the ground plane, summing every triangle.
    pub fn area(&self) -> f64 {
        self.indices
            .chunks_exact(3)
            .map(|tri| {
                let a = self.points[tri[0] as usize];
                let b = self.points[tri[1] as usize];
                let c = self.points[tri[2] as usize];
                ((b.x() - a.x()) * (c.y() - a.y()) - (c.x() - a.x()) * (b.y() - a.y())).abs()
                    / 2.0
            })
            .sum()
    }

    /// Returns (flattened xyz vertices, indices) for rendering
    pub fn consume(self) -> (Vec<f32>, Vec<u32>) {
        let mut vertices = Vec::with_capacity(self.points.len() * 3);
        for pt in self.points {
            vertices.push(pt.x() as f32);
            vertices.push(pt.y() as f32);
            vertices.push(pt.z() as f32);
        }
        (vertices, self.indices)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn square() {
        let ring = vec![
            Pt3D::new(0.0, 0.0, 0.0),
            Pt3D::new(4.0, 0.0, 0.0),
            Pt3D::new(4.0, 4.0, 0.0),
            Pt3D::new(0.0, 4.0, 0.0),
        ];
        let tess = Tessellation::from_ring(ring).unwrap();
        assert_eq!(tess.num_triangles(), 2);
        assert!((tess.area() - 16.0).abs() < 1e-9);
        let (vertices, indices) = tess.consume();
        assert_eq!(vertices.len(), 12);
        assert_eq!(indices.len(), 6);
    }

    #[test]
    fn strip_between_polylines() {
        let left = vec![Pt3D::new(0.0, 1.0, 0.0), Pt3D::new(10.0, 1.0, 0.0)];
        let right = vec![Pt3D::new(0.0, 0.0, 0.0), Pt3D::new(10.0, 0.0, 0.0)];
        let tess = Tessellation::strip(&left, &right).unwrap();
        assert_eq!(tess.indices(), &vec![0, 2, 1, 1, 2, 3]);
        assert!((tess.area() - 10.0).abs() < 1e-9);
        assert!(Tessellation::strip(&left, &right[0..1]).is_err());
        assert!(Tessellation::from_ring(left).is_err());
    }
}
