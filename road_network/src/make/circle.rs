//! Roads drawn as circular arcs. The arc is remembered on the road so its ends can be dragged
//! around the circle later.

use anyhow::Result;

use geom::{arc_points, Angle, Distance, Pt3D};

use crate::{CircleOption, RoadEnd};

impl CircleOption {
    /// How far the arc sweeps from its start to its end, in its own direction.
    pub fn sweep(&self) -> Angle {
        self.start.sweep_to(self.end, self.clockwise)
    }

    /// An arc must cover at least `min`, and leave at least `min` of the circle uncovered.
    pub fn validate(&self, min: Angle) -> Result<()> {
        if !self.radius.is_finite() || self.radius <= 0.0 {
            bail!("Circle radius must be positive, not {}", self.radius);
        }
        let sweep = self.sweep().radians();
        let min = min.radians();
        if sweep < min || sweep > 2.0 * std::f64::consts::PI - min {
            bail!(
                "Circle sweeps {}; it must stay between {} and {} degrees",
                self.sweep(),
                min.to_degrees(),
                360.0 - min.to_degrees()
            );
        }
        Ok(())
    }

    /// Control points along the arc, no closer together than `min_spacing`. The first and last
    /// points always sit exactly on the arc's ends.
    pub fn control_points(&self, step: Angle, min_spacing: Distance) -> Vec<Pt3D> {
        // Small circles need a coarser step to respect the spacing
        let spacing_step = min_spacing.inner_meters() / self.radius * 1.01;
        let step = Angle::new_rads(step.radians().max(spacing_step));
        let sweep = self.sweep().radians();
        let end = if self.clockwise {
            self.start.radians() - sweep
        } else {
            self.start.radians() + sweep
        };
        let pts = arc_points(
            self.center,
            self.radius,
            self.start,
            Angle::new_rads(end),
            step,
            self.clockwise,
        );

        let mut kept: Vec<Pt3D> = Vec::with_capacity(pts.len());
        let last = pts.len().saturating_sub(1);
        for (idx, pt) in pts.into_iter().enumerate() {
            if idx == last && !kept.is_empty() {
                // The end always stays; the point before it goes instead if they're too close
                if kept.len() > 1 && kept[kept.len() - 1].dist_to(pt) < min_spacing {
                    kept.pop();
                }
                kept.push(pt);
                break;
            }
            if kept
                .last()
                .map(|prev| prev.dist_to(pt) < min_spacing)
                .unwrap_or(false)
            {
                continue;
            }
            kept.push(pt);
        }
        kept
    }

    /// The same circle with one end moved to a new angle, or `None` if the result would sweep
    /// too little or too much.
    pub fn with_endpoint(&self, end: RoadEnd, angle: Angle, min: Angle) -> Option<CircleOption> {
        let mut moved = *self;
        match end {
            RoadEnd::Start => moved.start = angle,
            RoadEnd::End => moved.end = angle,
        }
        moved.validate(min).ok()?;
        Some(moved)
    }
}
