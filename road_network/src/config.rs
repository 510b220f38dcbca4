use anyhow::Result;
use serde::{Deserialize, Serialize};

use geom::{Angle, Distance};

/// Tunable constants for geometry synthesis. Every field has a default, so a config file only
/// needs to mention what it changes.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Width of newly created lanes
    pub lane_width: Distance,
    pub min_lane_width: Distance,
    pub max_lane_width: Distance,
    /// Lanes per direction on a newly created road
    pub default_forward_lanes: usize,
    pub default_reverse_lanes: usize,
    /// Two control points of one group may not be closer than this
    pub min_point_spacing: Distance,
    /// Segments per junction boundary edge. Keep it even; the midpoint of each edge is used.
    pub junction_edge_segments: usize,
    /// Segments per lane link connector
    pub lane_link_segments: usize,
    /// Angular step used to turn a circle road into control points
    pub circle_step_degrees: f64,
    /// A circle road must sweep at least this much, and leave at least this much of the circle
    /// open for exits
    pub min_circle_sweep_degrees: f64,
    /// Worker threads for junction kernels
    pub num_workers: usize,
}

impl Default for EngineConfig {
    fn default() -> EngineConfig {
        EngineConfig {
            lane_width: Distance::const_meters(3.5),
            min_lane_width: Distance::const_meters(0.4),
            max_lane_width: Distance::const_meters(99.0),
            default_forward_lanes: 1,
            default_reverse_lanes: 1,
            min_point_spacing: Distance::const_meters(0.5),
            junction_edge_segments: 30,
            lane_link_segments: 20,
            circle_step_degrees: 2.0,
            // 8 steps of 2 degrees
            min_circle_sweep_degrees: 16.0,
            num_workers: 3,
        }
    }
}

impl EngineConfig {
    pub fn load(path: &str) -> Result<EngineConfig> {
        let config: EngineConfig = abstutil::read_json(path)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.min_lane_width <= Distance::ZERO || self.min_lane_width > self.max_lane_width {
            bail!(
                "Lane widths must satisfy 0 < {} <= {}",
                self.min_lane_width,
                self.max_lane_width
            );
        }
        if self.lane_width < self.min_lane_width || self.lane_width > self.max_lane_width {
            bail!("Default lane width {} is out of range", self.lane_width);
        }
        if self.junction_edge_segments < 2 || self.junction_edge_segments % 2 != 0 {
            bail!(
                "junction_edge_segments must be even and at least 2, not {}",
                self.junction_edge_segments
            );
        }
        if self.lane_link_segments == 0 {
            bail!("lane_link_segments must be positive");
        }
        if self.circle_step_degrees <= 0.0 {
            bail!("circle_step_degrees must be positive");
        }
        if self.min_circle_sweep_degrees <= 0.0 || self.min_circle_sweep_degrees >= 180.0 {
            bail!(
                "min_circle_sweep_degrees must be in (0, 180), not {}",
                self.min_circle_sweep_degrees
            );
        }
        if self.num_workers == 0 {
            bail!("Need at least one worker");
        }
        Ok(())
    }

    pub fn circle_step(&self) -> Angle {
        Angle::degrees(self.circle_step_degrees)
    }

    pub fn min_circle_sweep(&self) -> Angle {
        Angle::degrees(self.min_circle_sweep_degrees)
    }

    pub fn clamp_lane_width(&self, width: Distance) -> Distance {
        width.clamp(self.min_lane_width, self.max_lane_width)
    }
}
