pub use self::control_point::{
    AddedPoint, ControlPoint, ControlPointGraph, ControlPointID, PointRemoval, RefPoint,
    RefPointID,
};
pub use self::junction::{Junction, JunctionID, LinkRoad, RefRoad};
pub use self::lane::{BoundaryID, GeoAttr, Lane, LaneBoundary, LaneID, LaneWidth};
pub use self::lane_link::{HeadingPoint, LaneEnd, LaneEndInfo, LaneLink, LaneLinkID};
pub use self::road::{CircleOption, Direction, Road, RoadEnd, RoadID};
pub use self::section::{Section, SectionID};

mod control_point;
mod junction;
mod lane;
mod lane_link;
mod road;
mod section;
