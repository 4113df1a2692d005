mod analyzer;
mod windows;

pub use analyzer::{
    classify, FeasibilityResult, LinkThreshold, PointState, PoolEntry, PoolStatistics,
    SatelliteFeasibility,
};
pub use windows::{find_windows, VisibilityWindow};
