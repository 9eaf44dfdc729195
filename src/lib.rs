pub mod config;
pub mod error;
pub mod grid;
pub mod mission;
pub mod pathfinding;
pub mod planner;
pub mod provider;

pub use config::Config;
pub use error::{NavError, Result};
pub use grid::{CellKind, Coord, Direction, Grid, GridSpec};
pub use mission::{ControlEvent, MissionController, MissionSettings, MissionSnapshot, MissionStatus, SpeedLevel, Waypoint};
pub use pathfinding::{find_path, Path};
pub use planner::{plan_order, OrderingMode, RankingProvider, RankingRequest};
