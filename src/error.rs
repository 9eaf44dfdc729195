//! Error types for the navigation core

use crate::grid::Coord;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum NavError {
    #[error("Invalid grid dimensions: {rows}x{cols}")]
    InvalidDimensions { rows: i32, cols: i32 },

    /// Target cell is blocked or outside the grid.
    #[error("Invalid move to {0}")]
    InvalidMove(Coord),

    #[error("No unvisited waypoint at {0}")]
    NotAWaypoint(Coord),

    #[error("No path from {start} to {goal}")]
    PathNotFound { start: Coord, goal: Coord },

    #[error("Task order provider failed: {0}")]
    Provider(String),

    #[error("Layout error: {0}")]
    Layout(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<toml::de::Error> for NavError {
    fn from(e: toml::de::Error) -> Self {
        NavError::Config(e.to_string())
    }
}

impl From<reqwest::Error> for NavError {
    fn from(e: reqwest::Error) -> Self {
        NavError::Provider(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, NavError>;
