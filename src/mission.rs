//! Mission controller: drives the agent through the planned waypoints one
//! state transition at a time.
//!
//! The controller is caller-driven. `step()` advances exactly one transition,
//! `tick()` is meant to be called once per frame and steps on its own only while
//! auto-run is on. Paths are computed at goal transitions only, so a navigating
//! step is a queue pop plus a grid update.

use crate::error::Result;
use crate::grid::{CellKind, Coord, Direction, Grid, GridSpec};
use crate::pathfinding::find_path;
use crate::planner::{plan_order, OrderingMode, RankingProvider};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use tracing::{debug, error, info, warn};

/// Where the mission currently is. Indices refer to the planned goal order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "state", content = "goal")]
pub enum MissionStatus {
    Idle,
    Navigating(usize),
    Arrived(usize),
    Complete,
    /// The goal is unreachable from the agent's cell and will be skipped
    Blocked(usize),
}

/// Auto-run speed, as a number of frames between steps
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SpeedLevel {
    Slow,
    #[default]
    Medium,
    Fast,
}

impl SpeedLevel {
    pub fn frame_delay(&self) -> u64 {
        match self {
            SpeedLevel::Slow => 6,
            SpeedLevel::Medium => 3,
            SpeedLevel::Fast => 1,
        }
    }

    /// Map the 1/2/3 control keys to a level
    pub fn from_level(level: u8) -> Option<SpeedLevel> {
        match level {
            1 => Some(SpeedLevel::Slow),
            2 => Some(SpeedLevel::Medium),
            3 => Some(SpeedLevel::Fast),
            _ => None,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            SpeedLevel::Slow => "1-Slow",
            SpeedLevel::Medium => "2-Med",
            SpeedLevel::Fast => "3-Fast",
        }
    }
}

/// Input from the presentation layer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlEvent {
    Step,
    ToggleAutoRun,
    SetSpeed(SpeedLevel),
    Reset,
    Quit,
}

/// A planned goal. `id` is its 1-based position in the visitation order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Waypoint {
    pub id: usize,
    pub coord: Coord,
    pub visited: bool,
}

/// Everything needed to build (or rebuild) a mission
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MissionSettings {
    pub grid: GridSpec,
    pub mode: OrderingMode,
    pub speed: SpeedLevel,
    pub auto_run: bool,
}

/// Read-only view handed to the presentation layer each frame
#[derive(Debug, Clone, Serialize)]
pub struct MissionSnapshot {
    pub rows: i32,
    pub cols: i32,
    /// Row-major cell kinds
    pub cells: Vec<CellKind>,
    pub agent: Coord,
    pub facing: Direction,
    /// Cells still to be entered on the way to the current goal
    pub path: Vec<Coord>,
    pub waypoints: Vec<Waypoint>,
    pub steps_taken: u64,
    pub current_goal: Option<usize>,
    pub status: MissionStatus,
    pub status_message: String,
    pub speed: SpeedLevel,
    pub auto_run: bool,
}

impl MissionSnapshot {
    pub fn cell(&self, coord: Coord) -> Option<CellKind> {
        if coord.row < 0 || coord.row >= self.rows || coord.col < 0 || coord.col >= self.cols {
            return None;
        }
        self.cells.get((coord.row * self.cols + coord.col) as usize).copied()
    }

    /// Waypoint (if any) planned at `coord`
    pub fn waypoint_at(&self, coord: Coord) -> Option<&Waypoint> {
        self.waypoints.iter().find(|w| w.coord == coord)
    }

    pub fn visited_count(&self) -> usize {
        self.waypoints.iter().filter(|w| w.visited).count()
    }
}

/// Outcome of running a mission headless
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MissionReport {
    pub complete: bool,
    pub steps_taken: u64,
    pub transitions: usize,
    /// Ids of goals reached, in order
    pub visited: Vec<usize>,
    /// Ids of goals skipped as unreachable, in order
    pub skipped: Vec<usize>,
}

pub struct MissionController {
    settings: MissionSettings,
    provider: Option<Box<dyn RankingProvider>>,
    grid: Grid,
    waypoints: Vec<Waypoint>,
    path: VecDeque<Coord>,
    status: MissionStatus,
    steps_taken: u64,
    auto_run: bool,
    speed: SpeedLevel,
    facing: Direction,
    frame_count: u64,
    visited: Vec<usize>,
    skipped: Vec<usize>,
}

impl MissionController {
    /// Generate a grid from `settings` and plan the visitation order
    pub fn new(settings: MissionSettings, provider: Option<Box<dyn RankingProvider>>) -> Result<Self> {
        let grid = Grid::generate(&settings.grid)?;
        Ok(Self::with_grid(grid, settings, provider))
    }

    /// Plan a mission over an existing grid. Only unvisited waypoints become goals.
    pub fn with_grid(grid: Grid, settings: MissionSettings, provider: Option<Box<dyn RankingProvider>>) -> Self {
        let pending = grid.pending_waypoints();
        let order = plan_order(&grid, grid.agent(), &pending, settings.mode, provider.as_deref());
        let waypoints = order
            .into_iter()
            .enumerate()
            .map(|(i, coord)| Waypoint {
                id: i + 1,
                coord,
                visited: false,
            })
            .collect::<Vec<_>>();

        info!(goals = waypoints.len(), mode = ?settings.mode, "mission planned");

        MissionController {
            auto_run: settings.auto_run,
            speed: settings.speed,
            settings,
            provider,
            grid,
            waypoints,
            path: VecDeque::new(),
            status: MissionStatus::Idle,
            steps_taken: 0,
            facing: Direction::Right,
            frame_count: 0,
            visited: Vec::new(),
            skipped: Vec::new(),
        }
    }

    pub fn grid(&self) -> &Grid {
        &self.grid
    }

    pub fn settings(&self) -> &MissionSettings {
        &self.settings
    }

    /// Goals in visitation order
    pub fn waypoints(&self) -> &[Waypoint] {
        &self.waypoints
    }

    pub fn status(&self) -> MissionStatus {
        self.status
    }

    pub fn steps_taken(&self) -> u64 {
        self.steps_taken
    }

    pub fn speed(&self) -> SpeedLevel {
        self.speed
    }

    pub fn auto_run(&self) -> bool {
        self.auto_run
    }

    pub fn facing(&self) -> Direction {
        self.facing
    }

    pub fn remaining_path(&self) -> impl Iterator<Item = &Coord> {
        self.path.iter()
    }

    /// True while the current goal has been found unreachable
    pub fn is_blocked(&self) -> bool {
        matches!(self.status, MissionStatus::Blocked(_))
    }

    pub fn is_complete(&self) -> bool {
        self.status == MissionStatus::Complete
    }

    /// Ids of goals skipped as unreachable so far
    pub fn skipped_waypoints(&self) -> &[usize] {
        &self.skipped
    }

    /// Index of the goal being worked on, if any
    pub fn current_goal(&self) -> Option<usize> {
        match self.status {
            MissionStatus::Navigating(i) | MissionStatus::Arrived(i) | MissionStatus::Blocked(i) => Some(i),
            MissionStatus::Idle | MissionStatus::Complete => None,
        }
    }

    /// Advance exactly one state transition and return the new status
    pub fn step(&mut self) -> MissionStatus {
        let next = match self.status {
            MissionStatus::Idle => {
                info!(agent = %self.grid.agent(), "mission started");
                self.begin_goal(0)
            }
            MissionStatus::Navigating(i) => self.advance(i),
            MissionStatus::Arrived(i) => {
                self.complete_goal(i);
                self.begin_goal(i + 1)
            }
            MissionStatus::Blocked(i) => {
                warn!(goal = i + 1, "skipping unreachable waypoint");
                self.begin_goal(i + 1)
            }
            MissionStatus::Complete => MissionStatus::Complete,
        };
        self.status = next;
        next
    }

    /// Per-frame hook: steps when auto-run is on and the speed's frame delay has elapsed.
    ///
    /// Returns the new status if a step was taken.
    pub fn tick(&mut self) -> Option<MissionStatus> {
        let due = self.auto_run && self.frame_count % self.speed.frame_delay() == 0;
        self.frame_count = self.frame_count.wrapping_add(1);
        if due && !self.is_complete() {
            Some(self.step())
        } else {
            None
        }
    }

    /// Apply a control event. Returns false when the caller should quit.
    pub fn handle(&mut self, event: ControlEvent) -> bool {
        match event {
            ControlEvent::Step => {
                self.step();
            }
            ControlEvent::ToggleAutoRun => {
                self.auto_run = !self.auto_run;
                debug!(auto_run = self.auto_run, "auto-run toggled");
            }
            ControlEvent::SetSpeed(speed) => {
                self.speed = speed;
                debug!(speed = speed.label(), "speed changed");
            }
            ControlEvent::Reset => {
                if let Err(e) = self.reset() {
                    error!(error = %e, "reset failed, keeping current mission");
                }
            }
            ControlEvent::Quit => return false,
        }
        true
    }

    /// Start over on a fresh layout, advancing the seed by one
    pub fn reset(&mut self) -> Result<()> {
        let mut settings = self.settings.clone();
        settings.grid.seed = settings.grid.seed.wrapping_add(1);
        self.reset_with(settings)
    }

    /// Start over with new settings.
    ///
    /// The grid is generated before any state is touched, so a failure leaves the
    /// current mission intact.
    pub fn reset_with(&mut self, settings: MissionSettings) -> Result<()> {
        let grid = Grid::generate(&settings.grid)?;
        let provider = self.provider.take();
        *self = Self::with_grid(grid, settings, provider);
        info!(seed = self.settings.grid.seed, "mission reset");
        Ok(())
    }

    /// Step until complete or `max_transitions` transitions have been made
    pub fn run_to_completion(&mut self, max_transitions: usize) -> MissionReport {
        let mut transitions = 0;
        while !self.is_complete() && transitions < max_transitions {
            self.step();
            transitions += 1;
        }
        MissionReport {
            complete: self.is_complete(),
            steps_taken: self.steps_taken,
            transitions,
            visited: self.visited.clone(),
            skipped: self.skipped.clone(),
        }
    }

    pub fn snapshot(&self) -> MissionSnapshot {
        let cells = (0..self.grid.rows)
            .flat_map(|row| (0..self.grid.cols).map(move |col| Coord::new(row, col)))
            .map(|c| self.grid.cell(c).unwrap_or(CellKind::Blocked))
            .collect();

        MissionSnapshot {
            rows: self.grid.rows,
            cols: self.grid.cols,
            cells,
            agent: self.grid.agent(),
            facing: self.facing,
            path: self.path.iter().copied().collect(),
            waypoints: self.waypoints.clone(),
            steps_taken: self.steps_taken,
            current_goal: self.current_goal(),
            status: self.status,
            status_message: self.status_message(),
            speed: self.speed,
            auto_run: self.auto_run,
        }
    }

    pub fn status_message(&self) -> String {
        match self.status {
            MissionStatus::Idle => "Idle.".to_string(),
            MissionStatus::Navigating(i) => format!("Navigating to waypoint {}...", i + 1),
            MissionStatus::Arrived(i) => format!("Arrived at waypoint {}.", i + 1),
            MissionStatus::Blocked(i) => format!("Waypoint {} unreachable, skipping.", i + 1),
            MissionStatus::Complete => "Mission complete.".to_string(),
        }
    }

    /// Plan the path to goal `index`, or finish when there are no goals left
    fn begin_goal(&mut self, index: usize) -> MissionStatus {
        self.path.clear();
        let Some(goal) = self.waypoints.get(index).map(|w| w.coord) else {
            info!(steps = self.steps_taken, visited = self.visited.len(), skipped = self.skipped.len(), "mission complete");
            return MissionStatus::Complete;
        };

        match find_path(&self.grid, self.grid.agent(), goal) {
            Ok(path) => {
                debug!(goal = index + 1, steps = path.len_steps(), "path planned");
                self.path = path.into_moves();
                if self.path.is_empty() {
                    MissionStatus::Arrived(index)
                } else {
                    MissionStatus::Navigating(index)
                }
            }
            Err(e) => {
                warn!(goal = index + 1, error = %e, "waypoint unreachable");
                self.skipped.push(self.waypoints[index].id);
                MissionStatus::Blocked(index)
            }
        }
    }

    /// Move one cell along the current path
    fn advance(&mut self, index: usize) -> MissionStatus {
        let goal = self.waypoints[index].coord;
        let Some(next) = self.path.pop_front() else {
            return self.begin_goal(index);
        };

        let from = self.grid.agent();
        if let Err(e) = self.grid.move_agent(next) {
            debug_assert!(false, "planned path entered an invalid cell: {}", e);
            error!(error = %e, "planned path entered an invalid cell, replanning");
            return self.begin_goal(index);
        }
        if let Some(direction) = Direction::between(from, next) {
            self.facing = direction;
        }
        self.steps_taken += 1;

        if next == goal {
            MissionStatus::Arrived(index)
        } else {
            MissionStatus::Navigating(index)
        }
    }

    fn complete_goal(&mut self, index: usize) {
        let waypoint = &mut self.waypoints[index];
        if let Err(e) = self.grid.mark_waypoint_visited(waypoint.coord) {
            error!(error = %e, "arrived at a cell that is not an unvisited waypoint");
        }
        waypoint.visited = true;
        self.visited.push(waypoint.id);
        info!(goal = waypoint.id, at = %waypoint.coord, steps = self.steps_taken, "waypoint reached");
    }
}
