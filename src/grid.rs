use crate::error::{NavError, Result};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::{debug, warn};

/// A cell coordinate, 0-indexed as (row, col)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Coord {
    pub row: i32,
    pub col: i32,
}

impl Coord {
    pub fn new(row: i32, col: i32) -> Self {
        Coord { row, col }
    }

    /// Manhattan distance, the exact step count on an open 4-connected grid
    pub fn manhattan(&self, other: &Coord) -> u32 {
        self.row.abs_diff(other.row) + self.col.abs_diff(other.col)
    }

    pub fn step(&self, direction: Direction) -> Coord {
        let (dr, dc) = direction.delta();
        Coord::new(self.row + dr, self.col + dc)
    }

    /// Orthogonal neighbours in fixed order: up, down, left, right.
    pub fn neighbors(&self) -> [Coord; 4] {
        Direction::ALL.map(|d| self.step(d))
    }
}

impl fmt::Display for Coord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({},{})", self.row, self.col)
    }
}

/// One orthogonal step on the grid
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Direction {
    Up,
    Down,
    Left,
    Right,
}

impl Direction {
    pub const ALL: [Direction; 4] = [Direction::Up, Direction::Down, Direction::Left, Direction::Right];

    /// (row delta, col delta)
    pub fn delta(&self) -> (i32, i32) {
        match self {
            Direction::Up => (-1, 0),
            Direction::Down => (1, 0),
            Direction::Left => (0, -1),
            Direction::Right => (0, 1),
        }
    }

    /// Direction of a single orthogonal step from `from` to `to`, if it is one
    pub fn between(from: Coord, to: Coord) -> Option<Direction> {
        Direction::ALL.into_iter().find(|d| from.step(*d) == to)
    }
}

/// Classification of a single grid cell
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CellKind {
    Free,
    Blocked,
    Agent,
    Waypoint,
    VisitedWaypoint,
}

impl CellKind {
    fn symbol(&self) -> char {
        match self {
            CellKind::Free => '.',
            CellKind::Blocked => '#',
            CellKind::Agent => 'A',
            CellKind::Waypoint => 'W',
            CellKind::VisitedWaypoint => 'V',
        }
    }
}

/// Parameters for random grid generation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GridSpec {
    pub rows: i32,
    pub cols: i32,
    pub obstacle_count: usize,
    pub waypoint_count: usize,
    pub seed: u64,
}

/// Largest grid that will be allocated
pub const MAX_CELLS: usize = 1 << 22;

/// Number of cells in a `rows` x `cols` grid.
///
/// Fails on non-positive dimensions, on overflow and above `MAX_CELLS`.
pub fn cell_count(rows: i32, cols: i32) -> Result<usize> {
    if rows <= 0 || cols <= 0 {
        return Err(NavError::InvalidDimensions { rows, cols });
    }
    rows.checked_mul(cols)
        .map(|n| n as usize)
        .filter(|&n| n <= MAX_CELLS)
        .ok_or(NavError::InvalidDimensions { rows, cols })
}

/// Occupancy grid with a single agent and a set of waypoints.
///
/// Terrain (free, blocked, waypoint, visited waypoint) is stored per cell and the
/// agent position is kept separately, so the agent can stand on a waypoint
/// without erasing it. `cell()` reports `CellKind::Agent` for the agent's cell.
#[derive(Debug, Clone)]
pub struct Grid {
    pub rows: i32,
    pub cols: i32,
    cells: Vec<CellKind>,
    agent: Coord,
    /// Waypoints in creation order
    waypoints: Vec<Coord>,
    /// Revision number - incremented whenever the grid changes
    pub revision: u64,
}

impl Grid {
    /// Create an all-free grid with the agent at `agent`
    pub fn new(rows: i32, cols: i32, agent: Coord) -> Result<Self> {
        let len = cell_count(rows, cols)?;
        let grid = Grid {
            rows,
            cols,
            cells: vec![CellKind::Free; len],
            agent,
            waypoints: Vec::new(),
            revision: 0,
        };
        if !grid.is_within_bounds(agent) {
            return Err(NavError::InvalidMove(agent));
        }
        Ok(grid)
    }

    /// Generate a random layout from the seed in `spec`
    pub fn generate(spec: &GridSpec) -> Result<Self> {
        let mut rng = StdRng::seed_from_u64(spec.seed);
        Self::generate_with_rng(spec, &mut rng)
    }

    /// Generate a random layout drawing from a caller-supplied generator.
    ///
    /// The agent, waypoints and obstacles all land on distinct cells. Counts that
    /// do not fit are clamped, waypoints taking priority over obstacles.
    pub fn generate_with_rng<R: Rng + ?Sized>(spec: &GridSpec, rng: &mut R) -> Result<Self> {
        let len = cell_count(spec.rows, spec.cols)?;
        let mut coords: Vec<Coord> = Vec::with_capacity(len);
        coords.extend((0..spec.rows)
            .flat_map(|row| (0..spec.cols).map(move |col| Coord::new(row, col))));
        coords.shuffle(rng);

        let (&agent, rest) = coords
            .split_first()
            .ok_or(NavError::InvalidDimensions { rows: spec.rows, cols: spec.cols })?;

        let waypoint_count = spec.waypoint_count.min(rest.len());
        if waypoint_count < spec.waypoint_count {
            warn!(requested = spec.waypoint_count, placed = waypoint_count, "waypoint count clamped to grid size");
        }
        let obstacle_count = spec.obstacle_count.min(rest.len() - waypoint_count);
        if obstacle_count < spec.obstacle_count {
            warn!(requested = spec.obstacle_count, placed = obstacle_count, "obstacle count clamped to grid size");
        }

        let mut grid = Grid::new(spec.rows, spec.cols, agent)?;
        let (waypoints, rest) = rest.split_at(waypoint_count);
        for &coord in waypoints {
            grid.add_waypoint(coord)?;
        }
        for &coord in &rest[..obstacle_count] {
            grid.set_blocked(coord)?;
        }

        debug!(
            rows = spec.rows,
            cols = spec.cols,
            seed = spec.seed,
            agent = %agent,
            waypoints = waypoint_count,
            obstacles = obstacle_count,
            "generated grid"
        );
        Ok(grid)
    }

    /// Parse an ASCII layout.
    ///
    /// `.` free, `#` blocked, `A` agent, `W` waypoint, `V` visited waypoint.
    /// Blank lines and surrounding whitespace are ignored; exactly one `A` is required.
    pub fn from_layout(layout: &str) -> Result<Self> {
        let lines: Vec<&str> = layout
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .collect();

        let rows = i32::try_from(lines.len()).unwrap_or(i32::MAX);
        let cols = i32::try_from(lines.first().map(|l| l.chars().count()).unwrap_or(0)).unwrap_or(i32::MAX);
        let len = cell_count(rows, cols)?;

        let mut agent = None;
        let mut terrain = Vec::with_capacity(len);
        for (row, line) in lines.iter().enumerate() {
            if line.chars().count() as i32 != cols {
                return Err(NavError::Layout(format!("row {} has width {}, expected {}", row, line.chars().count(), cols)));
            }
            for (col, ch) in line.chars().enumerate() {
                let coord = Coord::new(row as i32, col as i32);
                let kind = match ch {
                    '.' => CellKind::Free,
                    '#' => CellKind::Blocked,
                    'W' => CellKind::Waypoint,
                    'V' => CellKind::VisitedWaypoint,
                    'A' => {
                        if agent.replace(coord).is_some() {
                            return Err(NavError::Layout("more than one agent".to_string()));
                        }
                        CellKind::Free
                    }
                    other => return Err(NavError::Layout(format!("unknown cell '{}' at {}", other, coord))),
                };
                terrain.push((coord, kind));
            }
        }

        let agent = agent.ok_or_else(|| NavError::Layout("no agent 'A' in layout".to_string()))?;
        let mut grid = Grid::new(rows, cols, agent)?;
        for (coord, kind) in terrain {
            match kind {
                CellKind::Blocked => grid.set_blocked(coord)?,
                CellKind::Waypoint => grid.add_waypoint(coord)?,
                CellKind::VisitedWaypoint => {
                    grid.add_waypoint(coord)?;
                    grid.mark_waypoint_visited(coord)?;
                }
                _ => {}
            }
        }
        grid.revision = 0;
        Ok(grid)
    }

    /// Render the grid in the format accepted by `from_layout`
    pub fn to_layout(&self) -> String {
        let mut result = String::with_capacity(((self.cols + 1) * self.rows) as usize);
        for row in 0..self.rows {
            for col in 0..self.cols {
                let kind = self.cell(Coord::new(row, col)).unwrap_or(CellKind::Blocked);
                result.push(kind.symbol());
            }
            result.push('\n');
        }
        result
    }

    pub fn is_within_bounds(&self, coord: Coord) -> bool {
        coord.row >= 0 && coord.row < self.rows && coord.col >= 0 && coord.col < self.cols
    }

    /// Out of bounds is considered blocked
    pub fn is_blocked(&self, coord: Coord) -> bool {
        match self.index(coord) {
            Some(idx) => self.cells[idx] == CellKind::Blocked,
            None => true,
        }
    }

    /// Cell kind at `coord`, or None when out of bounds
    pub fn cell(&self, coord: Coord) -> Option<CellKind> {
        let idx = self.index(coord)?;
        if coord == self.agent {
            Some(CellKind::Agent)
        } else {
            Some(self.cells[idx])
        }
    }

    /// Underlying terrain at `coord`, ignoring the agent
    pub fn terrain(&self, coord: Coord) -> Option<CellKind> {
        self.index(coord).map(|idx| self.cells[idx])
    }

    pub fn agent(&self) -> Coord {
        self.agent
    }

    /// All waypoint coordinates (visited or not), in creation order
    pub fn waypoints(&self) -> &[Coord] {
        &self.waypoints
    }

    /// Waypoints that have not been visited yet, in creation order
    pub fn pending_waypoints(&self) -> Vec<Coord> {
        self.waypoints
            .iter()
            .copied()
            .filter(|&c| self.terrain(c) == Some(CellKind::Waypoint))
            .collect()
    }

    /// Blocked cells in row-major order
    pub fn obstacles(&self) -> Vec<Coord> {
        self.cells
            .iter()
            .enumerate()
            .filter(|(_, kind)| **kind == CellKind::Blocked)
            .map(|(idx, _)| self.coord_of(idx))
            .collect()
    }

    /// Block a free cell. Refuses the agent's cell and waypoints.
    pub fn set_blocked(&mut self, coord: Coord) -> Result<()> {
        let idx = self.index(coord).ok_or(NavError::InvalidMove(coord))?;
        if coord == self.agent || self.cells[idx] != CellKind::Free {
            return Err(NavError::InvalidMove(coord));
        }
        self.cells[idx] = CellKind::Blocked;
        self.revision += 1;
        Ok(())
    }

    /// Place an unvisited waypoint on a free cell
    pub fn add_waypoint(&mut self, coord: Coord) -> Result<()> {
        let idx = self.index(coord).ok_or(NavError::InvalidMove(coord))?;
        if self.cells[idx] != CellKind::Free {
            return Err(NavError::InvalidMove(coord));
        }
        self.cells[idx] = CellKind::Waypoint;
        self.waypoints.push(coord);
        self.revision += 1;
        Ok(())
    }

    /// Move the agent to `coord`. Fails if the target is blocked or out of bounds.
    pub fn move_agent(&mut self, coord: Coord) -> Result<()> {
        if self.is_blocked(coord) {
            return Err(NavError::InvalidMove(coord));
        }
        if coord != self.agent {
            self.agent = coord;
            self.revision += 1;
        }
        Ok(())
    }

    /// Flip an unvisited waypoint to visited
    pub fn mark_waypoint_visited(&mut self, coord: Coord) -> Result<()> {
        match self.index(coord) {
            Some(idx) if self.cells[idx] == CellKind::Waypoint => {
                self.cells[idx] = CellKind::VisitedWaypoint;
                self.revision += 1;
                Ok(())
            }
            _ => Err(NavError::NotAWaypoint(coord)),
        }
    }

    fn index(&self, coord: Coord) -> Option<usize> {
        if !self.is_within_bounds(coord) {
            return None;
        }
        Some((coord.row * self.cols + coord.col) as usize)
    }

    fn coord_of(&self, idx: usize) -> Coord {
        let idx = idx as i32;
        Coord::new(idx / self.cols, idx % self.cols)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn spec(seed: u64) -> GridSpec {
        GridSpec {
            rows: 12,
            cols: 16,
            obstacle_count: 15,
            waypoint_count: 3,
            seed,
        }
    }

    #[test]
    fn test_oversized_dimensions_are_rejected() {
        assert!(matches!(
            Grid::new(70_000, 70_000, Coord::new(0, 0)),
            Err(NavError::InvalidDimensions { rows: 70_000, cols: 70_000 })
        ));
        let huge = GridSpec { rows: 40_000, cols: 40_000, ..spec(1) };
        assert!(matches!(Grid::generate(&huge), Err(NavError::InvalidDimensions { .. })));
        assert!(cell_count(2048, 2048).is_ok());
        assert!(cell_count(2048, 2049).is_err());
        assert!(cell_count(0, 5).is_err());
    }

    #[test]
    fn test_generate_is_reproducible() {
        let a = Grid::generate(&spec(42)).unwrap();
        let b = Grid::generate(&spec(42)).unwrap();
        assert_eq!(a.to_layout(), b.to_layout());
        assert_eq!(a.agent(), b.agent());
        assert_eq!(a.waypoints(), b.waypoints());
    }

    #[test]
    fn test_generate_places_distinct_cells() {
        let grid = Grid::generate(&spec(7)).unwrap();
        assert_eq!(grid.waypoints().len(), 3);
        assert_eq!(grid.obstacles().len(), 15);

        let mut seen = HashSet::new();
        assert!(seen.insert(grid.agent()));
        for &w in grid.waypoints() {
            assert!(seen.insert(w), "waypoint {} overlaps", w);
        }
        for o in grid.obstacles() {
            assert!(seen.insert(o), "obstacle {} overlaps", o);
        }
        assert!(!grid.is_blocked(grid.agent()));
    }

    #[test]
    fn test_generate_clamps_counts() {
        let spec = GridSpec {
            rows: 2,
            cols: 2,
            obstacle_count: 10,
            waypoint_count: 2,
            seed: 1,
        };
        let grid = Grid::generate(&spec).unwrap();
        assert_eq!(grid.waypoints().len(), 2);
        assert_eq!(grid.obstacles().len(), 1);
    }

    #[test]
    fn test_generate_rejects_empty_grid() {
        let spec = GridSpec {
            rows: 0,
            cols: 5,
            obstacle_count: 0,
            waypoint_count: 0,
            seed: 1,
        };
        assert!(matches!(Grid::generate(&spec), Err(NavError::InvalidDimensions { .. })));
    }

    #[test]
    fn test_exactly_one_agent_cell() {
        let grid = Grid::generate(&spec(3)).unwrap();
        let agents = (0..grid.rows)
            .flat_map(|r| (0..grid.cols).map(move |c| Coord::new(r, c)))
            .filter(|&c| grid.cell(c) == Some(CellKind::Agent))
            .count();
        assert_eq!(agents, 1);
    }

    #[test]
    fn test_move_agent_rejects_blocked_and_out_of_bounds() {
        let mut grid = Grid::from_layout("A#\n..").unwrap();
        assert!(matches!(grid.move_agent(Coord::new(0, 1)), Err(NavError::InvalidMove(_))));
        assert!(matches!(grid.move_agent(Coord::new(-1, 0)), Err(NavError::InvalidMove(_))));
        assert!(matches!(grid.move_agent(Coord::new(0, 2)), Err(NavError::InvalidMove(_))));
        assert_eq!(grid.agent(), Coord::new(0, 0));

        grid.move_agent(Coord::new(1, 0)).unwrap();
        assert_eq!(grid.cell(Coord::new(1, 0)), Some(CellKind::Agent));
        assert_eq!(grid.cell(Coord::new(0, 0)), Some(CellKind::Free));
    }

    #[test]
    fn test_agent_on_waypoint_keeps_terrain() {
        let mut grid = Grid::from_layout("AW.").unwrap();
        let w = Coord::new(0, 1);
        grid.move_agent(w).unwrap();
        assert_eq!(grid.cell(w), Some(CellKind::Agent));
        assert_eq!(grid.terrain(w), Some(CellKind::Waypoint));

        grid.move_agent(Coord::new(0, 2)).unwrap();
        assert_eq!(grid.cell(w), Some(CellKind::Waypoint));
    }

    #[test]
    fn test_mark_waypoint_visited() {
        let mut grid = Grid::from_layout("A.W").unwrap();
        let w = Coord::new(0, 2);
        assert!(matches!(grid.mark_waypoint_visited(Coord::new(0, 1)), Err(NavError::NotAWaypoint(_))));

        grid.mark_waypoint_visited(w).unwrap();
        assert_eq!(grid.cell(w), Some(CellKind::VisitedWaypoint));
        assert!(grid.pending_waypoints().is_empty());

        // Already visited
        assert!(matches!(grid.mark_waypoint_visited(w), Err(NavError::NotAWaypoint(_))));
    }

    #[test]
    fn test_layout_parse_and_render() {
        let layout = "A.#\n.W.\n#.V\n";
        let grid = Grid::from_layout(layout).unwrap();
        assert_eq!(grid.rows, 3);
        assert_eq!(grid.cols, 3);
        assert_eq!(grid.obstacles(), vec![Coord::new(0, 2), Coord::new(2, 0)]);
        assert_eq!(grid.waypoints(), &[Coord::new(1, 1), Coord::new(2, 2)]);
        assert_eq!(grid.pending_waypoints(), vec![Coord::new(1, 1)]);
        assert_eq!(grid.to_layout(), layout);
    }

    #[test]
    fn test_layout_errors() {
        assert!(matches!(Grid::from_layout("...\n.W."), Err(NavError::Layout(_))));
        assert!(matches!(Grid::from_layout("AA"), Err(NavError::Layout(_))));
        assert!(matches!(Grid::from_layout("A..\n.."), Err(NavError::Layout(_))));
        assert!(matches!(Grid::from_layout("A?"), Err(NavError::Layout(_))));
    }

    #[test]
    fn test_direction_between() {
        let c = Coord::new(3, 3);
        assert_eq!(Direction::between(c, Coord::new(2, 3)), Some(Direction::Up));
        assert_eq!(Direction::between(c, Coord::new(3, 4)), Some(Direction::Right));
        assert_eq!(Direction::between(c, Coord::new(4, 4)), None);
    }
}
