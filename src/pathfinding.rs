use crate::error::{NavError, Result};
use crate::grid::{Coord, Grid};
use serde::Serialize;
use std::cmp::Ordering;
use std::collections::{BinaryHeap, VecDeque};
use tracing::debug;

/// An ordered run of orthogonally adjacent, unblocked cells.
///
/// Includes both endpoints, so a path from a cell to itself holds one cell and
/// zero steps.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Path {
    cells: Vec<Coord>,
}

impl Path {
    pub fn cells(&self) -> &[Coord] {
        &self.cells
    }

    pub fn start(&self) -> Coord {
        self.cells[0]
    }

    pub fn goal(&self) -> Coord {
        self.cells[self.cells.len() - 1]
    }

    /// Number of moves needed to walk the path
    pub fn len_steps(&self) -> usize {
        self.cells.len() - 1
    }

    /// Cells still to be entered, i.e. everything after the start
    pub fn into_moves(self) -> VecDeque<Coord> {
        self.cells.into_iter().skip(1).collect()
    }
}

/// A frontier entry in the A* search
#[derive(Debug)]
struct OpenNode {
    f: u32,
    g: u32,
    /// Insertion counter; equal f values pop in insertion order
    tie: u64,
    idx: usize,
}

impl PartialEq for OpenNode {
    fn eq(&self, other: &Self) -> bool {
        (self.f, self.tie) == (other.f, other.tie)
    }
}

impl Eq for OpenNode {}

impl PartialOrd for OpenNode {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for OpenNode {
    fn cmp(&self, other: &Self) -> Ordering {
        // Reverse ordering for min-heap (BinaryHeap is max-heap by default)
        other.f.cmp(&self.f).then_with(|| other.tie.cmp(&self.tie))
    }
}

/// Find a shortest 4-connected path from `start` to `goal` with A*.
///
/// Unit step cost and a Manhattan heuristic. Waypoint and agent cells are
/// walkable; only blocked and out-of-bounds cells are avoided. A disconnected
/// goal yields `NavError::PathNotFound`.
pub fn find_path(grid: &Grid, start: Coord, goal: Coord) -> Result<Path> {
    let not_found = || NavError::PathNotFound { start, goal };

    if grid.is_blocked(start) || grid.is_blocked(goal) {
        debug!(%start, %goal, "endpoint blocked or out of bounds");
        return Err(not_found());
    }

    let len = (grid.rows * grid.cols) as usize;
    let index = |c: Coord| (c.row * grid.cols + c.col) as usize;
    let coord_of = |idx: usize| Coord::new(idx as i32 / grid.cols, idx as i32 % grid.cols);

    let mut g_score = vec![u32::MAX; len];
    let mut came_from: Vec<Option<usize>> = vec![None; len];
    let mut closed = vec![false; len];
    let mut open = BinaryHeap::new();
    let mut tie: u64 = 0;

    let start_idx = index(start);
    let goal_idx = index(goal);
    g_score[start_idx] = 0;
    open.push(OpenNode {
        f: start.manhattan(&goal),
        g: 0,
        tie,
        idx: start_idx,
    });

    let mut expanded = 0usize;
    while let Some(node) = open.pop() {
        if closed[node.idx] {
            continue;
        }
        closed[node.idx] = true;
        expanded += 1;

        if node.idx == goal_idx {
            let mut cells = vec![goal];
            let mut current = goal_idx;
            while let Some(prev) = came_from[current] {
                current = prev;
                cells.push(coord_of(current));
            }
            cells.reverse();
            debug!(%start, %goal, steps = cells.len() - 1, expanded, "path found");
            return Ok(Path { cells });
        }

        let cell = coord_of(node.idx);
        for next in cell.neighbors() {
            if grid.is_blocked(next) {
                continue;
            }
            let next_idx = index(next);
            if closed[next_idx] {
                continue;
            }

            let tentative_g = node.g + 1;
            if tentative_g >= g_score[next_idx] {
                continue;
            }

            g_score[next_idx] = tentative_g;
            came_from[next_idx] = Some(node.idx);
            tie += 1;
            open.push(OpenNode {
                f: tentative_g + next.manhattan(&goal),
                g: tentative_g,
                tie,
                idx: next_idx,
            });
        }
    }

    debug!(%start, %goal, expanded, "no path");
    Err(not_found())
}

/// Format path for display
pub fn format_path(path: &[Coord]) -> String {
    if path.is_empty() {
        return "No path".to_string();
    }

    path.iter()
        .map(|c| c.to_string())
        .collect::<Vec<_>>()
        .join(" -> ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_path_to_self() {
        let grid = Grid::from_layout("A..").unwrap();
        let path = find_path(&grid, Coord::new(0, 0), Coord::new(0, 0)).unwrap();
        assert_eq!(path.cells(), &[Coord::new(0, 0)]);
        assert_eq!(path.len_steps(), 0);
        assert!(path.into_moves().is_empty());
    }

    #[test]
    fn test_blocked_goal_is_not_found() {
        let grid = Grid::from_layout("A.#").unwrap();
        let result = find_path(&grid, Coord::new(0, 0), Coord::new(0, 2));
        assert!(matches!(result, Err(NavError::PathNotFound { .. })));
    }

    #[test]
    fn test_out_of_bounds_goal_is_not_found() {
        let grid = Grid::from_layout("A..").unwrap();
        let result = find_path(&grid, Coord::new(0, 0), Coord::new(5, 5));
        assert!(matches!(result, Err(NavError::PathNotFound { .. })));
    }

    #[test]
    fn test_format_path() {
        assert_eq!(format_path(&[]), "No path");
        assert_eq!(format_path(&[Coord::new(0, 0), Coord::new(0, 1)]), "(0,0) -> (0,1)");
    }
}
