#![allow(dead_code)]

use std::collections::VecDeque;
use waypoint_nav::{Coord, Grid, GridSpec, MissionSettings, OrderingMode, SpeedLevel};

/// Brute-force BFS distance between two cells, None if disconnected
pub fn bfs_distance(grid: &Grid, start: Coord, goal: Coord) -> Option<usize> {
    if grid.is_blocked(start) || grid.is_blocked(goal) {
        return None;
    }
    let mut dist = vec![usize::MAX; (grid.rows * grid.cols) as usize];
    let index = |c: Coord| (c.row * grid.cols + c.col) as usize;
    let mut queue = VecDeque::new();
    dist[index(start)] = 0;
    queue.push_back(start);

    while let Some(cell) = queue.pop_front() {
        if cell == goal {
            return Some(dist[index(cell)]);
        }
        for next in cell.neighbors() {
            if grid.is_blocked(next) || dist[index(next)] != usize::MAX {
                continue;
            }
            dist[index(next)] = dist[index(cell)] + 1;
            queue.push_back(next);
        }
    }
    None
}

/// Panics unless `cells` is a valid orthogonal walk over unblocked cells
pub fn assert_valid_walk(grid: &Grid, cells: &[Coord]) {
    for cell in cells {
        assert!(!grid.is_blocked(*cell), "path enters blocked cell {}", cell);
    }
    for pair in cells.windows(2) {
        assert_eq!(pair[0].manhattan(&pair[1]), 1, "{} -> {} is not one step", pair[0], pair[1]);
    }
}

pub fn settings(mode: OrderingMode) -> MissionSettings {
    MissionSettings {
        grid: GridSpec {
            rows: 12,
            cols: 16,
            obstacle_count: 15,
            waypoint_count: 3,
            seed: 42,
        },
        mode,
        speed: SpeedLevel::Medium,
        auto_run: false,
    }
}

/// Render a path onto the grid layout for failure messages
pub fn visualize_path(grid: &Grid, cells: &[Coord]) -> String {
    let mut result = String::new();
    for (row, line) in grid.to_layout().lines().enumerate() {
        for (col, ch) in line.chars().enumerate() {
            let coord = Coord::new(row as i32, col as i32);
            if ch == '.' && cells.contains(&coord) {
                result.push('*');
            } else {
                result.push(ch);
            }
        }
        result.push('\n');
    }
    result
}
