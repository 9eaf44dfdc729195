use crate::error::Result;
use crate::grid::{Coord, Grid};
use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::{debug, info, warn};

/// How the visitation order is chosen
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
#[value(rename_all = "lowercase")]
pub enum OrderingMode {
    /// Greedy nearest-neighbor by Manhattan distance
    #[default]
    Heuristic,
    /// Ask the ranking provider, falling back to the heuristic
    External,
    /// External when a provider is configured, heuristic otherwise
    Auto,
}

/// What an external ranking provider gets to see
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RankingRequest {
    pub rows: i32,
    pub cols: i32,
    pub obstacles: Vec<Coord>,
    pub agent: Coord,
    pub waypoints: Vec<Coord>,
}

impl RankingRequest {
    pub fn new(grid: &Grid, agent: Coord, waypoints: &[Coord]) -> Self {
        RankingRequest {
            rows: grid.rows,
            cols: grid.cols,
            obstacles: grid.obstacles(),
            agent,
            waypoints: waypoints.to_vec(),
        }
    }
}

/// A collaborator that proposes a visitation order.
///
/// Any error, or an answer that is not a permutation of the request's waypoints,
/// makes the planner fall back to the heuristic order.
pub trait RankingProvider {
    fn rank(&self, request: &RankingRequest) -> Result<Vec<Coord>>;
}

/// Greedy nearest-neighbor order from `start`; ties go to the lower input index
pub fn nearest_neighbor_order(start: Coord, waypoints: &[Coord]) -> Vec<Coord> {
    let mut remaining: Vec<Coord> = waypoints.to_vec();
    let mut order = Vec::with_capacity(remaining.len());
    let mut current = start;

    while !remaining.is_empty() {
        let nearest = remaining
            .iter()
            .enumerate()
            .min_by_key(|(i, c)| (current.manhattan(c), *i))
            .map(|(i, _)| i)
            .unwrap_or(0);
        let next = remaining.remove(nearest);
        order.push(next);
        current = next;
    }

    order
}

/// True when `candidate` holds exactly the same coordinates as `waypoints`
pub fn is_permutation(candidate: &[Coord], waypoints: &[Coord]) -> bool {
    if candidate.len() != waypoints.len() {
        return false;
    }
    let mut counts: HashMap<Coord, i32> = HashMap::new();
    for c in waypoints {
        *counts.entry(*c).or_default() += 1;
    }
    for c in candidate {
        match counts.get_mut(c) {
            Some(n) if *n > 0 => *n -= 1,
            _ => return false,
        }
    }
    true
}

/// Choose the order in which `waypoints` are visited.
///
/// Always returns a permutation of `waypoints`.
pub fn plan_order(
    grid: &Grid,
    agent: Coord,
    waypoints: &[Coord],
    mode: OrderingMode,
    provider: Option<&dyn RankingProvider>,
) -> Vec<Coord> {
    if waypoints.len() <= 1 {
        return waypoints.to_vec();
    }

    let use_provider = match mode {
        OrderingMode::Heuristic => false,
        OrderingMode::External => true,
        OrderingMode::Auto => provider.is_some(),
    };

    if use_provider {
        if let Some(order) = external_order(grid, agent, waypoints, provider) {
            info!(count = order.len(), "using provider order");
            return order;
        }
    }

    let order = nearest_neighbor_order(agent, waypoints);
    debug!(?order, "heuristic order");
    order
}

fn external_order(
    grid: &Grid,
    agent: Coord,
    waypoints: &[Coord],
    provider: Option<&dyn RankingProvider>,
) -> Option<Vec<Coord>> {
    let Some(provider) = provider else {
        warn!("no ranking provider configured, using heuristic order");
        return None;
    };

    let request = RankingRequest::new(grid, agent, waypoints);
    match provider.rank(&request) {
        Ok(order) if is_permutation(&order, waypoints) => Some(order),
        Ok(order) => {
            warn!(returned = order.len(), expected = waypoints.len(), "provider order is not a permutation, using heuristic order");
            None
        }
        Err(e) => {
            warn!(error = %e, "ranking provider failed, using heuristic order");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::NavError;

    struct Fixed(Vec<Coord>);

    impl RankingProvider for Fixed {
        fn rank(&self, _request: &RankingRequest) -> Result<Vec<Coord>> {
            Ok(self.0.clone())
        }
    }

    struct Failing;

    impl RankingProvider for Failing {
        fn rank(&self, _request: &RankingRequest) -> Result<Vec<Coord>> {
            Err(NavError::Provider("timed out".to_string()))
        }
    }

    fn open_grid() -> Grid {
        Grid::from_layout(
            "A...W
             .....
             .....
             .....
             ....W",
        )
        .unwrap()
    }

    #[test]
    fn test_nearest_first() {
        let order = nearest_neighbor_order(Coord::new(0, 0), &[Coord::new(4, 4), Coord::new(0, 4)]);
        assert_eq!(order, vec![Coord::new(0, 4), Coord::new(4, 4)]);
    }

    #[test]
    fn test_ties_keep_input_order() {
        let a = Coord::new(0, 2);
        let b = Coord::new(2, 0);
        assert_eq!(nearest_neighbor_order(Coord::new(0, 0), &[a, b]), vec![a, b]);
        assert_eq!(nearest_neighbor_order(Coord::new(0, 0), &[b, a]), vec![b, a]);
    }

    #[test]
    fn test_is_permutation() {
        let w = [Coord::new(0, 1), Coord::new(2, 2)];
        assert!(is_permutation(&[Coord::new(2, 2), Coord::new(0, 1)], &w));
        assert!(!is_permutation(&[Coord::new(2, 2)], &w));
        assert!(!is_permutation(&[Coord::new(2, 2), Coord::new(2, 2)], &w));
        assert!(!is_permutation(&[Coord::new(2, 2), Coord::new(1, 1)], &w));
    }

    #[test]
    fn test_external_order_used_when_valid() {
        let grid = open_grid();
        let waypoints = grid.waypoints().to_vec();
        let reversed: Vec<Coord> = nearest_neighbor_order(grid.agent(), &waypoints).into_iter().rev().collect();
        let provider = Fixed(reversed.clone());
        let order = plan_order(&grid, grid.agent(), &waypoints, OrderingMode::External, Some(&provider));
        assert_eq!(order, reversed);
    }

    #[test]
    fn test_failing_provider_falls_back() {
        let grid = open_grid();
        let waypoints = grid.waypoints().to_vec();
        let heuristic = nearest_neighbor_order(grid.agent(), &waypoints);
        let order = plan_order(&grid, grid.agent(), &waypoints, OrderingMode::External, Some(&Failing));
        assert_eq!(order, heuristic);
    }

    #[test]
    fn test_missing_provider_falls_back() {
        let grid = open_grid();
        let waypoints = grid.waypoints().to_vec();
        let heuristic = nearest_neighbor_order(grid.agent(), &waypoints);
        assert_eq!(plan_order(&grid, grid.agent(), &waypoints, OrderingMode::External, None), heuristic);
        assert_eq!(plan_order(&grid, grid.agent(), &waypoints, OrderingMode::Auto, None), heuristic);
    }

    #[test]
    fn test_heuristic_mode_ignores_provider() {
        let grid = open_grid();
        let waypoints = grid.waypoints().to_vec();
        let reversed: Vec<Coord> = nearest_neighbor_order(grid.agent(), &waypoints).into_iter().rev().collect();
        let provider = Fixed(reversed);
        let order = plan_order(&grid, grid.agent(), &waypoints, OrderingMode::Heuristic, Some(&provider));
        assert_eq!(order, nearest_neighbor_order(grid.agent(), &waypoints));
    }

    #[test]
    fn test_trivial_inputs() {
        let grid = open_grid();
        assert!(plan_order(&grid, grid.agent(), &[], OrderingMode::External, Some(&Failing)).is_empty());
        let single = [Coord::new(4, 4)];
        assert_eq!(plan_order(&grid, grid.agent(), &single, OrderingMode::External, Some(&Failing)), single.to_vec());
    }
}
