//! HTTP-backed task-order provider
//!
//! Posts the ranking request as JSON and accepts either a structured
//! `{"order": [{"row": r, "col": c}, ...]}` body or free text listing
//! coordinates such as `(1,2), (0,3)`. The call blocks with a bounded timeout.

use crate::error::{NavError, Result};
use crate::grid::Coord;
use crate::planner::{RankingProvider, RankingRequest};
use regex::Regex;
use reqwest::blocking::Client;
use serde::Deserialize;
use std::sync::OnceLock;
use std::time::Duration;
use tracing::debug;

#[derive(Debug, Deserialize)]
struct RankingResponse {
    order: Vec<Coord>,
}

pub struct HttpRankingProvider {
    client: Client,
    url: String,
    api_key: Option<String>,
}

impl HttpRankingProvider {
    pub fn new(url: impl Into<String>, timeout: Duration, api_key: Option<String>) -> Result<Self> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(HttpRankingProvider {
            client,
            url: url.into(),
            api_key,
        })
    }

    /// Build a provider whose bearer key comes from the environment variable `key_env`.
    ///
    /// A missing variable means the provider is unavailable.
    pub fn from_env(url: impl Into<String>, timeout: Duration, key_env: &str) -> Result<Self> {
        let key = std::env::var(key_env)
            .map_err(|_| NavError::Provider(format!("environment variable {} is not set", key_env)))?;
        Self::new(url, timeout, Some(key))
    }
}

impl RankingProvider for HttpRankingProvider {
    fn rank(&self, request: &RankingRequest) -> Result<Vec<Coord>> {
        let mut builder = self.client.post(&self.url).json(request);
        if let Some(key) = &self.api_key {
            builder = builder.bearer_auth(key);
        }

        let response = builder.send()?;
        let status = response.status();
        if !status.is_success() {
            return Err(NavError::Provider(format!("HTTP {}", status)));
        }
        let body = response.text()?;
        debug!(bytes = body.len(), "ranking provider responded");

        parse_response(&body)
    }
}

/// Interpret a provider reply as an ordered coordinate list
pub fn parse_response(body: &str) -> Result<Vec<Coord>> {
    if let Ok(response) = serde_json::from_str::<RankingResponse>(body) {
        return Ok(response.order);
    }
    let coords = parse_coordinate_list(body);
    if coords.is_empty() {
        return Err(NavError::Provider("no coordinates in response".to_string()));
    }
    Ok(coords)
}

/// Extract `r,c` integer pairs in order of appearance.
///
/// Parentheses and spacing are optional, so `(1,2)`, `[1, 2]` and `1,2` all parse.
/// Pairs with a number too large for a coordinate are skipped.
pub fn parse_coordinate_list(text: &str) -> Vec<Coord> {
    let Some(pattern) = coordinate_pattern() else {
        return Vec::new();
    };
    pattern
        .captures_iter(text)
        .filter_map(|caps| {
            let row = caps[1].parse::<i32>().ok()?;
            let col = caps[2].parse::<i32>().ok()?;
            Some(Coord::new(row, col))
        })
        .collect()
}

fn coordinate_pattern() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN
        .get_or_init(|| Regex::new(r"\(?\s*(\d+)\s*,\s*(\d+)\s*\)?").ok())
        .as_ref()
}
