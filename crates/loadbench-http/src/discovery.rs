//! Probe which resource routes and auxiliary endpoints an API actually serves.

use crate::client::ApiClient;
use loadbench_core::{ApiConfigFile, EndpointConfig};
use serde::Serialize;
use std::collections::BTreeMap;
use tracing::{debug, info};

/// A route belonging to a known resource.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Route {
    pub resource: String,
    pub method: String,
    pub path: String,
    pub status: Option<u16>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct Discovery {
    pub available: Vec<Route>,
    pub unavailable: Vec<Route>,
    /// Routes that exist by convention but were not probed (anything but the list GET).
    pub untested: Vec<Route>,
    /// Auxiliary paths that answered 200, 301 or 302.
    pub extra: Vec<Route>,
}

#[derive(Debug, Serialize)]
struct DiscoveryFile<'a> {
    timestamp: String,
    environment: &'a str,
    base_url: &'a str,
    available_apis: &'a [Route],
    unavailable_apis: &'a [Route],
    untested_apis: &'a [Route],
    additional_endpoints: &'a [Route],
    summary: Summary,
}

#[derive(Debug, Serialize)]
struct Summary {
    total_available: usize,
    total_unavailable: usize,
}

impl Discovery {
    pub fn to_json(&self, environment: &str, base_url: &str, timestamp: String) -> serde_json::Value {
        let file = DiscoveryFile {
            timestamp,
            environment,
            base_url,
            available_apis: &self.available,
            unavailable_apis: &self.unavailable,
            untested_apis: &self.untested,
            additional_endpoints: &self.extra,
            summary: Summary {
                total_available: self.available.len() + self.extra.len(),
                total_unavailable: self.unavailable.len(),
            },
        };
        serde_json::to_value(file).unwrap_or_default()
    }
}

/// Paths tried beyond the configured resources.
pub fn candidate_paths(api_prefix: &str) -> Vec<String> {
    let prefix = api_prefix.trim_end_matches('/');
    let mut paths = vec!["/api".to_string()];
    for resource in ["Genres", "Customers", "Rentals", "Stocks", "Users", "Roles"] {
        paths.push(format!("{prefix}/{resource}"));
    }
    paths.extend(
        ["/swagger", "/swagger/v1/swagger.json", "/api/swagger.json", "/health"]
            .into_iter()
            .map(str::to_string),
    );
    paths.push(format!("{prefix}/health"));
    paths.dedup();
    paths
}

fn route(resource: &str, method: &str, path: String) -> Route {
    Route {
        resource: resource.to_string(),
        method: method.to_string(),
        path,
        status: None,
    }
}

pub async fn discover(client: &ApiClient, endpoints: &BTreeMap<String, EndpointConfig>) -> Discovery {
    let prefix = client.env().api_prefix().to_string();
    let mut discovery = Discovery::default();

    for (resource, path) in ApiConfigFile::resource_paths(endpoints, &prefix) {
        let mut list = route(&resource, "GET", path.clone());
        match client.get(&path).await {
            Ok(response) => {
                list.status = Some(response.status.as_u16());
                if response.status.as_u16() == 200 {
                    info!("available: GET {path}");
                    discovery.available.push(list);
                } else {
                    info!("unavailable: GET {path} ({})", response.status);
                    discovery.unavailable.push(list);
                }
            }
            Err(err) => {
                info!("unavailable: GET {path} ({err})");
                discovery.unavailable.push(list);
            }
        }

        let item = format!("{path}/{{id}}");
        discovery.untested.extend([
            route(&resource, "GET", item.clone()),
            route(&resource, "POST", path.clone()),
            route(&resource, "PUT", item.clone()),
            route(&resource, "DELETE", item),
        ]);
    }

    for path in candidate_paths(&prefix) {
        match client.get(&path).await {
            Ok(response) if matches!(response.status.as_u16(), 200 | 301 | 302) => {
                info!("found: {path} ({})", response.status);
                let mut found = route("", "GET", path);
                found.status = Some(response.status.as_u16());
                discovery.extra.push(found);
            }
            Ok(response) => debug!("not found: {path} ({})", response.status),
            Err(err) => debug!("skipped {path}: {err}"),
        }
    }

    info!(
        "{} available, {} unavailable",
        discovery.available.len() + discovery.extra.len(),
        discovery.unavailable.len()
    );
    discovery
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_candidate_paths() {
        let paths = candidate_paths("/api");
        assert_eq!(paths.first().map(String::as_str), Some("/api"));
        assert!(paths.contains(&"/api/Genres".to_string()));
        assert!(paths.contains(&"/swagger/v1/swagger.json".to_string()));
        assert_eq!(paths.last().map(String::as_str), Some("/api/health"));
        assert_eq!(paths.len(), 12);
    }

    #[test]
    fn test_json_summary() {
        let discovery = Discovery {
            available: vec![route("Authors", "GET", "/api/Authors".into())],
            unavailable: vec![route("Books", "GET", "/api/Books".into())],
            untested: Vec::new(),
            extra: vec![route("", "GET", "/health".into())],
        };
        let json = discovery.to_json("local", "http://localhost:5000", "2026-01-01T00:00:00".into());
        assert_eq!(json["summary"]["total_available"], 2);
        assert_eq!(json["summary"]["total_unavailable"], 1);
        assert_eq!(json["environment"], "local");
        assert_eq!(json["available_apis"][0]["path"], "/api/Authors");
    }
}
