//! Quick reachability check of the book-store list and detail routes.

use crate::client::ApiClient;
use serde::Serialize;
use tracing::{info, warn};

/// One GET probe and the status codes that count as working.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Probe {
    pub name: &'static str,
    pub path: String,
    pub expected: &'static [u16],
}

#[derive(Debug, Clone, Serialize)]
pub struct ProbeResult {
    pub name: String,
    pub url: String,
    pub status: Option<u16>,
    pub elapsed_secs: f64,
    pub size: usize,
    pub ok: bool,
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SmokeReport {
    pub results: Vec<ProbeResult>,
}

impl SmokeReport {
    pub fn passed(&self) -> usize {
        self.results.iter().filter(|r| r.ok).count()
    }

    pub fn total(&self) -> usize {
        self.results.len()
    }

    pub fn all_passed(&self) -> bool {
        self.passed() == self.total()
    }
}

/// Collection and detail probes for Authors and Books under the API prefix.
pub fn default_probes(api_prefix: &str) -> Vec<Probe> {
    let prefix = api_prefix.trim_end_matches('/');
    vec![
        Probe {
            name: "Get All Authors",
            path: format!("{prefix}/Authors"),
            expected: &[200],
        },
        Probe {
            name: "Get Author by ID",
            path: format!("{prefix}/Authors/1"),
            expected: &[200, 404],
        },
        Probe {
            name: "Get All Books",
            path: format!("{prefix}/Books"),
            expected: &[200],
        },
        Probe {
            name: "Get Book by ID",
            path: format!("{prefix}/Books/1"),
            expected: &[200, 404],
        },
    ]
}

pub async fn run_probes(client: &ApiClient, probes: &[Probe]) -> SmokeReport {
    let mut results = Vec::with_capacity(probes.len());
    for probe in probes {
        let url = client.url(&probe.path);
        let result = match client.get(&probe.path).await {
            Ok(response) => {
                let status = response.status.as_u16();
                let ok = probe.expected.contains(&status);
                if ok {
                    info!(
                        "{}: {} ({:.3}s, {} bytes)",
                        probe.name,
                        status,
                        response.elapsed.as_secs_f64(),
                        response.body.len()
                    );
                } else {
                    warn!("{}: unexpected status {status}, expected {:?}", probe.name, probe.expected);
                }
                ProbeResult {
                    name: probe.name.to_string(),
                    url,
                    status: Some(status),
                    elapsed_secs: response.elapsed.as_secs_f64(),
                    size: response.body.len(),
                    ok,
                    error: None,
                }
            }
            Err(err) => {
                warn!("{}: {err}", probe.name);
                ProbeResult {
                    name: probe.name.to_string(),
                    url,
                    status: None,
                    elapsed_secs: 0.0,
                    size: 0,
                    ok: false,
                    error: Some(err.to_string()),
                }
            }
        };
        results.push(result);
    }

    let report = SmokeReport { results };
    info!("{}/{} endpoints working", report.passed(), report.total());
    report
}

pub async fn smoke_test(client: &ApiClient) -> SmokeReport {
    let probes = default_probes(client.env().api_prefix());
    run_probes(client, &probes).await
}
