use crate::errors::{HarnessError, Result};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

/// Process-level defaults, loaded from the environment.
#[derive(Debug, Deserialize)]
pub struct Config {
    /// Default simulated user count. LOADLINK_USERS, default 1.
    pub default_users: u32,
    /// Default users spawned per second. LOADLINK_SPAWN_RATE, default 1.
    pub default_spawn_rate: u32,
    /// Default run-time budget, e.g. "60s". LOADLINK_RUN_TIME.
    pub default_run_time: String,
    /// Per-request timeout in seconds. LOADLINK_REQUEST_TIMEOUT, default 30.
    pub request_timeout_secs: u64,
    /// Directory for JSONL exports. LOADLINK_RESULTS_DIR, default "results".
    pub results_dir: String,
}

pub fn load() -> anyhow::Result<Config> {
    dotenvy::dotenv().ok();

    Ok(Config {
        default_users: std::env::var("LOADLINK_USERS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(1),
        default_spawn_rate: std::env::var("LOADLINK_SPAWN_RATE")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(1),
        default_run_time: std::env::var("LOADLINK_RUN_TIME").unwrap_or_else(|_| "60s".into()),
        request_timeout_secs: std::env::var("LOADLINK_REQUEST_TIMEOUT")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(30),
        results_dir: std::env::var("LOADLINK_RESULTS_DIR").unwrap_or_else(|_| "results".into()),
    })
}

/// One candidate backend from the run plan's discovery list.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct EndpointCandidate {
    pub address: String,
    #[serde(default = "default_region")]
    pub region: String,
}

fn default_region() -> String {
    "default".into()
}

/// A YAML run plan: the prompts to send and the backend(s) to send them to.
///
/// Either `endpoint` (one fixed target) or `endpoints` (a candidate pool for
/// adaptive routing) must be present; both may be.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RunPlan {
    #[serde(default)]
    pub endpoint: Option<String>,
    #[serde(default)]
    pub endpoints: Vec<EndpointCandidate>,
    #[serde(default)]
    pub host: Option<String>,
    #[serde(default)]
    pub prompts: Vec<String>,
}

impl RunPlan {
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let plan: RunPlan = serde_yaml::from_str(yaml)
            .map_err(|e| HarnessError::Config(format!("invalid run plan: {e}")))?;
        plan.validate()?;
        Ok(plan)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let yaml = std::fs::read_to_string(path)?;
        Self::from_yaml(&yaml)
    }

    fn validate(&self) -> Result<()> {
        if self.endpoint.is_none() && self.endpoints.is_empty() {
            return Err(HarnessError::Config(
                "run plan needs an `endpoint` or a non-empty `endpoints` list".into(),
            ));
        }
        if self.prompts.is_empty() {
            return Err(HarnessError::Config("run plan has no prompts".into()));
        }
        Ok(())
    }

    /// All candidate backends, the fixed endpoint first.
    pub fn targets(&self) -> Vec<EndpointCandidate> {
        let mut targets = Vec::new();
        if let Some(endpoint) = &self.endpoint {
            targets.push(EndpointCandidate {
                address: endpoint.clone(),
                region: default_region(),
            });
        }
        targets.extend(self.endpoints.iter().cloned());
        targets
    }

    /// The endpoint recorded in the experiment config snapshot.
    pub fn primary_endpoint(&self) -> String {
        self.endpoint
            .clone()
            .or_else(|| self.endpoints.first().map(|c| c.address.clone()))
            .unwrap_or_default()
    }

    /// The host recorded in the config snapshot, derived from the primary
    /// endpoint when the plan does not set one.
    pub fn host(&self) -> String {
        self.host
            .clone()
            .or_else(|| derive_host(&self.primary_endpoint()))
            .unwrap_or_default()
    }
}

/// `scheme://host[:port]` of an endpoint URL, e.g.
/// `http://10.0.0.1:8080/generate-response` → `http://10.0.0.1:8080`.
/// Scheme-default ports are normalized away.
pub fn derive_host(endpoint: &str) -> Option<String> {
    let parsed = url::Url::parse(endpoint).ok()?;
    let authority = parsed.host_str()?;
    Some(match parsed.port() {
        Some(port) => format!("{}://{}:{}", parsed.scheme(), authority, port),
        None => format!("{}://{}", parsed.scheme(), authority),
    })
}

/// Parse a run-time budget: plain seconds ("90") or suffixed ("90s", "5m",
/// "1h").
pub fn parse_run_time(value: &str) -> Result<Duration> {
    let value = value.trim();
    let (digits, multiplier) = match value.as_bytes().last() {
        Some(b's') => (&value[..value.len() - 1], 1),
        Some(b'm') => (&value[..value.len() - 1], 60),
        Some(b'h') => (&value[..value.len() - 1], 3600),
        _ => (value, 1),
    };
    let seconds: u64 = digits
        .parse()
        .map_err(|_| HarnessError::Config(format!("invalid run time {value:?}")))?;
    Ok(Duration::from_secs(seconds * multiplier))
}

// ── Tests ───────────────────────────────────────────────────────
