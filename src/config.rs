//! Service configuration from the environment

use crate::llm::LlmConfig;
use std::path::PathBuf;
use std::time::Duration;

const DEFAULT_PORT: u16 = 8000;
const DEFAULT_STEP_TIMEOUT: Duration = Duration::from_secs(12);
const DEFAULT_LOCK_TTL: Duration = Duration::from_secs(30);
const DEFAULT_LOCK_WAIT: Duration = Duration::from_secs(5);

/// How diagnostic steps are produced, fixed for the life of the process
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiagnosticMode {
    /// Generative backend first, fallback table on any failure
    Assisted,
    /// Fallback table only
    RulesOnly,
}

impl DiagnosticMode {
    fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "assisted" => Some(Self::Assisted),
            "rules_only" | "rules" => Some(Self::RulesOnly),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub db_path: PathBuf,
    pub port: u16,
    pub diagnostic_mode: DiagnosticMode,
    pub step_timeout: Duration,
    pub lock_ttl: Duration,
    pub lock_wait: Duration,
    /// Base URL for hand-off links; no link without it
    pub handoff_url: Option<String>,
    /// Vision endpoint; images are stored without analysis when unset
    pub image_analysis_url: Option<String>,
    pub llm: LlmConfig,
}

impl Config {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup; unparsable values fall back to defaults
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let millis = |key: &str, default: Duration| {
            lookup(key)
                .and_then(|v| v.trim().parse::<u64>().ok())
                .filter(|ms| *ms > 0)
                .map_or(default, Duration::from_millis)
        };
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let db_path = non_empty("SUPPORT_DB_PATH").map_or_else(
            || {
                let home = lookup("HOME").unwrap_or_else(|| "/tmp".to_string());
                PathBuf::from(home).join(".support-flow").join("support.db")
            },
            PathBuf::from,
        );

        let port = lookup("SUPPORT_PORT")
            .and_then(|p| p.trim().parse().ok())
            .unwrap_or(DEFAULT_PORT);

        let llm = LlmConfig::from_lookup(&lookup);

        let diagnostic_mode = match lookup("SUPPORT_DIAGNOSTIC_MODE") {
            Some(value) => DiagnosticMode::parse(&value).unwrap_or_else(|| {
                tracing::warn!(value = %value, "Unknown diagnostic mode, using rules_only");
                DiagnosticMode::RulesOnly
            }),
            None if llm.anthropic_api_key.is_some() || llm.gateway.is_some() => {
                DiagnosticMode::Assisted
            }
            None => DiagnosticMode::RulesOnly,
        };

        Self {
            db_path,
            port,
            diagnostic_mode,
            step_timeout: millis("SUPPORT_STEP_TIMEOUT_MS", DEFAULT_STEP_TIMEOUT),
            lock_ttl: millis("SUPPORT_LOCK_TTL_MS", DEFAULT_LOCK_TTL),
            lock_wait: millis("SUPPORT_LOCK_WAIT_MS", DEFAULT_LOCK_WAIT),
            handoff_url: non_empty("SUPPORT_HANDOFF_URL"),
            image_analysis_url: non_empty("SUPPORT_IMAGE_ANALYSIS_URL"),
            llm,
        }
    }
}
