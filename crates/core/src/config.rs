use std::env;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::EngineError;
use crate::model::RelayMode;

/// Load .env file (silently ignores if missing).
pub fn load_dotenv() {
    dotenvy::dotenv().ok();
}

fn env_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_opt(key: &str) -> Option<String> {
    env::var(key).ok().filter(|s| !s.is_empty())
}

/// Read a profiled env var: tries {PROFILE}_{KEY} first, falls back to {KEY}.
fn profiled_env_opt(profile: &str, key: &str) -> Option<String> {
    if !profile.is_empty() {
        let prefixed = format!("{}_{}", profile, key);
        if let Some(v) = env_opt(&prefixed) {
            return Some(v);
        }
    }
    env_opt(key)
}

fn profiled_env_or(profile: &str, key: &str, default: &str) -> String {
    profiled_env_opt(profile, key).unwrap_or_else(|| default.to_string())
}

fn profiled_env_u32(profile: &str, key: &str, default: u32) -> u32 {
    profiled_env_opt(profile, key)
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn profiled_env_u64(profile: &str, key: &str, default: u64) -> u64 {
    profiled_env_opt(profile, key)
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn profiled_env_f64(profile: &str, key: &str, default: f64) -> f64 {
    profiled_env_opt(profile, key)
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn profiled_env_bool(profile: &str, key: &str, default: bool) -> bool {
    match profiled_env_opt(profile, key) {
        Some(v) => matches!(v.to_lowercase().as_str(), "1" | "true" | "yes" | "on"),
        None => default,
    }
}

/// Comma-separated list, trimmed, empty items dropped.
fn profiled_env_list(profile: &str, key: &str, default: &str) -> Vec<String> {
    profiled_env_or(profile, key, default)
        .split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

// ── Top-level config ──────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Active profile name (empty = default).
    pub profile: String,
    pub postprocess: PostprocessConfig,
    pub rules: RulesConfig,
    pub webhook: WebhookConfig,
    pub relay: RelayConfig,
}

impl Config {
    /// Build config from environment variables (call `load_dotenv()` first).
    /// Profile is read from `PLATEWATCH_PROFILE` env var. When set (e.g. `PROD`),
    /// every key is first looked up as `{PROFILE}_{KEY}`, falling back to `{KEY}`.
    pub fn from_env() -> Result<Self, EngineError> {
        let profile = env_or("PLATEWATCH_PROFILE", "").to_uppercase();
        Self::for_profile(&profile)
    }

    /// Build config for a specific named profile (empty string = default).
    pub fn for_profile(profile: &str) -> Result<Self, EngineError> {
        let p = profile.to_uppercase();
        let p = p.as_str();
        Ok(Self {
            profile: p.to_string(),
            postprocess: PostprocessConfig::from_env_profiled(p),
            rules: RulesConfig::from_env_profiled(p),
            webhook: WebhookConfig::from_env_profiled(p),
            relay: RelayConfig::from_env_profiled(p)?,
        })
    }

    pub fn profile_label(&self) -> &str {
        if self.profile.is_empty() { "default" } else { &self.profile }
    }

    /// Print a summary for startup logs.
    pub fn log_summary(&self) {
        tracing::info!("Config loaded (profile: {}):", self.profile_label());
        tracing::info!(
            "  postprocess: vote_by_char={}, min_confidence={}, min_frames={}, anti_duplicate={}s, templates={}",
            self.postprocess.vote_by_char,
            self.postprocess.min_confidence,
            self.postprocess.min_frames_for_event,
            self.postprocess.anti_duplicate_seconds,
            self.postprocess.country_templates.join(","),
        );
        tracing::info!(
            "  rules:       dir={}, default_actions={}",
            self.rules.rules_dir.display(),
            self.rules.default_actions.join(","),
        );
        tracing::info!(
            "  webhook:     max_attempts={}, backoff={}s, timeout={}s, header={}, retention={}s",
            self.webhook.max_attempts,
            self.webhook.backoff_seconds,
            self.webhook.timeout_seconds,
            self.webhook.signature_header,
            self.webhook.retention_seconds,
        );
        tracing::info!(
            "  relay:       default_mode={}, debounce={}ms",
            self.relay.default_mode,
            self.relay.debounce_ms,
        );
    }
}

// ── Postprocess ───────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PostprocessConfig {
    pub vote_by_char: bool,
    pub min_confidence: f64,
    pub min_frames_for_event: u32,
    pub anti_duplicate_seconds: u64,
    /// Enabled regional templates, in evaluation order.
    pub country_templates: Vec<String>,
}

impl PostprocessConfig {
    fn from_env_profiled(p: &str) -> Self {
        Self {
            vote_by_char: profiled_env_bool(p, "POSTPROCESS_VOTE_BY_CHAR", true),
            min_confidence: profiled_env_f64(p, "POSTPROCESS_MIN_CONFIDENCE", 0.55),
            min_frames_for_event: profiled_env_u32(p, "POSTPROCESS_MIN_FRAMES_FOR_EVENT", 3),
            anti_duplicate_seconds: profiled_env_u64(p, "POSTPROCESS_ANTI_DUPLICATE_SECONDS", 5),
            country_templates: profiled_env_list(
                p,
                "POSTPROCESS_COUNTRY_TEMPLATES",
                "ru,by,kz,ua,eu",
            )
            .into_iter()
            .map(|s| s.to_lowercase())
            .collect(),
        }
    }
}

impl Default for PostprocessConfig {
    fn default() -> Self {
        Self {
            vote_by_char: true,
            min_confidence: 0.55,
            min_frames_for_event: 3,
            anti_duplicate_seconds: 5,
            country_templates: ["ru", "by", "kz", "ua", "eu"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
        }
    }
}

// ── Rules ─────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RulesConfig {
    /// Directory holding lists/rules/subscriptions/relays YAML documents.
    pub rules_dir: PathBuf,
    /// Action names applied when no rule matches.
    pub default_actions: Vec<String>,
}

impl RulesConfig {
    fn from_env_profiled(p: &str) -> Self {
        Self {
            rules_dir: PathBuf::from(profiled_env_or(p, "RULES_DIR", "config/rules")),
            default_actions: profiled_env_list(
                p,
                "RULES_DEFAULT_ACTIONS",
                "send_webhook,annotate_ui",
            ),
        }
    }
}

// ── Webhook ───────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookConfig {
    pub max_attempts: u32,
    pub backoff_seconds: u64,
    pub signature_header: String,
    pub timeout_seconds: u64,
    pub retry_interval_seconds: u64,
    /// How long terminal deliveries stay queryable before the retry tick prunes them.
    pub retention_seconds: u64,
}

impl WebhookConfig {
    fn from_env_profiled(p: &str) -> Self {
        Self {
            max_attempts: profiled_env_u32(p, "WEBHOOK_MAX_ATTEMPTS", 5).max(1),
            backoff_seconds: profiled_env_u64(p, "WEBHOOK_BACKOFF_SECONDS", 30),
            signature_header: profiled_env_or(p, "WEBHOOK_SIGNATURE_HEADER", "X-Signature"),
            timeout_seconds: profiled_env_u64(p, "WEBHOOK_TIMEOUT_SECONDS", 10),
            retry_interval_seconds: profiled_env_u64(p, "WEBHOOK_RETRY_INTERVAL_SECONDS", 5),
            retention_seconds: profiled_env_u64(p, "WEBHOOK_RETENTION_SECONDS", 86_400),
        }
    }
}

impl Default for WebhookConfig {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            backoff_seconds: 30,
            signature_header: "X-Signature".to_string(),
            timeout_seconds: 10,
            retry_interval_seconds: 5,
            retention_seconds: 86_400,
        }
    }
}

// ── Alarm relays ──────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelayConfig {
    pub default_mode: RelayMode,
    pub debounce_ms: u64,
}

impl RelayConfig {
    fn from_env_profiled(p: &str) -> Result<Self, EngineError> {
        Ok(Self {
            default_mode: profiled_env_or(p, "ALARM_RELAY_DEFAULT_MODE", "toggle").parse()?,
            debounce_ms: profiled_env_u64(p, "ALARM_RELAY_DEBOUNCE_MS", 200),
        })
    }
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            default_mode: RelayMode::Toggle,
            debounce_ms: 200,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Each test uses its own profile prefix so parallel tests never share keys.

    #[test]
    fn defaults_when_nothing_set() {
        let cfg = Config::for_profile("CFGTEST_DEFAULTS").unwrap();
        assert_eq!(cfg.profile_label(), "CFGTEST_DEFAULTS");
        assert!(cfg.postprocess.min_frames_for_event >= 1);
        assert!(cfg.webhook.max_attempts >= 1);
    }

    #[test]
    fn profiled_keys_override() {
        env::set_var("CFGTEST_OVR_WEBHOOK_MAX_ATTEMPTS", "3");
        env::set_var("CFGTEST_OVR_POSTPROCESS_COUNTRY_TEMPLATES", "EU, ru ,");
        env::set_var("CFGTEST_OVR_POSTPROCESS_VOTE_BY_CHAR", "false");
        let cfg = Config::for_profile("cfgtest_ovr").unwrap();
        assert_eq!(cfg.webhook.max_attempts, 3);
        assert_eq!(cfg.postprocess.country_templates, vec!["eu", "ru"]);
        assert!(!cfg.postprocess.vote_by_char);
        env::remove_var("CFGTEST_OVR_WEBHOOK_MAX_ATTEMPTS");
        env::remove_var("CFGTEST_OVR_POSTPROCESS_COUNTRY_TEMPLATES");
        env::remove_var("CFGTEST_OVR_POSTPROCESS_VOTE_BY_CHAR");
    }

    #[test]
    fn bad_relay_mode_is_configuration_error() {
        env::set_var("CFGTEST_BAD_ALARM_RELAY_DEFAULT_MODE", "strobe");
        let result = Config::for_profile("CFGTEST_BAD");
        env::remove_var("CFGTEST_BAD_ALARM_RELAY_DEFAULT_MODE");
        assert!(matches!(result, Err(EngineError::Configuration(_))));
    }

    #[test]
    fn empty_profile_label_is_default() {
        let cfg = Config {
            profile: String::new(),
            postprocess: PostprocessConfig::default(),
            rules: RulesConfig {
                rules_dir: PathBuf::from("x"),
                default_actions: vec![],
            },
            webhook: WebhookConfig::default(),
            relay: RelayConfig::default(),
        };
        assert_eq!(cfg.profile_label(), "default");
    }
}
