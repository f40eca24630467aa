//! Configuration loading and parsing.
//!
//! Defines the server config schema and resolves defaults. Every field is
//! optional; a missing config file means all defaults.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::Deserialize;

use playqueue_core::PlaybackPolicy;
use playqueue_core::ServiceOptions;

pub const DEFAULT_BIND: &str = "0.0.0.0:3000";
const DEFAULT_SWEEP_INTERVAL_SECS: u64 = 300;
const DEFAULT_RESOLVER_PROGRAM: &str = "yt-dlp";
const DEFAULT_PLAYER_PROGRAM: &str = "ffplay";
const DEFAULT_PLAYER_ARGS: &[&str] = &["-nodisp", "-autoexit", "-loglevel", "error", "-"];
pub const DEFAULT_USER_AGENTS: &[&str] = &[
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36",
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:120.0) Gecko/20100101 Firefox/120.0",
];

/// Top-level server configuration loaded from TOML.
#[derive(Debug, Default, Deserialize)]
pub struct ServerConfig {
    /// Bind address (host:port).
    pub bind: Option<String>,
    /// Browser origins allowed to call the API.
    pub cors_origins: Option<Vec<String>>,
    pub playback: Option<PlaybackConfig>,
    pub sessions: Option<SessionsConfig>,
    pub resolver: Option<ResolverConfig>,
    pub transport: Option<TransportConfig>,
}

/// Retry and pacing knobs.
#[derive(Debug, Default, Deserialize)]
pub struct PlaybackConfig {
    /// Wait before retry n, in seconds; the last entry repeats.
    pub backoff_secs: Option<Vec<u64>>,
    pub max_retries: Option<u32>,
    pub acquire_timeout_secs: Option<u64>,
    pub generic_failure_delay_ms: Option<u64>,
    pub final_failure_delay_ms: Option<u64>,
    pub advance_delay_ms: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
pub struct SessionsConfig {
    /// How often sessions with a dead transport are reaped.
    pub sweep_interval_secs: Option<u64>,
    /// Session ids allowed to play. Empty or missing allows every session.
    pub allowed: Option<Vec<String>>,
}

/// `yt-dlp` resolver/acquirer settings.
#[derive(Debug, Default, Deserialize)]
pub struct ResolverConfig {
    pub program: Option<String>,
    /// Hosts whose links skip search.
    pub direct_hosts: Option<Vec<String>>,
    pub search_retries: Option<u32>,
    pub user_agents: Option<Vec<String>>,
    /// Extra arguments passed on every invocation.
    pub extra_args: Option<Vec<String>>,
}

/// Player process settings.
#[derive(Debug, Default, Deserialize)]
pub struct TransportConfig {
    pub program: Option<String>,
    pub args: Option<Vec<String>>,
}

/// Resolved `yt-dlp` invocation settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolverSettings {
    pub program: String,
    pub user_agents: Vec<String>,
    pub extra_args: Vec<String>,
}

/// Resolved player invocation settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlayerSettings {
    pub program: String,
    pub args: Vec<String>,
}

impl ServerConfig {
    /// Load configuration from disk.
    pub fn load(path: &Path) -> Result<Self> {
        let raw =
            std::fs::read_to_string(path).with_context(|| format!("read config {:?}", path))?;
        Self::parse(&raw).with_context(|| format!("parse config {:?}", path))
    }

    pub fn parse(raw: &str) -> Result<Self> {
        Ok(toml::from_str::<ServerConfig>(raw)?)
    }
}

/// Load the explicit config, else `config.toml` next to the executable,
/// else defaults.
pub fn load_config(path: Option<&PathBuf>) -> Result<ServerConfig> {
    if let Some(path) = path {
        return ServerConfig::load(path);
    }
    let auto_path = std::env::current_exe()
        .ok()
        .and_then(|path| path.parent().map(|dir| dir.join("config.toml")));
    match auto_path {
        Some(path) if path.exists() => {
            tracing::info!(path = %path.display(), "using config next to executable");
            ServerConfig::load(&path)
        }
        _ => {
            tracing::info!("no config file found; using defaults");
            Ok(ServerConfig::default())
        }
    }
}

/// Parse an optional bind address from config.
pub fn bind_from_config(cfg: &ServerConfig) -> Result<Option<SocketAddr>> {
    let Some(bind) = cfg.bind.as_deref() else {
        return Ok(None);
    };
    let addr = bind.parse().with_context(|| format!("parse bind {bind}"))?;
    Ok(Some(addr))
}

/// Resolve the final bind address from args + config.
pub fn resolve_bind(bind: Option<SocketAddr>, cfg: &ServerConfig) -> Result<SocketAddr> {
    if let Some(addr) = bind {
        return Ok(addr);
    }
    match bind_from_config(cfg)? {
        Some(addr) => Ok(addr),
        None => DEFAULT_BIND
            .parse()
            .with_context(|| format!("parse default bind {DEFAULT_BIND}")),
    }
}

/// Build the controller policy from the `[playback]` table.
pub fn playback_policy_from_config(cfg: &ServerConfig) -> Result<PlaybackPolicy> {
    let mut policy = PlaybackPolicy::default();
    let Some(playback) = cfg.playback.as_ref() else {
        return Ok(policy);
    };
    if let Some(backoff) = playback.backoff_secs.as_ref() {
        policy.backoff = backoff.iter().map(|s| Duration::from_secs(*s)).collect();
    }
    if let Some(max_retries) = playback.max_retries {
        policy.max_retries = max_retries;
    }
    if let Some(secs) = playback.acquire_timeout_secs {
        if secs == 0 {
            return Err(anyhow::anyhow!("playback.acquire_timeout_secs must be > 0"));
        }
        policy.acquire_timeout = Duration::from_secs(secs);
    }
    if let Some(ms) = playback.generic_failure_delay_ms {
        policy.generic_failure_delay = Duration::from_millis(ms);
    }
    if let Some(ms) = playback.final_failure_delay_ms {
        policy.final_failure_delay = Duration::from_millis(ms);
    }
    if let Some(ms) = playback.advance_delay_ms {
        policy.advance_delay = Duration::from_millis(ms);
    }
    Ok(policy)
}

pub fn sweep_interval_from_config(cfg: &ServerConfig) -> Duration {
    let secs = cfg
        .sessions
        .as_ref()
        .and_then(|s| s.sweep_interval_secs)
        .unwrap_or(DEFAULT_SWEEP_INTERVAL_SECS)
        .max(1);
    Duration::from_secs(secs)
}

/// Front-end options: allow-list, direct hosts and search retries.
pub fn service_options_from_config(cfg: &ServerConfig) -> ServiceOptions {
    let mut options = ServiceOptions::default();
    if let Some(allowed) = cfg.sessions.as_ref().and_then(|s| s.allowed.as_ref()) {
        options.allowed_sessions = non_empty_trimmed(allowed);
    }
    if let Some(resolver) = cfg.resolver.as_ref() {
        if let Some(hosts) = resolver.direct_hosts.as_ref() {
            options.direct_hosts = non_empty_trimmed(hosts);
        }
        if let Some(retries) = resolver.search_retries {
            options.search_retries = retries;
        }
    }
    options
}

pub fn resolver_settings_from_config(cfg: &ServerConfig) -> ResolverSettings {
    let resolver = cfg.resolver.as_ref();
    let program = resolver
        .and_then(|r| r.program.as_deref())
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .unwrap_or(DEFAULT_RESOLVER_PROGRAM)
        .to_string();
    let user_agents = resolver
        .and_then(|r| r.user_agents.as_ref())
        .map(|agents| non_empty_trimmed(agents))
        .filter(|agents| !agents.is_empty())
        .unwrap_or_else(|| DEFAULT_USER_AGENTS.iter().map(|a| a.to_string()).collect());
    let extra_args = resolver
        .and_then(|r| r.extra_args.clone())
        .unwrap_or_default();
    ResolverSettings {
        program,
        user_agents,
        extra_args,
    }
}

pub fn player_settings_from_config(cfg: &ServerConfig) -> PlayerSettings {
    let transport = cfg.transport.as_ref();
    let program = transport
        .and_then(|t| t.program.as_deref())
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .unwrap_or(DEFAULT_PLAYER_PROGRAM)
        .to_string();
    let args = transport
        .and_then(|t| t.args.clone())
        .unwrap_or_else(|| DEFAULT_PLAYER_ARGS.iter().map(|a| a.to_string()).collect());
    PlayerSettings { program, args }
}

pub fn cors_origins_from_config(cfg: &ServerConfig) -> Vec<String> {
    cfg.cors_origins
        .as_ref()
        .map(|origins| non_empty_trimmed(origins))
        .unwrap_or_default()
}

fn non_empty_trimmed(values: &[String]) -> Vec<String> {
    values
        .iter()
        .map(|v| v.trim())
        .filter(|v| !v.is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_config_uses_defaults() {
        let cfg = ServerConfig::parse("").unwrap();
        assert_eq!(
            resolve_bind(None, &cfg).unwrap(),
            "0.0.0.0:3000".parse::<SocketAddr>().unwrap()
        );
        assert_eq!(playback_policy_from_config(&cfg).unwrap(), PlaybackPolicy::default());
        assert_eq!(sweep_interval_from_config(&cfg), Duration::from_secs(300));
        assert_eq!(service_options_from_config(&cfg), ServiceOptions::default());
        assert_eq!(resolver_settings_from_config(&cfg).program, "yt-dlp");
        assert_eq!(resolver_settings_from_config(&cfg).user_agents.len(), 4);
        assert_eq!(player_settings_from_config(&cfg).program, "ffplay");
    }

    #[test]
    fn cli_bind_wins_over_config() {
        let cfg = ServerConfig::parse("bind = \"127.0.0.1:9000\"").unwrap();
        let cli: SocketAddr = "127.0.0.1:7000".parse().unwrap();
        assert_eq!(resolve_bind(Some(cli), &cfg).unwrap(), cli);
        assert_eq!(
            resolve_bind(None, &cfg).unwrap(),
            "127.0.0.1:9000".parse::<SocketAddr>().unwrap()
        );
    }

    #[test]
    fn invalid_bind_is_rejected() {
        let cfg = ServerConfig::parse("bind = \"not an address\"").unwrap();
        assert!(resolve_bind(None, &cfg).is_err());
    }

    #[test]
    fn playback_table_overrides_policy() {
        let cfg = ServerConfig::parse(
            r#"
            [playback]
            backoff_secs = [1, 2]
            max_retries = 2
            acquire_timeout_secs = 10
            generic_failure_delay_ms = 0
            advance_delay_ms = 250
            "#,
        )
        .unwrap();
        let policy = playback_policy_from_config(&cfg).unwrap();
        assert_eq!(policy.backoff, vec![Duration::from_secs(1), Duration::from_secs(2)]);
        assert_eq!(policy.max_retries, 2);
        assert_eq!(policy.acquire_timeout, Duration::from_secs(10));
        assert_eq!(policy.generic_failure_delay, Duration::ZERO);
        assert_eq!(policy.final_failure_delay, Duration::from_secs(5));
        assert_eq!(policy.advance_delay, Duration::from_millis(250));
    }

    #[test]
    fn zero_acquire_timeout_is_rejected() {
        let cfg = ServerConfig::parse("[playback]\nacquire_timeout_secs = 0").unwrap();
        assert!(playback_policy_from_config(&cfg).is_err());
    }

    #[test]
    fn sessions_and_resolver_tables_feed_service_options() {
        let cfg = ServerConfig::parse(
            r#"
            [sessions]
            sweep_interval_secs = 0
            allowed = ["guild-1", "  ", " guild-2 "]

            [resolver]
            direct_hosts = ["example.com"]
            search_retries = 0
            user_agents = []
            "#,
        )
        .unwrap();
        let options = service_options_from_config(&cfg);
        assert_eq!(options.allowed_sessions, vec!["guild-1", "guild-2"]);
        assert_eq!(options.direct_hosts, vec!["example.com"]);
        assert_eq!(options.search_retries, 0);
        assert_eq!(sweep_interval_from_config(&cfg), Duration::from_secs(1));
        // An empty agent list falls back to the built-in rotation.
        assert_eq!(resolver_settings_from_config(&cfg).user_agents.len(), 4);
    }

    #[test]
    fn transport_table_overrides_player() {
        let cfg = ServerConfig::parse(
            r#"
            [transport]
            program = "mpv"
            args = ["--no-video", "-"]
            "#,
        )
        .unwrap();
        let settings = player_settings_from_config(&cfg);
        assert_eq!(settings.program, "mpv");
        assert_eq!(settings.args, vec!["--no-video", "-"]);
    }

    #[test]
    fn unknown_value_types_fail_to_parse() {
        assert!(ServerConfig::parse("[playback]\nmax_retries = \"many\"").is_err());
    }
}
