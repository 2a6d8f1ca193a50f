//! Harness configuration.
//!
//! Every target the harness touches is described here instead of being baked
//! into the phases, so tests can point phases at fake servers and operators can
//! point a run at a different Target Server via `wireprobe.toml` or CLI flags.

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Deserializer};
use std::fmt;
use std::fs;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

/// Default config file looked up in the working directory.
pub const DEFAULT_CONFIG_FILE: &str = "wireprobe.toml";

/// Default values mirroring the reference client run.
pub mod defaults {
    use std::time::Duration;

    pub const HOST: &str = "localhost";
    pub const BASIC_PORT: u16 = 3306;
    pub const SWEEP_PORT: u16 = 3307;
    pub const DATABASE: &str = "test";
    pub const USER: &str = "root";

    pub const MAX_OPEN_CONNECTIONS: usize = 10;
    pub const MAX_IDLE_CONNECTIONS: usize = 5;
    pub const MAX_CONNECTION_LIFETIME: Duration = Duration::from_secs(60 * 60);

    pub const POOL_TASKS: usize = 5;
}

/// Host and port of a Target Server instance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    pub host: String,
    pub port: u16,
}

impl Endpoint {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

impl FromStr for Endpoint {
    type Err = anyhow::Error;

    /// Parse `host:port`. IPv6 literals go in brackets: `[::1]:3306`.
    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        let Some((host, port)) = s.rsplit_once(':') else {
            bail!("Invalid endpoint '{}': expected host:port", s);
        };
        let host = host.trim_start_matches('[').trim_end_matches(']');
        if host.is_empty() {
            bail!("Invalid endpoint '{}': host is empty", s);
        }
        let port: u16 = port
            .parse()
            .with_context(|| format!("Invalid endpoint '{}': bad port '{}'", s, port))?;
        Ok(Self::new(host, port))
    }
}

impl<'de> Deserialize<'de> for Endpoint {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

/// Username/password pair.
#[derive(Deserialize, Clone, PartialEq, Eq)]
pub struct Credential {
    pub username: String,
    #[serde(default)]
    pub password: String,
}

impl Credential {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }
}

/// Never prints the password.
impl fmt::Display for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.password.is_empty() {
            write!(f, "{}", self.username)
        } else {
            write!(f, "{}:****", self.username)
        }
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("username", &self.username)
            .field("password", &"****")
            .finish()
    }
}

/// One server to connect to: where, which schema, and as whom.
#[derive(Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Target {
    pub endpoint: Endpoint,
    #[serde(default = "default_database")]
    pub database: Option<String>,
    #[serde(default = "default_credential")]
    pub credential: Credential,
}

impl Target {
    /// `user@host:port/db`, password masked.
    pub fn display(&self) -> String {
        match &self.database {
            Some(db) => format!("{}@{}/{}", self.credential, self.endpoint, db),
            None => format!("{}@{}", self.credential, self.endpoint),
        }
    }
}

fn default_database() -> Option<String> {
    Some(defaults::DATABASE.to_string())
}

fn default_credential() -> Credential {
    Credential::new(defaults::USER, "")
}

/// Tuning applied to the shared pool before the stress tasks start.
///
/// `max_idle_connections <= max_open_connections` is expected but not checked
/// here; what happens otherwise is up to the client library.
#[derive(Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct PoolConfig {
    pub max_open_connections: usize,
    pub max_idle_connections: usize,
    #[serde(deserialize_with = "deserialize_duration")]
    pub max_connection_lifetime: Duration,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_open_connections: defaults::MAX_OPEN_CONNECTIONS,
            max_idle_connections: defaults::MAX_IDLE_CONNECTIONS,
            max_connection_lifetime: defaults::MAX_CONNECTION_LIFETIME,
        }
    }
}

/// `[basic]` section.
#[derive(Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct BasicPhaseConfig {
    #[serde(flatten)]
    pub target: Target,
}

impl Default for BasicPhaseConfig {
    fn default() -> Self {
        Self {
            target: Target {
                endpoint: Endpoint::new(defaults::HOST, defaults::BASIC_PORT),
                database: default_database(),
                credential: default_credential(),
            },
        }
    }
}

/// `[credentials]` section.
#[derive(Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct CredentialSweepConfig {
    pub endpoint: Endpoint,
    #[serde(default = "default_database")]
    pub database: Option<String>,
    /// Probed in order; order only affects report order.
    #[serde(default = "default_sweep_users")]
    pub users: Vec<Credential>,
}

fn default_sweep_users() -> Vec<Credential> {
    vec![
        Credential::new("root", ""),
        Credential::new("test", "test"),
        Credential::new("admin", "admin123"),
    ]
}

impl Default for CredentialSweepConfig {
    fn default() -> Self {
        Self {
            endpoint: Endpoint::new(defaults::HOST, defaults::SWEEP_PORT),
            database: default_database(),
            users: default_sweep_users(),
        }
    }
}

/// `[pool]` section.
#[derive(Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct PoolStressConfig {
    #[serde(flatten)]
    pub target: Target,
    #[serde(flatten)]
    pub limits: PoolConfig,
    /// Number of concurrent query tasks.
    #[serde(default = "default_tasks")]
    pub tasks: usize,
    /// Bounded wait for the tasks. `None` waits forever.
    #[serde(default, deserialize_with = "deserialize_opt_duration")]
    pub task_timeout: Option<Duration>,
}

fn default_tasks() -> usize {
    defaults::POOL_TASKS
}

impl Default for PoolStressConfig {
    fn default() -> Self {
        Self {
            target: Target {
                endpoint: Endpoint::new(defaults::HOST, defaults::SWEEP_PORT),
                database: default_database(),
                credential: default_credential(),
            },
            limits: PoolConfig::default(),
            tasks: defaults::POOL_TASKS,
            task_timeout: None,
        }
    }
}

/// Everything a harness run needs, loaded from wireprobe.toml.
#[derive(Deserialize, Default, Debug, Clone, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct HarnessConfig {
    pub basic: BasicPhaseConfig,
    pub credentials: CredentialSweepConfig,
    pub pool: PoolStressConfig,
}

impl HarnessConfig {
    /// Load from an explicit path (must exist), or from ./wireprobe.toml when
    /// present, or fall back to defaults.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let config_path = match path {
            Some(p) => {
                if !p.exists() {
                    bail!("Config file not found: {}", p.display());
                }
                p
            }
            None => {
                let default_path = Path::new(DEFAULT_CONFIG_FILE);
                if default_path.exists() {
                    default_path
                } else {
                    return Ok(HarnessConfig::default());
                }
            }
        };

        let contents = fs::read_to_string(config_path)
            .with_context(|| format!("Failed to read {}", config_path.display()))?;
        Self::parse(&contents)
            .map_err(|e| anyhow::anyhow!("Failed to parse {}: {}", config_path.display(), e))
    }

    pub fn parse(contents: &str) -> Result<Self> {
        let config: HarnessConfig = toml::from_str(contents)?;
        Ok(config)
    }
}

fn deserialize_duration<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> std::result::Result<Duration, D::Error> {
    let raw = String::deserialize(deserializer)?;
    parse_duration(&raw).map_err(serde::de::Error::custom)
}

fn deserialize_opt_duration<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> std::result::Result<Option<Duration>, D::Error> {
    let raw = Option::<String>::deserialize(deserializer)?;
    raw.map(|s| parse_duration(&s))
        .transpose()
        .map_err(serde::de::Error::custom)
}

/// Parse a duration string like "500ms", "30s", "5m", "1h".
/// A bare number is read as seconds.
pub fn parse_duration(s: &str) -> Result<Duration> {
    let s = s.trim();
    if s.is_empty() {
        bail!("Empty duration string");
    }

    let (num_part, unit) = if let Some(stripped) = s.strip_suffix("ms") {
        (stripped, "ms")
    } else if let Some(stripped) = s.strip_suffix('s') {
        (stripped, "s")
    } else if let Some(stripped) = s.strip_suffix('m') {
        (stripped, "m")
    } else if let Some(stripped) = s.strip_suffix('h') {
        (stripped, "h")
    } else {
        (s, "s")
    };

    let num: u64 = num_part
        .trim()
        .parse()
        .with_context(|| format!("Invalid duration number: '{}'", num_part))?;

    let secs_per_unit = match unit {
        "ms" => return Ok(Duration::from_millis(num)),
        "s" => 1,
        "m" => 60,
        "h" => 60 * 60,
        _ => bail!("Unknown duration unit: '{}'", unit),
    };

    match num.checked_mul(secs_per_unit) {
        Some(secs) => Ok(Duration::from_secs(secs)),
        None => bail!("Duration out of range: '{}'", s),
    }
}

/// Human form used when echoing pool settings.
pub fn format_duration(d: Duration) -> String {
    let secs = d.as_secs();
    if d.subsec_millis() != 0 || secs == 0 {
        format!("{}ms", d.as_millis())
    } else if secs % 3600 == 0 {
        format!("{}h", secs / 3600)
    } else if secs % 60 == 0 {
        format!("{}m", secs / 60)
    } else {
        format!("{}s", secs)
    }
}
