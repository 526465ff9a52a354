use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Map generator the server boots with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MapType {
    /// Standard procedurally generated map.
    Procedural,
    /// Procedural map without monuments.
    Barren,
    /// Custom map served from `map_url`.
    Custom,
}

impl MapType {
    /// Level name passed to `+server.level`, `None` for custom maps.
    pub fn level_name(&self) -> Option<&'static str> {
        match self {
            MapType::Procedural => Some("Procedural Map"),
            MapType::Barren => Some("Barren"),
            MapType::Custom => None,
        }
    }
}

impl fmt::Display for MapType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MapType::Procedural => write!(f, "procedural"),
            MapType::Barren => write!(f, "barren"),
            MapType::Custom => write!(f, "custom"),
        }
    }
}

impl FromStr for MapType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "procedural" | "procedural map" => Ok(MapType::Procedural),
            "barren" => Ok(MapType::Barren),
            "custom" | "custommap" => Ok(MapType::Custom),
            other => Err(Error::ConfigInvalid(format!("Unknown map type '{}'", other))),
        }
    }
}

/// Settings for one run of the manager.
///
/// Built once at startup from defaults, an optional config file and
/// environment overrides, then handed to the supervisor and never mutated.
///
/// # JSON Schema
///
/// Every key is optional; missing keys keep their defaults:
///
/// ```json
/// {
///   "identity": "myserver",
///   "hostname": "My Rust Server",
///   "port": 28015,
///   "map": "procedural",
///   "worldSize": 3500,
///   "seed": 0,
///   "maxPlayers": 100,
///   "rconPassword": "s3cret",
///   "restartDelaySecs": 15,
///   "maxFastCrashes": 5
/// }
/// ```
///
/// # Examples
///
/// ```
/// use rds_manager::config::{MapType, SupervisorConfig};
///
/// let config = SupervisorConfig::parse_from_str(r#"{ "port": 28015, "map": "barren" }"#).unwrap();
/// assert_eq!(config.port, 28015);
/// assert_eq!(config.map, MapType::Barren);
/// assert_eq!(config.restart_delay_secs, 15);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SupervisorConfig {
    /// Server identity; names the save directory under `server/`.
    pub identity: String,
    /// Name shown in the server browser.
    pub hostname: String,
    /// Game port; also used for the query and RCON ports.
    pub port: u16,
    /// Map generator.
    pub map: MapType,
    /// Map download URL, required when `map` is `custom`.
    pub map_url: String,
    /// World size in metres.
    pub world_size: u32,
    /// Map seed, `0` picks a random seed for every launch.
    pub seed: u32,
    /// Player slots.
    pub max_players: u32,
    /// Description shown in the server browser.
    pub description: String,
    /// Website URL shown in the server browser.
    pub url: String,
    /// Header image URL shown in the server browser.
    pub banner_url: String,
    /// Bind address, `0.0.0.0` for all interfaces.
    pub bind_address: String,
    /// RCON password.
    pub rcon_password: String,
    /// Serve RCON over websocket.
    pub rcon_web: bool,
    /// Seconds to wait before every restart or retry.
    pub restart_delay_secs: u64,
    /// Consecutive fast crashes after which supervision stops.
    pub max_fast_crashes: u32,
    /// Consecutive non-zero exits (any uptime) after which supervision stops.
    /// Disabled when unset.
    pub max_consecutive_failures: Option<u32>,
    /// Directory holding the server files and the downloader.
    pub install_dir: PathBuf,
}

impl Default for SupervisorConfig {
    fn default() -> Self {
        Self {
            identity: "myserver".to_string(),
            hostname: "My Rust Server".to_string(),
            port: 28015,
            map: MapType::Procedural,
            map_url: String::new(),
            world_size: 3500,
            seed: 0,
            max_players: 100,
            description: "Auto-managed Rust server".to_string(),
            url: String::new(),
            banner_url: String::new(),
            bind_address: "0.0.0.0".to_string(),
            rcon_password: "changeme".to_string(),
            rcon_web: true,
            restart_delay_secs: 15,
            max_fast_crashes: 5,
            max_consecutive_failures: None,
            install_dir: PathBuf::from("."),
        }
    }
}

impl SupervisorConfig {
    /// Loads a configuration from a file path.
    ///
    /// Files ending in `.yaml` or `.yml` are parsed as YAML, everything else
    /// as JSON.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// * The file cannot be read
    /// * The file contents are not valid JSON/YAML
    /// * A field has the wrong type
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::ConfigParse(format!("Failed to read config file: {}", e)))?;

        let is_yaml = path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("yaml") || ext.eq_ignore_ascii_case("yml"));

        if is_yaml {
            Self::parse_from_yaml_str(&content)
        } else {
            Self::parse_from_str(&content)
        }
    }

    /// Parses a configuration from a JSON string.
    ///
    /// # Errors
    ///
    /// Returns an error if the string is not valid JSON or a field has the
    /// wrong type.
    pub fn parse_from_str(content: &str) -> Result<Self> {
        serde_json::from_str(content)
            .map_err(|e| Error::ConfigParse(format!("Failed to parse JSON config: {}", e)))
    }

    /// Parses a configuration from a YAML string.
    ///
    /// # Errors
    ///
    /// Returns an error if the string is not valid YAML or a field has the
    /// wrong type.
    pub fn parse_from_yaml_str(content: &str) -> Result<Self> {
        serde_yaml::from_str(content)
            .map_err(|e| Error::ConfigParse(format!("Failed to parse YAML config: {}", e)))
    }

    /// Applies environment-style overrides on top of this configuration.
    ///
    /// Takes any iterator of key/value pairs so callers can pass
    /// `std::env::vars()` or a fixed list. Unknown keys are ignored.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ConfigInvalid`] naming the variable when a value
    /// cannot be parsed.
    pub fn with_env_overrides<I, K, V>(mut self, vars: I) -> Result<Self>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<String>,
    {
        for (key, value) in vars {
            let key = key.as_ref();
            let value: String = value.into();
            match key {
                "SERVER_IDENTITY" => self.identity = value,
                "SERVER_HOSTNAME" => self.hostname = value,
                "SERVER_PORT" => self.port = parse_var(key, &value)?,
                "SERVER_MAP" => self.map = value.parse()?,
                "SERVER_MAP_URL" => self.map_url = value,
                "SERVER_WORLDSIZE" => self.world_size = parse_var(key, &value)?,
                "SERVER_SEED" => self.seed = parse_var(key, &value)?,
                "SERVER_MAXPLAYERS" => self.max_players = parse_var(key, &value)?,
                "SERVER_DESCRIPTION" => self.description = value,
                "SERVER_URL" => self.url = value,
                "SERVER_BANNER" => self.banner_url = value,
                "SERVER_IP" => self.bind_address = value,
                "RCON_PASSWORD" => self.rcon_password = value,
                "RCON_WEB" => self.rcon_web = parse_flag(key, &value)?,
                "RESTART_DELAY" => self.restart_delay_secs = parse_var(key, &value)?,
                "MAX_FAST_CRASHES" => self.max_fast_crashes = parse_var(key, &value)?,
                "MAX_CONSECUTIVE_FAILURES" => {
                    self.max_consecutive_failures = match value.trim() {
                        "" | "0" => None,
                        other => Some(parse_var(key, other)?),
                    }
                }
                "SERVER_INSTALL_DIR" => self.install_dir = PathBuf::from(value),
                _ => {}
            }
        }
        Ok(self)
    }
}

fn parse_var<T: FromStr>(key: &str, value: &str) -> Result<T> {
    value
        .trim()
        .parse()
        .map_err(|_| Error::ConfigInvalid(format!("{} has invalid value '{}'", key, value)))
}

fn parse_flag(key: &str, value: &str) -> Result<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(Error::ConfigInvalid(format!(
            "{} has invalid value '{}'",
            key, value
        ))),
    }
}
