//! Configuration module for the server manager.
//!
//! This module handles loading, validation, and rendering of the settings for
//! one manager run. Settings come from defaults, an optional JSON or YAML file
//! and environment overrides; the [`ConfigWriter`] turns them into the
//! `server.cfg` the game server reads at startup.
//!
//! # Examples
//!
//! Loading a configuration from a file:
//!
//! ```no_run
//! use rds_manager::config::SupervisorConfig;
//!
//! let config = SupervisorConfig::from_file("manager.json").unwrap();
//! println!("Managing '{}' on port {}", config.hostname, config.port);
//! ```
//!
//! Creating a configuration programmatically:
//!
//! ```
//! use rds_manager::config::{validate_config, MapType, SupervisorConfig};
//!
//! let config = SupervisorConfig {
//!     hostname: "Weekly Wipe".to_string(),
//!     map: MapType::Barren,
//!     rcon_password: "s3cret".to_string(),
//!     ..SupervisorConfig::default()
//! };
//! validate_config(&config).unwrap();
//! ```
mod parser;
pub mod validator;
pub mod writer;

pub use parser::{MapType, SupervisorConfig};
pub use validator::validate_config;
pub use writer::ConfigWriter;
