/// Error handling module for the server manager.
///
/// This module defines the error types used throughout the library.
/// Cycle-level failures (install, config write, launch) are recoverable and
/// make the supervisor retry after its restart delay; crash-loop exhaustion is
/// the only error that ends supervision.
///
/// # Example
///
/// ```
/// use rds_manager::error::{Error, Result};
///
/// fn handle_error(result: Result<()>) {
///     match result {
///         Ok(_) => println!("Operation succeeded"),
///         Err(Error::Install(msg)) => println!("Install failed: {}", msg),
///         Err(Error::CrashLoop { crashes }) => println!("Gave up after {} crashes", crashes),
///         Err(e) if e.is_recoverable() => println!("Will retry: {}", e),
///         Err(e) => println!("Fatal: {}", e),
///     }
/// }
/// ```
use thiserror::Error;

/// Errors that can occur in the rds-manager library.
///
/// Each variant includes context information so an operator can tell which
/// phase failed and why without reading the source.
#[derive(Error, Debug)]
pub enum Error {
    /// Failed to read or parse a configuration file.
    ///
    /// This error occurs when:
    /// - The configuration file cannot be read
    /// - The JSON or YAML is malformed
    /// - Field types are incorrect
    #[error("Failed to parse configuration: {0}")]
    ConfigParse(String),

    /// Configuration parsed but contains invalid values.
    ///
    /// This error occurs when:
    /// - A numeric field is out of range (port 0, max players 0)
    /// - An environment override cannot be parsed
    /// - A custom map is selected without a map URL
    #[error("Invalid configuration: {0}")]
    ConfigInvalid(String),

    /// Failed to render or write the server.cfg consumed by the server.
    #[error("Failed to write server config: {0}")]
    ConfigWrite(String),

    /// Failed to install or update the downloader or the server files.
    ///
    /// This error occurs when:
    /// - The release API or the download cannot be reached
    /// - The release does not contain the expected asset
    /// - The archive cannot be extracted
    /// - DepotDownloader exits with a non-zero status
    /// - The server executable is missing after the update
    #[error("Install failed: {0}")]
    Install(String),

    /// Failed to start the server process.
    ///
    /// This error occurs when:
    /// - The executable does not exist
    /// - The executable is not permitted to run
    #[error("Failed to launch server: {0}")]
    Launch(String),

    /// Error while waiting on or signalling a running server process.
    #[error("Server process error: {0}")]
    Process(String),

    /// The host operating system has no known server build.
    #[error("Unsupported platform: {0}")]
    UnsupportedPlatform(String),

    /// The server crashed shortly after launch too many times in a row.
    #[error("Server stopped: too many consecutive crashes ({crashes} fast crashes in a row)")]
    CrashLoop {
        /// Number of consecutive fast crashes observed.
        crashes: u32,
    },

    /// The server exited with a failure status too many times in a row.
    #[error("Server stopped: exited with a failure status {failures} times in a row")]
    TooManyFailures {
        /// Number of consecutive non-zero exits observed.
        failures: u32,
    },

    /// Any other error not covered by the above categories.
    #[error("Other error: {0}")]
    Other(String),
}

impl Error {
    /// Whether the supervisor should retry the cycle after its restart delay.
    ///
    /// Install, config-write, launch and process errors never count toward
    /// crash-loop protection.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Error::ConfigWrite(_) | Error::Install(_) | Error::Launch(_) | Error::Process(_)
        )
    }
}

/// Result type for rds-manager operations.
pub type Result<T> = std::result::Result<T, Error>;
