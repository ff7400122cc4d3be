#![forbid(unsafe_code)]
#![warn(missing_docs)]

//! # Conductor Log
//!
//! Subscriber bootstrap over `tracing` and `tracing-subscriber`. Library
//! crates only emit events; binaries and tests call one of the entry points
//! here once:
//!
//! ```no_run
//! let _guard = conductor_log::init().expect("logger");
//! tracing::info!("orchestrator starting");
//! ```
//!
//! Filter directives come from `CONDUCTOR_LOG` (falling back to `RUST_LOG`),
//! the output format from `CONDUCTOR_LOG_FORMAT` (`pretty`, `compact`, `json`).

pub mod builder;
pub mod config;
pub mod error;

pub use builder::{LoggerBuilder, LoggerGuard};
pub use config::{Config, DisplayConfig, Format, Writer};
pub use error::{LogError, LogResult};

/// Install a subscriber configured from the environment.
pub fn init() -> LogResult<LoggerGuard> {
    init_with(Config::from_env())
}

/// Install a subscriber from an explicit configuration.
pub fn init_with(config: Config) -> LogResult<LoggerGuard> {
    LoggerBuilder::from_config(config).build()
}

/// Install the test preset, ignoring an already-installed subscriber.
///
/// Safe to call from every test.
pub fn init_test() {
    let _ = init_with(Config::test());
}
