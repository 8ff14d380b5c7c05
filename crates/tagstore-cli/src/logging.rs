//! Logging setup
//!
//! Logs go to stderr, or to `log_file` when one is configured. The filter
//! comes from `TAGSTORE_LOG` when set, otherwise from `--verbose` or the
//! configured `log_level`.

use std::fs::OpenOptions;
use std::sync::Mutex;

use tagstore_core::Config;
use tracing::debug;
use tracing_subscriber::EnvFilter;

/// Environment variable holding a full `EnvFilter` directive
const LOG_ENV: &str = "TAGSTORE_LOG";

/// Initialize the global tracing subscriber (ignored if already set)
pub fn init(config: &Config, verbose: bool) {
    let level = if verbose {
        "debug"
    } else {
        config.log_level.as_str()
    };

    let env_filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| {
        EnvFilter::new(format!("tagstore_core={0},tagstore_cli={0}", level))
    });

    if let Some(ref path) = config.log_file {
        match OpenOptions::new().create(true).append(true).open(path) {
            Ok(file) => {
                let _ = tracing_subscriber::fmt()
                    .with_env_filter(env_filter)
                    .with_target(false)
                    .with_ansi(false)
                    .with_writer(Mutex::new(file))
                    .try_init();
                debug!("Logging to {:?}", path);
                return;
            }
            Err(e) => {
                eprintln!("Warning: Could not open log file {:?}: {}", path, e);
            }
        }
    }

    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}
