//! Logging initialization for hosts
//!
//! Every host writes its logs to **stderr**: a child host's stdout is the
//! message channel to its parent and must carry nothing else.
//!
//! Filter precedence follows the usual Rust practice:
//! - `RUST_LOG` when set
//! - otherwise the filter from config or the command line
//! - otherwise `info`
//!
//! Initialization is idempotent; later calls are ignored.
//!
//! # Usage
//!
//! ```rust,ignore
//! use remoting_host::utils::{init_logging, init_host_logging};
//!
//! init_logging(None);                         // main host
//! init_host_logging("renderer-1", None);      // child host
//! ```

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::LoggingConfig;

fn resolve_filter(filter: Option<&str>, default_filter: &str) -> EnvFilter {
    if std::env::var("RUST_LOG").is_ok() {
        return EnvFilter::from_default_env();
    }
    EnvFilter::new(filter.unwrap_or(default_filter))
}

fn init_with_filter(env_filter: EnvFilter) {
    let _ = tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(true)
                .with_thread_ids(false)
                .with_ansi(std::env::var("NO_COLOR").is_err()),
        )
        .with(env_filter)
        .try_init();
}

/// Initialize logging for the main host
///
/// # Arguments
/// * `filter` - Optional log filter (e.g., "debug", "remoting_host::ipc=trace").
///              Ignored when RUST_LOG is set.
pub fn init_logging(filter: Option<&str>) {
    init_with_filter(resolve_filter(filter, "info"));
}

/// Initialize logging for a child host
///
/// The default filter keeps the substrate's message traffic visible at debug
/// for the named host: `"info,remoting_host::ipc=debug"`.
pub fn init_host_logging(host_name: &str, filter: Option<&str>) {
    let default_filter = "info,remoting_host::ipc=debug";
    init_with_filter(resolve_filter(filter, default_filter));
    tracing::debug!("Logging initialized for host {}", host_name);
}

/// Initialize logging with JSON output (for log aggregation)
#[cfg(feature = "json-logging")]
pub fn init_json_logging(filter: Option<&str>) {
    let _ = tracing_subscriber::registry()
        .with(
            fmt::layer()
                .json()
                .with_writer(std::io::stderr)
                .with_target(true)
                .with_current_span(true)
                .with_span_list(true),
        )
        .with(resolve_filter(filter, "info"))
        .try_init();
}

/// Initialize logging from [`LoggingConfig`]
///
/// `json_format` only takes effect when the `json-logging` feature is enabled.
pub fn init_logging_from_config(config: Option<&LoggingConfig>) {
    let filter = config.and_then(|c| c.filter.as_deref());

    if config.map(|c| c.json_format).unwrap_or(false) {
        #[cfg(feature = "json-logging")]
        {
            init_json_logging(filter);
        }
        #[cfg(not(feature = "json-logging"))]
        {
            init_logging(filter);
        }
    } else {
        init_logging(filter);
    }
}
