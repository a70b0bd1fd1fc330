//! Utility modules shared by the substrate and the host binary

pub mod error;
pub mod lock;
pub mod logging;
pub mod signal;
pub mod timeout;
pub mod version;

// Re-export commonly used items
pub use error::log_error_async;
pub use logging::{init_host_logging, init_logging, init_logging_from_config};
#[cfg(feature = "json-logging")]
pub use logging::init_json_logging;
pub use signal::wait_for_shutdown_signal;
pub use timeout::{with_timeout, DEFAULT_HOST_EXIT_TIMEOUT, DEFAULT_REQUEST_TIMEOUT};
pub use version::{Version, VersionParseError};
