//! ## Logging Configuration
//!
//! This module sets up logging automatically at program startup using the `ctor` crate.
//! Logging behavior is controlled by the `DEBUG_BIKESHARE_MODEL` environment variable:
//!
//! - **Disabled** (default): If the variable is unset, empty, or explicitly set to `"0"` or `"false"`,
//!   no subscriber is installed.
//! - **Enabled**: Any other value enables logging with a maximum log level of `DEBUG`, which
//!   includes one event per transformer call and per-step timings of the pipeline.
//!
//! ### Usage Example
//!
//! ```sh
//! export DEBUG_BIKESHARE_MODEL=true
//! ```

use ctor::ctor;
use tracing::Level;

/// Returns true when the given value of `DEBUG_BIKESHARE_MODEL` turns logging on.
fn logging_enabled(value: Option<&str>) -> bool {
    value.is_some_and(|v| !(v == "0" || v == "false" || v.is_empty()))
}

#[ctor]
fn set_debug_level() {
    let value = std::env::var("DEBUG_BIKESHARE_MODEL").ok();
    if logging_enabled(value.as_deref()) {
        tracing_subscriber::fmt()
            .with_max_level(Level::DEBUG)
            .init();
    }
}
