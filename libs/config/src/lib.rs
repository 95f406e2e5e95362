//! # Remote Driver Configuration
//!
//! Settings for the driver host: handle naming, the UI executor queue, the
//! control socket, logging and the product version reported to controllers.
//!
//! ## Sources
//!
//! Later sources override earlier ones:
//!
//! 1. built-in defaults ([`defaults`])
//! 2. a TOML file (`config/driver.toml` unless a path is given)
//! 3. `DRIVER__`-prefixed environment variables, `__` separating sections
//!    (`DRIVER__SERVER__SOCKET_PATH=/run/driver.sock`)
//!
//! ## Usage
//!
//! ```rust,no_run
//! use driver_config::load_config;
//!
//! let config = load_config(None).expect("driver configuration");
//! println!("listening on {}", config.server.socket_path.display());
//! ```

pub mod defaults;
pub mod driver_config;

pub use driver_config::{
    load_config, DriverConfig, InvokerSettings, LoggingSettings, ProductSettings, ServerSettings,
};
