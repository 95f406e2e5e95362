//! Default configuration values

/// Invoker defaults
pub mod invoker {
    /// Prefix of every issued handle id
    pub const REF_ID_PREFIX: &str = "ref-";

    /// Pending UI tasks before callers block
    pub const UI_QUEUE_CAPACITY: usize = 64;
}

/// Control socket defaults
pub mod server {
    pub const SOCKET_PATH: &str = "/tmp/remote-driver/driver.sock";

    /// Requests executing at once across all connections
    pub const MAX_CONCURRENT_REQUESTS: usize = 32;
}

pub mod logging {
    pub const LEVEL: &str = "info";
}

/// Reported when no product section is configured
pub mod product {
    pub const PRODUCT_CODE: &str = "DRV";
    pub const BASELINE_VERSION: u32 = 0;
    pub const BUILD_NUMBER: &str = "DRV-0.0-SNAPSHOT";
}

/// Configuration file used when no path is given
pub const CONFIG_PATH: &str = "config/driver.toml";

/// Environment variable prefix
pub const ENV_PREFIX: &str = "DRIVER";
