use serde::{Deserialize, Serialize};

/// Build information reported by the driven application
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductVersion {
    pub product_code: String,
    pub is_snapshot: bool,
    pub baseline_version: u32,
    pub build_number: String,
}

impl Default for ProductVersion {
    fn default() -> Self {
        Self {
            product_code: "DRV".to_string(),
            is_snapshot: true,
            baseline_version: 0,
            build_number: "DRV-0.0-SNAPSHOT".to_string(),
        }
    }
}
