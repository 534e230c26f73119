// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
// Version information for the Replica Search Node

/// Full version string
pub const VERSION: &str = "v0.1.0-dual-search-2025-08-27";

/// Semantic version number
pub const VERSION_NUMBER: &str = "0.1.0";

/// Build date
pub const BUILD_DATE: &str = "2025-08-27";

/// Supported features in this version
pub const FEATURES: &[&str] = &[
    "dual-search",
    "local-index-replica",
    "mirror-racing",
    "object-metadata",
];

/// Get formatted version string for logging
pub fn get_version_string() -> String {
    format!("Replica Search Node {} ({})", VERSION_NUMBER, BUILD_DATE)
}

/// Get full version info for API responses
pub fn get_version_info() -> serde_json::Value {
    serde_json::json!({
        "version": VERSION_NUMBER,
        "build": VERSION,
        "date": BUILD_DATE,
        "features": FEATURES,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_string() {
        let version = get_version_string();
        assert!(version.contains("0.1.0"));
        assert!(version.contains(BUILD_DATE));
    }

    #[test]
    fn test_version_info() {
        let info = get_version_info();
        assert_eq!(info["version"], VERSION_NUMBER);
        assert!(info["features"].as_array().unwrap().len() >= 3);
    }
}
