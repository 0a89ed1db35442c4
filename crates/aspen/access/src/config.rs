//! Client-side access configuration.

use serde::{Deserialize, Serialize};

/// Connection and presentation settings for the access layer.
///
/// Held as plain owned configuration by whoever constructs the client; there
/// is no global config registry. The in-memory implementations only consume
/// `default_compute_limit`; a network-backed accessor would use the rest.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessConfig {
    /// Ledger network name.
    pub network: String,
    /// Accessor node REST endpoint.
    pub accessor_endpoint: String,
    /// Wallet discovery endpoint.
    pub discovery_endpoint: String,
    /// Application title advertised to wallets during authentication.
    pub app_title: String,
    /// Application icon URL advertised to wallets.
    pub app_icon: String,
    /// Compute limit attached to write submissions unless overridden.
    pub default_compute_limit: u64,
}

impl Default for AccessConfig {
    fn default() -> Self {
        Self {
            network: "testnet".to_string(),
            accessor_endpoint: "https://rest-testnet.aspen.network".to_string(),
            discovery_endpoint: "https://discovery.aspen.network/testnet/authn".to_string(),
            app_title: "Aspen Profile Client".to_string(),
            app_icon: "https://aspen.network/icon.png".to_string(),
            default_compute_limit: 50,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_points_at_testnet() {
        let config = AccessConfig::default();
        assert_eq!(config.network, "testnet");
        assert_eq!(config.default_compute_limit, 50);
    }
}
