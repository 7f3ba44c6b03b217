use serde::Deserialize;

/// Specifies which persistence backend to use
#[derive(Debug, Deserialize, Clone, PartialEq, Default)]
#[serde(rename_all = "kebab-case")]
pub enum StoreBackendKind {
    Redis,
    #[serde(other)]
    #[default]
    InMemory,
}

/// Configuration for authorization persistence
#[derive(Debug, Deserialize, Clone, Default)]
pub struct StoreConfig {
    /// Backend type: "redis" or "in-memory" (default)
    #[serde(default)]
    pub backend: StoreBackendKind,

    /// Redis specific configuration
    #[serde(default)]
    pub redis: RedisConfig,
}

/// Redis backend configuration options
#[derive(Debug, Deserialize, Clone, Default)]
pub struct RedisConfig {
    /// Redis connection string
    #[serde(default)]
    pub url: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backend_kind_deserializes_known_values() {
        let kind: StoreBackendKind = serde_json::from_str("\"redis\"").unwrap();
        assert_eq!(kind, StoreBackendKind::Redis);

        let kind: StoreBackendKind = serde_json::from_str("\"in-memory\"").unwrap();
        assert_eq!(kind, StoreBackendKind::InMemory);
    }

    #[test]
    fn test_backend_kind_falls_back_to_in_memory() {
        let kind: StoreBackendKind = serde_json::from_str("\"something-else\"").unwrap();
        assert_eq!(kind, StoreBackendKind::InMemory);
        assert_eq!(StoreBackendKind::default(), StoreBackendKind::InMemory);
    }
}
