use serde::Deserialize;

/// Configuration for one-time verification codes
#[derive(Debug, Deserialize, Clone)]
pub struct CaptchaConfig {
    /// Code TTL in seconds (default: 5 minutes)
    #[serde(default)]
    pub ttl: u64,

    /// Number of digits per code (default: 6)
    #[serde(default)]
    pub code_length: usize,
}

impl Default for CaptchaConfig {
    fn default() -> Self {
        Self {
            ttl: 300,
            code_length: 6,
        }
    }
}
