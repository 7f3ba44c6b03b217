//! One-time verification codes for the mobile and email grants.
//!
//! Codes live in a TTL cache keyed by channel and destination, e.g.
//! `sms:13800000000` or `email:alice@example.com`. Validation consumes the
//! code whether or not it matches, so each code is single use.

use moka::future::Cache;
use rand::Rng;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptchaChannel {
    Sms,
    Email,
}

impl CaptchaChannel {
    fn prefix(&self) -> &'static str {
        match self {
            Self::Sms => "sms",
            Self::Email => "email",
        }
    }
}

#[derive(Clone)]
pub struct CaptchaStore {
    cache: Cache<String, String>,
    code_length: usize,
}

impl CaptchaStore {
    pub fn new(ttl: Duration, code_length: usize) -> Self {
        let cache = Cache::builder().time_to_live(ttl).build();
        Self { cache, code_length }
    }

    fn key(channel: CaptchaChannel, destination: &str) -> String {
        format!("{}:{}", channel.prefix(), destination)
    }

    /// Generate and store a fresh numeric code for the destination,
    /// replacing any outstanding code. Returns the code so the caller can
    /// deliver it.
    pub async fn issue(&self, channel: CaptchaChannel, destination: &str) -> String {
        let code = generate_code(self.code_length);
        self.cache
            .insert(Self::key(channel, destination), code.clone())
            .await;
        code
    }

    /// Check a submitted code against the outstanding one. The outstanding
    /// code is removed on every attempt, matching or not.
    pub async fn validate(&self, channel: CaptchaChannel, destination: &str, code: &str) -> bool {
        let key = Self::key(channel, destination);
        let stored = self.cache.remove(&key).await;
        matches!(stored, Some(expected) if expected == code)
    }
}

fn generate_code(length: usize) -> String {
    let mut rng = rand::thread_rng();
    (0..length)
        .map(|_| char::from(b'0' + rng.gen_range(0..10)))
        .collect()
}
