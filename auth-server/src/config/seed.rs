use serde::Deserialize;

/// Client registration seeded into the repository at startup
#[derive(Debug, Deserialize, Clone)]
pub struct ClientSeedConfig {
    #[serde(default)]
    pub client_id: String,

    #[serde(default)]
    pub client_secret: String,

    /// Comma-separated grant types the client may use
    #[serde(default)]
    pub grant_types: String,

    /// Comma-separated scopes the client may request
    #[serde(default)]
    pub scopes: String,
}

impl Default for ClientSeedConfig {
    fn default() -> Self {
        Self {
            client_id: "default-client".to_string(),
            client_secret: "default-secret".to_string(),
            grant_types: "password,mobile,email,refresh_token".to_string(),
            scopes: "openid,profile".to_string(),
        }
    }
}

impl ClientSeedConfig {
    pub fn grant_type_list(&self) -> Vec<String> {
        split_csv(&self.grant_types)
    }

    pub fn scope_list(&self) -> Vec<String> {
        split_csv(&self.scopes)
    }
}

/// User account seeded into the repository at startup; skipped when the
/// username is empty
#[derive(Debug, Deserialize, Clone, Default)]
pub struct UserSeedConfig {
    #[serde(default)]
    pub username: String,

    #[serde(default)]
    pub password: String,

    #[serde(default)]
    pub mobile: String,

    #[serde(default)]
    pub email: String,
}

fn split_csv(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_csv_lists_trim_and_skip_empties() {
        let seed = ClientSeedConfig {
            grant_types: "password, mobile,,email ".to_string(),
            scopes: String::new(),
            ..ClientSeedConfig::default()
        };
        assert_eq!(seed.grant_type_list(), vec!["password", "mobile", "email"]);
        assert!(seed.scope_list().is_empty());
    }
}
