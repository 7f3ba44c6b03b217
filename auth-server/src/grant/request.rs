//! Parsed authentication requests for the custom grant types.

use serde_json::Value;
use std::collections::HashMap;

pub const GRANT_TYPE_PASSWORD: &str = "password";
pub const GRANT_TYPE_MOBILE: &str = "mobile";
pub const GRANT_TYPE_EMAIL: &str = "email";

/// A token request under one of the supported grant types, with the
/// subject identifier and credential already pulled out of the form.
#[derive(Debug, Clone, PartialEq)]
pub enum GrantRequest {
    Password {
        username: String,
        password: String,
        scopes: Vec<String>,
        additional_params: HashMap<String, Value>,
    },
    Mobile {
        mobile: String,
        code: String,
        scopes: Vec<String>,
        additional_params: HashMap<String, Value>,
    },
    Email {
        email: String,
        code: String,
        scopes: Vec<String>,
        additional_params: HashMap<String, Value>,
    },
}

impl GrantRequest {
    pub fn grant_type(&self) -> &'static str {
        match self {
            Self::Password { .. } => GRANT_TYPE_PASSWORD,
            Self::Mobile { .. } => GRANT_TYPE_MOBILE,
            Self::Email { .. } => GRANT_TYPE_EMAIL,
        }
    }

    /// The subject identifier carried by the request: username, mobile
    /// number, or email address.
    pub fn identifier(&self) -> &str {
        match self {
            Self::Password { username, .. } => username,
            Self::Mobile { mobile, .. } => mobile,
            Self::Email { email, .. } => email,
        }
    }

    pub fn credential(&self) -> &str {
        match self {
            Self::Password { password, .. } => password,
            Self::Mobile { code, .. } => code,
            Self::Email { code, .. } => code,
        }
    }

    pub fn scopes(&self) -> &[String] {
        match self {
            Self::Password { scopes, .. }
            | Self::Mobile { scopes, .. }
            | Self::Email { scopes, .. } => scopes,
        }
    }

    pub fn additional_params(&self) -> &HashMap<String, Value> {
        match self {
            Self::Password {
                additional_params, ..
            }
            | Self::Mobile {
                additional_params, ..
            }
            | Self::Email {
                additional_params, ..
            } => additional_params,
        }
    }
}
