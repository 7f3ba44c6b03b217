//! Conversion of raw token-endpoint form parameters into a [`GrantRequest`].
//!
//! Each supported grant type names the form parameter carrying the subject
//! identifier and the one carrying the credential:
//!
//! | grant_type | identifier | credential   |
//! |------------|------------|--------------|
//! | password   | username   | password     |
//! | mobile     | mobile     | smsCaptcha   |
//! | email      | email      | emailCaptcha |
//!
//! An unrecognized grant_type yields `Ok(None)` so the endpoint can report
//! it as unsupported rather than malformed.

use crate::errors::OAuthError;
use crate::grant::request::{GrantRequest, GRANT_TYPE_EMAIL, GRANT_TYPE_MOBILE, GRANT_TYPE_PASSWORD};
use serde_json::{json, Value};
use std::collections::HashMap;

pub const DPOP_HEADER: &str = "DPoP";

pub const DPOP_PROOF_PARAM: &str = "dpop_proof";
pub const DPOP_METHOD_PARAM: &str = "dpop_method";
pub const DPOP_TARGET_URI_PARAM: &str = "dpop_target_uri";

/// Form parameters kept out of the additional-parameter map
const RESERVED_PARAMS: [&str; 4] = ["grant_type", "client_id", "code", "redirect_uri"];

/// The raw material of one token request: decoded form parameters in
/// arrival order plus the pieces of the HTTP request DPoP binds to.
pub struct TokenRequest<'a> {
    pub params: &'a [(String, String)],
    /// Every DPoP header value on the request, in order
    pub dpop_headers: &'a [String],
    pub method: &'a str,
    pub target_uri: &'a str,
}

impl TokenRequest<'_> {
    fn first(&self, name: &str) -> Option<&str> {
        self.params
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }
}

fn is_blank(value: Option<&str>) -> bool {
    value.map_or(true, |v| v.trim().is_empty())
}

/// Convert a token request into a grant request, or `Ok(None)` when the
/// grant_type is not one of the custom grants.
pub fn convert(request: &TokenRequest<'_>) -> Result<Option<GrantRequest>, OAuthError> {
    let grant_type = request.first("grant_type").unwrap_or_default();
    let (identifier_param, credential_param) = match grant_type {
        GRANT_TYPE_PASSWORD => ("username", "password"),
        GRANT_TYPE_MOBILE => ("mobile", "smsCaptcha"),
        GRANT_TYPE_EMAIL => ("email", "emailCaptcha"),
        _ => return Ok(None),
    };

    let identifier = request.first(identifier_param);
    if is_blank(identifier) {
        return Err(OAuthError::invalid_request(identifier_param));
    }
    let identifier = identifier.unwrap_or_default().to_string();

    let credential = request.first(credential_param);
    if is_blank(credential) {
        return Err(OAuthError::invalid_request(credential_param));
    }
    let credential = credential.unwrap_or_default().to_string();

    let scope = request.first("scope");
    if is_blank(scope) {
        return Err(OAuthError::invalid_scope());
    }
    let scopes: Vec<String> = scope
        .unwrap_or_default()
        .split_whitespace()
        .map(str::to_string)
        .collect();

    let mut additional_params = build_additional_params(request.params);
    add_dpop_params_if_available(request, &mut additional_params)?;

    let grant = match grant_type {
        GRANT_TYPE_PASSWORD => GrantRequest::Password {
            username: identifier,
            password: credential,
            scopes,
            additional_params,
        },
        GRANT_TYPE_MOBILE => GrantRequest::Mobile {
            mobile: identifier,
            code: credential,
            scopes,
            additional_params,
        },
        _ => GrantRequest::Email {
            email: identifier,
            code: credential,
            scopes,
            additional_params,
        },
    };
    Ok(Some(grant))
}

/// Collect every non-reserved form parameter. A parameter repeated in the
/// form becomes an array of its values.
fn build_additional_params(params: &[(String, String)]) -> HashMap<String, Value> {
    let mut grouped: HashMap<String, Vec<&str>> = HashMap::new();
    for (key, value) in params {
        if RESERVED_PARAMS.contains(&key.as_str()) {
            continue;
        }
        grouped.entry(key.clone()).or_default().push(value);
    }
    grouped
        .into_iter()
        .map(|(key, values)| {
            let value = if values.len() == 1 {
                json!(values[0])
            } else {
                json!(values)
            };
            (key, value)
        })
        .collect()
}

/// When the request carries a DPoP proof, record it plus the HTTP method
/// and target URI it must bind to. More than one DPoP header is malformed.
fn add_dpop_params_if_available(
    request: &TokenRequest<'_>,
    additional_params: &mut HashMap<String, Value>,
) -> Result<(), OAuthError> {
    let Some(proof) = request.dpop_headers.first() else {
        return Ok(());
    };
    if request.dpop_headers.len() != 1 {
        return Err(OAuthError::invalid_request(DPOP_HEADER));
    }
    if proof.trim().is_empty() {
        return Ok(());
    }
    additional_params.insert(DPOP_PROOF_PARAM.to_string(), json!(proof));
    additional_params.insert(DPOP_METHOD_PARAM.to_string(), json!(request.method));
    additional_params.insert(DPOP_TARGET_URI_PARAM.to_string(), json!(request.target_uri));
    Ok(())
}
