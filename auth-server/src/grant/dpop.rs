//! DPoP proof verification (RFC 9449) for the token endpoint.
//!
//! A proof is a JWT carried in the `DPoP` header, signed with the client's
//! own key which is embedded in the proof header as a JWK. Verification
//! checks the JOSE header, the signature against the embedded key, and the
//! binding claims, then hands back the key thumbprint for the `cnf.jkt`
//! claim of the issued access token.

use crate::errors::OAuthError;
use crate::grant::convert::{DPOP_METHOD_PARAM, DPOP_PROOF_PARAM, DPOP_TARGET_URI_PARAM};
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::Utc;
use jsonwebtoken::jwk::{AlgorithmParameters, EllipticCurve, Jwk};
use jsonwebtoken::{decode, decode_header, Algorithm, DecodingKey, Validation};
use serde::Deserialize;
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use url::Url;

const DPOP_JWT_TYP: &str = "dpop+jwt";

/// Maximum accepted clock skew on the proof's iat claim, in seconds
const IAT_LEEWAY_SECS: i64 = 60;

/// Outcome of a successful proof verification.
#[derive(Debug, Clone, PartialEq)]
pub struct VerifiedDpopProof {
    /// RFC 7638 thumbprint of the proof key, base64url without padding
    pub jkt: String,
}

#[derive(Debug, Deserialize)]
struct DpopClaims {
    htm: Option<String>,
    htu: Option<String>,
    jti: Option<String>,
    iat: Option<i64>,
}

/// Verify the DPoP proof recorded in the request's additional parameters,
/// if one is present. Absence of a proof is not an error.
pub fn verify_if_available(
    additional_params: &HashMap<String, Value>,
) -> Result<Option<VerifiedDpopProof>, OAuthError> {
    let Some(proof) = additional_params
        .get(DPOP_PROOF_PARAM)
        .and_then(Value::as_str)
        .filter(|p| !p.trim().is_empty())
    else {
        return Ok(None);
    };

    let method = additional_params
        .get(DPOP_METHOD_PARAM)
        .and_then(Value::as_str)
        .unwrap_or_default();
    let target_uri = additional_params
        .get(DPOP_TARGET_URI_PARAM)
        .and_then(Value::as_str)
        .unwrap_or_default();

    verify_proof(proof, method, target_uri).map(Some)
}

fn verify_proof(
    proof: &str,
    method: &str,
    target_uri: &str,
) -> Result<VerifiedDpopProof, OAuthError> {
    let header = decode_header(proof).map_err(|_| OAuthError::invalid_dpop_proof())?;

    if header.typ.as_deref() != Some(DPOP_JWT_TYP) {
        return Err(OAuthError::invalid_dpop_proof());
    }
    // Proofs must be signed with the client's asymmetric key
    if matches!(
        header.alg,
        Algorithm::HS256 | Algorithm::HS384 | Algorithm::HS512
    ) {
        return Err(OAuthError::invalid_dpop_proof());
    }
    let Some(jwk) = header.jwk.as_ref() else {
        return Err(OAuthError::invalid_dpop_proof());
    };

    let key = DecodingKey::from_jwk(jwk).map_err(|_| OAuthError::invalid_dpop_proof())?;
    let mut validation = Validation::new(header.alg);
    validation.validate_exp = false;
    validation.validate_aud = false;
    validation.required_spec_claims.clear();

    let claims = decode::<DpopClaims>(proof, &key, &validation)
        .map_err(|_| OAuthError::invalid_dpop_proof())?
        .claims;

    check_claims(&claims, method, target_uri)?;

    Ok(VerifiedDpopProof {
        jkt: jwk_thumbprint(jwk)?,
    })
}

fn check_claims(claims: &DpopClaims, method: &str, target_uri: &str) -> Result<(), OAuthError> {
    if claims.htm.as_deref() != Some(method) {
        return Err(OAuthError::invalid_dpop_proof());
    }
    let htu_matches = match claims.htu.as_deref() {
        Some(htu) => uris_match(htu, target_uri),
        None => false,
    };
    if !htu_matches {
        return Err(OAuthError::invalid_dpop_proof());
    }
    if claims.jti.as_deref().map_or(true, |jti| jti.trim().is_empty()) {
        return Err(OAuthError::invalid_dpop_proof());
    }
    let Some(iat) = claims.iat else {
        return Err(OAuthError::invalid_dpop_proof());
    };
    if (Utc::now().timestamp() - iat).abs() > IAT_LEEWAY_SECS {
        return Err(OAuthError::invalid_dpop_proof());
    }
    Ok(())
}

/// Compare the proof's htu claim against the request URI, ignoring query
/// and fragment as RFC 9449 requires.
fn uris_match(htu: &str, target_uri: &str) -> bool {
    match (Url::parse(htu), Url::parse(target_uri)) {
        (Ok(mut a), Ok(mut b)) => {
            a.set_query(None);
            a.set_fragment(None);
            b.set_query(None);
            b.set_fragment(None);
            a == b
        }
        _ => htu == target_uri,
    }
}

/// RFC 7638 JWK thumbprint: SHA-256 over the canonical JSON of the key's
/// required members, base64url-encoded without padding.
pub(crate) fn jwk_thumbprint(jwk: &Jwk) -> Result<String, OAuthError> {
    let canonical = match &jwk.algorithm {
        AlgorithmParameters::EllipticCurve(params) => format!(
            r#"{{"crv":"{}","kty":"EC","x":"{}","y":"{}"}}"#,
            curve_name(&params.curve),
            params.x,
            params.y
        ),
        AlgorithmParameters::RSA(params) => {
            format!(r#"{{"e":"{}","kty":"RSA","n":"{}"}}"#, params.e, params.n)
        }
        AlgorithmParameters::OctetKeyPair(params) => format!(
            r#"{{"crv":"{}","kty":"OKP","x":"{}"}}"#,
            curve_name(&params.curve),
            params.x
        ),
        // Symmetric keys are never acceptable as proof keys
        AlgorithmParameters::OctetKey(_) => return Err(OAuthError::invalid_dpop_proof()),
    };
    let digest = Sha256::digest(canonical.as_bytes());
    Ok(URL_SAFE_NO_PAD.encode(digest))
}

fn curve_name(curve: &EllipticCurve) -> &'static str {
    match curve {
        EllipticCurve::P256 => "P-256",
        EllipticCurve::P384 => "P-384",
        EllipticCurve::P521 => "P-521",
        EllipticCurve::Ed25519 => "Ed25519",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jsonwebtoken::{encode, EncodingKey, Header};
    use serde_json::json;

    const TARGET: &str = "http://localhost:9000/oauth2/token";

    fn params(proof: &str) -> HashMap<String, Value> {
        HashMap::from([
            (DPOP_PROOF_PARAM.to_string(), json!(proof)),
            (DPOP_METHOD_PARAM.to_string(), json!("POST")),
            (DPOP_TARGET_URI_PARAM.to_string(), json!(TARGET)),
        ])
    }

    #[test]
    fn test_no_proof_means_no_binding() {
        let result = verify_if_available(&HashMap::new()).unwrap();
        assert_eq!(result, None);
    }

    #[test]
    fn test_garbage_proof_rejected() {
        let err = verify_if_available(&params("not-a-jwt")).unwrap_err();
        assert_eq!(err.error, crate::errors::OAuthErrorCode::InvalidDpopProof);
    }

    #[test]
    fn test_symmetric_proof_rejected() {
        // A structurally valid JWT signed with an HMAC key must never pass,
        // regardless of its typ header
        let mut header = Header::new(Algorithm::HS256);
        header.typ = Some(DPOP_JWT_TYP.to_string());
        let claims = json!({
            "htm": "POST",
            "htu": TARGET,
            "jti": "id-1",
            "iat": Utc::now().timestamp(),
        });
        let proof = encode(&header, &claims, &EncodingKey::from_secret(b"secret")).unwrap();

        assert!(verify_if_available(&params(&proof)).is_err());
    }

    #[test]
    fn test_wrong_typ_rejected() {
        let header = Header::new(Algorithm::HS256); // typ defaults to JWT
        let claims = json!({ "iat": Utc::now().timestamp() });
        let proof = encode(&header, &claims, &EncodingKey::from_secret(b"secret")).unwrap();

        assert!(verify_if_available(&params(&proof)).is_err());
    }

    #[test]
    fn test_claim_checks() {
        let now = Utc::now().timestamp();
        let good = DpopClaims {
            htm: Some("POST".to_string()),
            htu: Some(TARGET.to_string()),
            jti: Some("id-1".to_string()),
            iat: Some(now),
        };
        assert!(check_claims(&good, "POST", TARGET).is_ok());

        let wrong_method = DpopClaims {
            htm: Some("GET".to_string()),
            ..claims_like(&good)
        };
        assert!(check_claims(&wrong_method, "POST", TARGET).is_err());

        let stale = DpopClaims {
            iat: Some(now - 3600),
            ..claims_like(&good)
        };
        assert!(check_claims(&stale, "POST", TARGET).is_err());

        let missing_jti = DpopClaims {
            jti: None,
            ..claims_like(&good)
        };
        assert!(check_claims(&missing_jti, "POST", TARGET).is_err());
    }

    #[test]
    fn test_htu_ignores_query_and_fragment() {
        let with_query = DpopClaims {
            htm: Some("POST".to_string()),
            htu: Some(format!("{TARGET}?foo=bar#frag")),
            jti: Some("id-1".to_string()),
            iat: Some(Utc::now().timestamp()),
        };
        assert!(check_claims(&with_query, "POST", TARGET).is_ok());

        let wrong_path = DpopClaims {
            htu: Some("http://localhost:9000/other".to_string()),
            ..claims_like(&with_query)
        };
        assert!(check_claims(&wrong_path, "POST", TARGET).is_err());
    }

    #[test]
    fn test_rsa_thumbprint_matches_rfc7638_example() {
        // Key and thumbprint from RFC 7638 section 3.1
        let jwk: Jwk = serde_json::from_value(json!({
            "kty": "RSA",
            "n": "0vx7agoebGcQSuuPiLJXZptN9nndrQmbXEps2aiAFbWhM78LhWx4cbbfAAtVT86zwu1RK7aPFFxuhDR1L6tSoc_BJECPebWKRXjBZCiFV4n3oknjhMstn64tZ_2W-5JsGY4Hc5n9yBXArwl93lqt7_RN5w6Cf0h4QyQ5v-65YGjQR0_FDW2QvzqY368QQMicAtaSqzs8KJZgnYb9c7d0zgdAZHzu6qMQvRL5hajrn1n91CbOpbISD08qNLyrdkt-bFTWhAI4vMQFh6WeZu0fM4lFd2NcRwr3XPksINHaQ-G_xBniIqbw0Ls1jF44-csFCur-kEgU8awapJzKnqDKgw",
            "e": "AQAB",
        }))
        .unwrap();
        assert_eq!(
            jwk_thumbprint(&jwk).unwrap(),
            "NzbLsXh8uDCcd-6MNwXF4W_7noWXFZAfHkxZsRGC9Xs"
        );
    }

    fn claims_like(claims: &DpopClaims) -> DpopClaims {
        DpopClaims {
            htm: claims.htm.clone(),
            htu: claims.htu.clone(),
            jti: claims.jti.clone(),
            iat: claims.iat,
        }
    }
}
