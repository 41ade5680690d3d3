//! AWS Signature Version 4 for Bedrock runtime requests.
//!
//! Only what a single JSON POST needs: no query parameters, no chunked
//! payload signing. Canonical URI segments are encoded a second time, as
//! every AWS service other than S3 expects.

use crate::error::CaptureError;
use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use sha2::{Digest, Sha256};
use std::fmt;

type HmacSha256 = Hmac<Sha256>;

const ALGORITHM: &str = "AWS4-HMAC-SHA256";

/// Static AWS credentials.
#[derive(Clone, PartialEq, Eq)]
pub struct AwsCredentials {
    pub access_key_id: String,
    pub secret_access_key: String,
    pub session_token: Option<String>,
}

impl fmt::Debug for AwsCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AwsCredentials")
            .field("access_key_id", &self.access_key_id)
            .field("secret_access_key", &"<redacted>")
            .field("session_token", &self.session_token.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

/// The parts of a request that go into the signature.
#[derive(Debug, Clone)]
pub struct SignableRequest<'a> {
    pub method: &'a str,
    /// `host` or `host:port`, exactly as sent.
    pub host: &'a str,
    /// Path as it appears on the wire (already percent-encoded once).
    pub path: &'a str,
    pub payload: &'a [u8],
}

/// Sign `request`, returning the headers to attach (`x-amz-date`,
/// `x-amz-security-token` when a session token is present, `authorization`).
pub fn sign(
    credentials: &AwsCredentials,
    region: &str,
    service: &str,
    request: &SignableRequest<'_>,
    now: DateTime<Utc>,
) -> Result<Vec<(&'static str, String)>, CaptureError> {
    let amz_date = now.format("%Y%m%dT%H%M%SZ").to_string();
    let date = now.format("%Y%m%d").to_string();

    let mut signed: Vec<(&str, &str)> = vec![("host", request.host), ("x-amz-date", amz_date.as_str())];
    if let Some(ref token) = credentials.session_token {
        signed.push(("x-amz-security-token", token.as_str()));
    }
    signed.sort_by(|a, b| a.0.cmp(b.0));

    let canonical_headers: String = signed
        .iter()
        .map(|(name, value)| format!("{}:{}\n", name, value.trim()))
        .collect();
    let signed_headers = signed
        .iter()
        .map(|(name, _)| *name)
        .collect::<Vec<_>>()
        .join(";");

    let canonical_request = format!(
        "{}\n{}\n\n{}\n{}\n{}",
        request.method,
        canonical_uri(request.path),
        canonical_headers,
        signed_headers,
        hex::encode(Sha256::digest(request.payload)),
    );

    let scope = format!("{date}/{region}/{service}/aws4_request");
    let string_to_sign = format!(
        "{ALGORITHM}\n{amz_date}\n{scope}\n{}",
        hex::encode(Sha256::digest(canonical_request.as_bytes()))
    );

    let key = signing_key(&credentials.secret_access_key, &date, region, service)?;
    let signature = hex::encode(hmac(&key, string_to_sign.as_bytes())?);

    let authorization = format!(
        "{ALGORITHM} Credential={}/{scope}, SignedHeaders={signed_headers}, Signature={signature}",
        credentials.access_key_id
    );

    let mut headers = vec![("x-amz-date", amz_date.clone())];
    if let Some(ref token) = credentials.session_token {
        headers.push(("x-amz-security-token", token.clone()));
    }
    headers.push(("authorization", authorization));
    Ok(headers)
}

/// Derive the per-day, per-region, per-service signing key.
pub fn signing_key(
    secret: &str,
    date: &str,
    region: &str,
    service: &str,
) -> Result<Vec<u8>, CaptureError> {
    let k_date = hmac(format!("AWS4{secret}").as_bytes(), date.as_bytes())?;
    let k_region = hmac(&k_date, region.as_bytes())?;
    let k_service = hmac(&k_region, service.as_bytes())?;
    hmac(&k_service, b"aws4_request")
}

fn hmac(key: &[u8], data: &[u8]) -> Result<Vec<u8>, CaptureError> {
    let mut mac = HmacSha256::new_from_slice(key)
        .map_err(|e| CaptureError::Internal(format!("HMAC key rejected: {}", e)))?;
    mac.update(data);
    Ok(mac.finalize().into_bytes().to_vec())
}

fn canonical_uri(path: &str) -> String {
    if path.is_empty() {
        return "/".to_string();
    }
    path.split('/')
        .map(|segment| urlencoding::encode(segment).into_owned())
        .collect::<Vec<_>>()
        .join("/")
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    const SECRET: &str = "wJalrXUtnFEMI/K7MDENG+bPxRfiCYEXAMPLEKEY";

    fn example_credentials() -> AwsCredentials {
        AwsCredentials {
            access_key_id: "AKIDEXAMPLE".into(),
            secret_access_key: SECRET.into(),
            session_token: None,
        }
    }

    #[test]
    fn signing_key_matches_published_example() {
        let key = signing_key(SECRET, "20120215", "us-east-1", "iam").unwrap();
        assert_eq!(
            hex::encode(key),
            "f4780e2d9f65fa895f9c67b32ce1baf0b0d8a43505a000a1a9e090d414db404d"
        );
    }

    #[test]
    fn get_vanilla_signature() {
        let now = Utc.with_ymd_and_hms(2015, 8, 30, 12, 36, 0).unwrap();
        let request = SignableRequest {
            method: "GET",
            host: "example.amazonaws.com",
            path: "/",
            payload: b"",
        };
        let headers = sign(&example_credentials(), "us-east-1", "service", &request, now).unwrap();

        assert_eq!(headers[0], ("x-amz-date", "20150830T123600Z".to_string()));
        assert_eq!(
            headers[1].1,
            "AWS4-HMAC-SHA256 Credential=AKIDEXAMPLE/20150830/us-east-1/service/aws4_request, \
             SignedHeaders=host;x-amz-date, \
             Signature=5fa00fa31553b73ebf1942676e86291e8372ff2a2260956d9b8aae1d763fbf31"
        );
    }

    #[test]
    fn session_token_is_signed_and_attached() {
        let mut creds = example_credentials();
        creds.session_token = Some("session-token".into());
        let now = Utc.with_ymd_and_hms(2024, 1, 2, 3, 4, 5).unwrap();
        let request = SignableRequest {
            method: "POST",
            host: "bedrock-runtime.ap-south-1.amazonaws.com",
            path: "/model/x/invoke-with-response-stream",
            payload: b"{}",
        };
        let headers = sign(&creds, "ap-south-1", "bedrock", &request, now).unwrap();

        assert!(headers.contains(&("x-amz-security-token", "session-token".to_string())));
        let auth = &headers.last().unwrap().1;
        assert!(auth.contains("SignedHeaders=host;x-amz-date;x-amz-security-token"));
        assert!(auth.contains("/20240102/ap-south-1/bedrock/aws4_request"));
    }

    #[test]
    fn hmac_accepts_empty_and_oversized_keys() {
        // RFC 4231 test case 6: a 131-byte key is hashed down first
        let long_key = [0xaau8; 131];
        let mac = hmac(&long_key, b"Test Using Larger Than Block-Size Key - Hash Key First").unwrap();
        assert_eq!(
            hex::encode(mac),
            "60e431591ee0b67f0d8a26aacbf5b77f8e0bc6213728c5140546040f0ee37f54"
        );
        assert_eq!(hmac(b"", b"").unwrap().len(), 32);
    }

    #[test]
    fn canonical_uri_double_encodes_segments() {
        assert_eq!(canonical_uri("/"), "/");
        assert_eq!(
            canonical_uri("/model/apac.amazon.nova-micro-v1%3A0/invoke"),
            "/model/apac.amazon.nova-micro-v1%253A0/invoke"
        );
    }

    #[test]
    fn debug_redacts_secret() {
        let dbg = format!("{:?}", example_credentials());
        assert!(!dbg.contains(SECRET));
        assert!(dbg.contains("AKIDEXAMPLE"));
    }
}
