use std::env;

use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use sha2::{Digest, Sha256};
use stylegenie_contracts::upload::SigningError;

type HmacSha256 = Hmac<Sha256>;

pub const ACCESS_KEY_ENV: &str = "AWS_ACCESS_KEY_ID";
pub const SECRET_KEY_ENV: &str = "AWS_SECRET_ACCESS_KEY";
pub const SESSION_TOKEN_ENV: &str = "AWS_SESSION_TOKEN";

const ALGORITHM: &str = "AWS4-HMAC-SHA256";
const SERVICE: &str = "s3";
const UNSIGNED_PAYLOAD: &str = "UNSIGNED-PAYLOAD";

#[derive(Clone, PartialEq, Eq)]
pub struct SigningCredentials {
    pub access_key_id: String,
    pub secret_access_key: String,
    pub session_token: Option<String>,
}

impl std::fmt::Debug for SigningCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SigningCredentials")
            .field("access_key_id", &self.access_key_id)
            .field("secret_access_key", &"<redacted>")
            .field("session_token", &self.session_token.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

impl SigningCredentials {
    pub fn new(access_key_id: impl Into<String>, secret_access_key: impl Into<String>) -> Self {
        Self {
            access_key_id: access_key_id.into(),
            secret_access_key: secret_access_key.into(),
            session_token: None,
        }
    }

    pub fn from_env() -> Option<Self> {
        let access_key_id = non_empty_env(ACCESS_KEY_ENV)?;
        let secret_access_key = non_empty_env(SECRET_KEY_ENV)?;
        Some(Self {
            access_key_id,
            secret_access_key,
            session_token: non_empty_env(SESSION_TOKEN_ENV),
        })
    }
}

fn non_empty_env(key: &str) -> Option<String> {
    env::var(key)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

/// Produces time-limited write URLs for single storage keys.
pub trait UrlSigner: Send + Sync {
    fn presign_put(
        &self,
        key: &str,
        content_type: &str,
        expires_in_s: u64,
    ) -> Result<String, SigningError>;

    /// Where the object can be read once written.
    fn public_url(&self, key: &str) -> String;
}

/// S3-style query-string presigning (SigV4). The content type is part of
/// the signature, so the eventual `PUT` must send the same header.
#[derive(Debug, Clone)]
pub struct S3PresignSigner {
    bucket: String,
    region: String,
    credentials: Option<SigningCredentials>,
    public_base_url: Option<String>,
}

impl S3PresignSigner {
    pub fn new(
        bucket: impl Into<String>,
        region: impl Into<String>,
        credentials: Option<SigningCredentials>,
    ) -> Self {
        Self {
            bucket: bucket.into(),
            region: region.into(),
            credentials,
            public_base_url: None,
        }
    }

    pub fn with_public_base_url(mut self, base: Option<String>) -> Self {
        self.public_base_url = base
            .map(|value| value.trim().trim_end_matches('/').to_string())
            .filter(|value| !value.is_empty());
        self
    }

    pub fn host(&self) -> String {
        if self.region == "us-east-1" {
            format!("{}.s3.amazonaws.com", self.bucket)
        } else {
            format!("{}.s3.{}.amazonaws.com", self.bucket, self.region)
        }
    }

    pub fn presign_put_at(
        &self,
        key: &str,
        content_type: &str,
        expires_in_s: u64,
        now: DateTime<Utc>,
    ) -> Result<String, SigningError> {
        let credentials = self
            .credentials
            .as_ref()
            .ok_or(SigningError::MissingCredentials)?;
        let host = self.host();
        presign_url(&PresignInput {
            method: "PUT",
            host: &host,
            path: &format!("/{key}"),
            region: &self.region,
            headers: &[("content-type", content_type), ("host", host.as_str())],
            expires_in_s,
            now,
            credentials,
        })
    }
}

impl UrlSigner for S3PresignSigner {
    fn presign_put(
        &self,
        key: &str,
        content_type: &str,
        expires_in_s: u64,
    ) -> Result<String, SigningError> {
        self.presign_put_at(key, content_type, expires_in_s, Utc::now())
    }

    fn public_url(&self, key: &str) -> String {
        match self.public_base_url.as_deref() {
            Some(base) => format!("{base}/{}", encode_path(key)),
            None => format!("https://{}/{}", self.host(), encode_path(key)),
        }
    }
}

pub(crate) struct PresignInput<'a> {
    pub method: &'a str,
    pub host: &'a str,
    pub path: &'a str,
    pub region: &'a str,
    /// Lower-case names; must include `host`.
    pub headers: &'a [(&'a str, &'a str)],
    pub expires_in_s: u64,
    pub now: DateTime<Utc>,
    pub credentials: &'a SigningCredentials,
}

pub(crate) fn presign_url(input: &PresignInput<'_>) -> Result<String, SigningError> {
    let amz_date = input.now.format("%Y%m%dT%H%M%SZ").to_string();
    let date = input.now.format("%Y%m%d").to_string();
    let scope = format!("{date}/{}/{SERVICE}/aws4_request", input.region);

    let mut headers: Vec<(String, String)> = input
        .headers
        .iter()
        .map(|(name, value)| (name.to_ascii_lowercase(), value.trim().to_string()))
        .collect();
    headers.sort();
    let signed_headers = headers
        .iter()
        .map(|(name, _)| name.as_str())
        .collect::<Vec<&str>>()
        .join(";");
    let canonical_headers: String = headers
        .iter()
        .map(|(name, value)| format!("{name}:{value}\n"))
        .collect();

    let mut query: Vec<(String, String)> = vec![
        ("X-Amz-Algorithm".to_string(), ALGORITHM.to_string()),
        (
            "X-Amz-Credential".to_string(),
            format!("{}/{scope}", input.credentials.access_key_id),
        ),
        ("X-Amz-Date".to_string(), amz_date.clone()),
        ("X-Amz-Expires".to_string(), input.expires_in_s.to_string()),
        ("X-Amz-SignedHeaders".to_string(), signed_headers.clone()),
    ];
    if let Some(token) = input.credentials.session_token.as_deref() {
        query.push(("X-Amz-Security-Token".to_string(), token.to_string()));
    }
    let mut encoded_query: Vec<(String, String)> = query
        .into_iter()
        .map(|(name, value)| {
            (
                urlencoding::encode(&name).into_owned(),
                urlencoding::encode(&value).into_owned(),
            )
        })
        .collect();
    encoded_query.sort();
    let canonical_query = encoded_query
        .iter()
        .map(|(name, value)| format!("{name}={value}"))
        .collect::<Vec<String>>()
        .join("&");

    let canonical_path = encode_path(input.path.trim_start_matches('/'));
    let canonical_request = format!(
        "{}\n/{canonical_path}\n{canonical_query}\n{canonical_headers}\n{signed_headers}\n{UNSIGNED_PAYLOAD}",
        input.method
    );
    let string_to_sign = format!(
        "{ALGORITHM}\n{amz_date}\n{scope}\n{}",
        hex::encode(Sha256::digest(canonical_request.as_bytes()))
    );

    let secret = format!("AWS4{}", input.credentials.secret_access_key);
    let k_date = hmac_sha256(secret.as_bytes(), date.as_bytes())?;
    let k_region = hmac_sha256(&k_date, input.region.as_bytes())?;
    let k_service = hmac_sha256(&k_region, SERVICE.as_bytes())?;
    let k_signing = hmac_sha256(&k_service, b"aws4_request")?;
    let signature = hex::encode(hmac_sha256(&k_signing, string_to_sign.as_bytes())?);

    Ok(format!(
        "https://{}/{canonical_path}?{canonical_query}&X-Amz-Signature={signature}",
        input.host
    ))
}

fn hmac_sha256(key: &[u8], data: &[u8]) -> Result<Vec<u8>, SigningError> {
    let mut mac = HmacSha256::new_from_slice(key)
        .map_err(|err| SigningError::Provider(err.to_string()))?;
    mac.update(data);
    Ok(mac.finalize().into_bytes().to_vec())
}

fn encode_path(path: &str) -> String {
    path.split('/')
        .map(|segment| urlencoding::encode(segment).into_owned())
        .collect::<Vec<String>>()
        .join("/")
}
