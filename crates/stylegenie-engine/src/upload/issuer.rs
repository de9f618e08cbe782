use serde_json::Value;
use stylegenie_contracts::upload::{storage_key, UploadCredential, UploadError, UploadRequest};

use super::signer::UrlSigner;

pub const CORS_HEADERS: &[(&str, &str)] = &[
    ("Access-Control-Allow-Origin", "*"),
    ("Access-Control-Allow-Credentials", "true"),
    ("Content-Type", "application/json"),
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IssuerResponse {
    pub status: u16,
    pub body: Value,
}

impl IssuerResponse {
    pub fn headers(&self) -> &'static [(&'static str, &'static str)] {
        CORS_HEADERS
    }
}

/// Mints write credentials for fresh storage keys. Holds no state between
/// requests.
pub struct UploadUrlIssuer<S> {
    signer: S,
    expires_in_s: u64,
}

impl<S: UrlSigner> UploadUrlIssuer<S> {
    pub fn new(signer: S, expires_in_s: u64) -> Self {
        Self {
            signer,
            expires_in_s,
        }
    }

    pub fn signer(&self) -> &S {
        &self.signer
    }

    pub fn issue(&self, request: &UploadRequest) -> Result<UploadCredential, UploadError> {
        let (file_name, file_type) = request.validate()?;
        let key = storage_key(file_name);
        let upload_url = self
            .signer
            .presign_put(&key, file_type, self.expires_in_s)?;
        Ok(UploadCredential {
            upload_url,
            file_url: self.signer.public_url(&key),
        })
    }

    /// Full request handling for `POST /getUploadUrl`.
    pub fn handle(&self, body: Option<&str>) -> IssuerResponse {
        let outcome =
            UploadRequest::from_body(body).and_then(|request| self.issue(&request));
        match outcome {
            Ok(credential) => IssuerResponse {
                status: 200,
                body: serde_json::to_value(&credential).unwrap_or(Value::Null),
            },
            Err(err) => {
                if err.status_code() >= 500 {
                    tracing::error!(error = %err, "upload URL signing failed");
                } else {
                    tracing::info!(error = %err, "rejected upload URL request");
                }
                IssuerResponse {
                    status: err.status_code(),
                    body: serde_json::to_value(err.body()).unwrap_or(Value::Null),
                }
            }
        }
    }
}
