use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use uuid::Uuid;

use crate::validation::{is_blank, FieldError, ValidationError};

pub const MISSING_BODY_MESSAGE: &str = "Request body is required";
pub const INVALID_BODY_MESSAGE: &str = "Request body must be a JSON object";
pub const MISSING_FIELDS_MESSAGE: &str = "fileName and fileType are required";
pub const SIGNING_FAILED_MESSAGE: &str = "Failed to generate upload URL";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadRequest {
    #[serde(default)]
    pub file_name: Option<String>,
    #[serde(default)]
    pub file_type: Option<String>,
}

impl UploadRequest {
    pub fn new(file_name: impl Into<String>, file_type: impl Into<String>) -> Self {
        Self {
            file_name: Some(file_name.into()),
            file_type: Some(file_type.into()),
        }
    }

    /// Parses a raw request body. Non-string field values count as absent so
    /// they surface as a missing-field error.
    pub fn from_body(body: Option<&str>) -> Result<Self, UploadError> {
        let Some(body) = body.filter(|body| !body.trim().is_empty()) else {
            return Err(UploadError::MissingBody);
        };
        let value: Value = serde_json::from_str(body).map_err(|_| UploadError::InvalidBody)?;
        let Value::Object(obj) = value else {
            return Err(UploadError::InvalidBody);
        };
        let text = |key: &str| obj.get(key).and_then(Value::as_str).map(str::to_string);
        Ok(Self {
            file_name: text("fileName"),
            file_type: text("fileType"),
        })
    }

    /// Presence check only; content and size are not inspected here.
    pub fn validate(&self) -> Result<(&str, &str), ValidationError> {
        let mut fields = Vec::new();
        if is_blank(self.file_name.as_deref()) {
            fields.push(FieldError::new("fileName", "fileName is required"));
        }
        if is_blank(self.file_type.as_deref()) {
            fields.push(FieldError::new("fileType", "fileType is required"));
        }
        match (self.file_name.as_deref(), self.file_type.as_deref()) {
            (Some(name), Some(kind)) if fields.is_empty() => Ok((name.trim(), kind.trim())),
            _ => Err(ValidationError { fields }),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadCredential {
    pub upload_url: String,
    pub file_url: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SigningError {
    #[error("signing credentials are not configured")]
    MissingCredentials,
    #[error("signing failed: {0}")]
    Provider(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum UploadError {
    #[error("Request body is required")]
    MissingBody,
    #[error("Request body must be a JSON object")]
    InvalidBody,
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Signing(#[from] SigningError),
}

impl UploadError {
    pub fn status_code(&self) -> u16 {
        match self {
            UploadError::MissingBody | UploadError::InvalidBody | UploadError::Validation(_) => {
                400
            }
            UploadError::Signing(_) => 500,
        }
    }

    /// Text placed in the `{ error }` response body. Signing details stay in
    /// the server log.
    pub fn public_message(&self) -> &'static str {
        match self {
            UploadError::MissingBody => MISSING_BODY_MESSAGE,
            UploadError::InvalidBody => INVALID_BODY_MESSAGE,
            UploadError::Validation(_) => MISSING_FIELDS_MESSAGE,
            UploadError::Signing(_) => SIGNING_FAILED_MESSAGE,
        }
    }

    pub fn body(&self) -> ErrorBody {
        ErrorBody {
            error: self.public_message().to_string(),
        }
    }
}

/// Lower-cased alphanumeric extension after the last dot, if any.
pub fn file_extension(file_name: &str) -> Option<String> {
    let (_, ext) = file_name.trim().rsplit_once('.')?;
    let cleaned: String = ext
        .chars()
        .filter(char::is_ascii_alphanumeric)
        .collect::<String>()
        .to_ascii_lowercase();
    if cleaned.is_empty() {
        return None;
    }
    Some(cleaned)
}

/// Fresh uuid key. The extension is normalized through `file_extension`
/// (`Photo.JPG` gives `<uuid>.jpg`), so it may differ from the one the
/// client sent.
pub fn storage_key(file_name: &str) -> String {
    storage_key_with_id(Uuid::new_v4(), file_name)
}

pub fn storage_key_with_id(id: Uuid, file_name: &str) -> String {
    match file_extension(file_name) {
        Some(ext) => format!("{id}.{ext}"),
        None => id.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use uuid::Uuid;

    use super::{
        file_extension, storage_key, storage_key_with_id, UploadError, UploadRequest,
        MISSING_FIELDS_MESSAGE,
    };

    #[test]
    fn from_body_distinguishes_missing_and_invalid_bodies() {
        assert_eq!(UploadRequest::from_body(None), Err(UploadError::MissingBody));
        assert_eq!(UploadRequest::from_body(Some("  ")), Err(UploadError::MissingBody));
        assert_eq!(
            UploadRequest::from_body(Some("{not json")),
            Err(UploadError::InvalidBody)
        );
        assert_eq!(
            UploadRequest::from_body(Some("[1]")),
            Err(UploadError::InvalidBody)
        );
    }

    #[test]
    fn validate_requires_both_fields() {
        let request = UploadRequest::from_body(Some(r#"{"fileName": "me.jpg"}"#)).unwrap();
        let err = request.validate().unwrap_err();
        assert_eq!(err.message_for("fileType"), Some("fileType is required"));
        assert_eq!(err.message_for("fileName"), None);

        let request = UploadRequest::from_body(Some(r#"{"fileName": 3, "fileType": ""}"#)).unwrap();
        let err = UploadError::from(request.validate().unwrap_err());
        assert_eq!(err.status_code(), 400);
        assert_eq!(err.public_message(), MISSING_FIELDS_MESSAGE);

        let request = UploadRequest::new(" me.jpg ", "image/jpeg");
        assert_eq!(request.validate().unwrap(), ("me.jpg", "image/jpeg"));
    }

    #[test]
    fn storage_key_keeps_only_a_clean_extension() {
        let id = Uuid::nil();
        assert_eq!(
            storage_key_with_id(id, "Holiday Photo.JPG"),
            "00000000-0000-0000-0000-000000000000.jpg"
        );
        assert_eq!(
            storage_key_with_id(id, "noext"),
            "00000000-0000-0000-0000-000000000000"
        );
        assert_eq!(file_extension("archive.tar.gz"), Some("gz".to_string()));
        assert_eq!(file_extension("weird.p/n?g"), Some("png".to_string()));
        assert_eq!(file_extension("trailing."), None);
    }

    #[test]
    fn storage_keys_are_unique_and_leak_no_name() {
        let first = storage_key("alice-smith.png");
        let second = storage_key("alice-smith.png");
        assert_ne!(first, second);
        assert!(!first.contains("alice"));
        assert!(first.ends_with(".png"));
        assert!(storage_key("Photo.JPG").ends_with(".jpg"));
    }
}
