use std::fs;
use std::path::Path;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use image::ImageFormat;
use reqwest::blocking::Client as HttpClient;
use reqwest::header::{ACCEPT, CONTENT_TYPE};
use serde_json::json;
use stylegenie_contracts::events::{EventWriter, PHOTO_UPLOAD_FAILED};
use stylegenie_contracts::upload::{ErrorBody, UploadCredential, UploadRequest};
use thiserror::Error;

use crate::config::UploadConfig;
use crate::upload::{issuer_from_config, SigningCredentials, UploadUrlIssuer, UrlSigner};
use crate::{error_chain_text, truncate_text};

pub const UPLOAD_FAILURE_MESSAGE: &str =
    "Your photo couldn't be uploaded; the local preview will be used instead.";
pub const UPLOAD_DISABLED_MESSAGE: &str =
    "Photo upload is not configured; the local preview will be used instead.";

const UPLOAD_TIMEOUT: Duration = Duration::from_secs(60);

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PhotoError {
    #[error("failed reading photo {path}: {reason}")]
    Read { path: String, reason: String },
    #[error("photo is empty")]
    Empty,
    #[error("photo is {size} bytes; the limit is {limit} bytes")]
    TooLarge { size: u64, limit: u64 },
    #[error("photo must be a PNG, JPEG, GIF or WebP image")]
    UnsupportedFormat,
}

/// A photo read from disk and checked against the size limit and the
/// accepted image formats.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalPhoto {
    pub file_name: String,
    pub mime_type: &'static str,
    pub bytes: Vec<u8>,
}

impl LocalPhoto {
    pub fn load(path: &Path, max_bytes: u64) -> Result<Self, PhotoError> {
        let read_error = |err: std::io::Error| PhotoError::Read {
            path: path.display().to_string(),
            reason: err.to_string(),
        };
        let size = fs::metadata(path).map_err(read_error)?.len();
        if size > max_bytes {
            return Err(PhotoError::TooLarge {
                size,
                limit: max_bytes,
            });
        }
        let bytes = fs::read(path).map_err(read_error)?;
        let file_name = path
            .file_name()
            .map(|name| name.to_string_lossy().to_string())
            .unwrap_or_else(|| "photo".to_string());
        Self::from_bytes(file_name, bytes, max_bytes)
    }

    pub fn from_bytes(
        file_name: impl Into<String>,
        bytes: Vec<u8>,
        max_bytes: u64,
    ) -> Result<Self, PhotoError> {
        if bytes.is_empty() {
            return Err(PhotoError::Empty);
        }
        let size = bytes.len() as u64;
        if size > max_bytes {
            return Err(PhotoError::TooLarge {
                size,
                limit: max_bytes,
            });
        }
        let mime_type = match image::guess_format(&bytes) {
            Ok(
                format @ (ImageFormat::Png
                | ImageFormat::Jpeg
                | ImageFormat::Gif
                | ImageFormat::WebP),
            ) => format.to_mime_type(),
            _ => return Err(PhotoError::UnsupportedFormat),
        };
        Ok(Self {
            file_name: file_name.into(),
            mime_type,
            bytes,
        })
    }

    pub fn data_url(&self) -> String {
        format!("data:{};base64,{}", self.mime_type, BASE64.encode(&self.bytes))
    }

    pub fn upload_request(&self) -> UploadRequest {
        UploadRequest::new(self.file_name.clone(), self.mime_type)
    }
}

/// Where upload credentials come from.
pub trait CredentialSource: Send + Sync {
    fn credential(&self, request: &UploadRequest) -> Result<UploadCredential>;
}

impl<S: UrlSigner> CredentialSource for UploadUrlIssuer<S> {
    fn credential(&self, request: &UploadRequest) -> Result<UploadCredential> {
        Ok(self.issue(request)?)
    }
}

/// Calls a deployed `POST /getUploadUrl` endpoint.
pub struct RemoteIssuer {
    url: String,
    http: HttpClient,
}

impl RemoteIssuer {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let http = HttpClient::builder()
            .timeout(timeout)
            .build()
            .context("failed building HTTP client")?;
        Ok(Self {
            url: url.into(),
            http,
        })
    }
}

impl CredentialSource for RemoteIssuer {
    fn credential(&self, request: &UploadRequest) -> Result<UploadCredential> {
        let response = self
            .http
            .post(&self.url)
            .header(ACCEPT, "application/json")
            .json(request)
            .send()
            .with_context(|| format!("upload URL request failed ({})", self.url))?;
        let status = response.status();
        let body = response
            .text()
            .context("upload URL response body read failed")?;
        if !status.is_success() {
            let detail = serde_json::from_str::<ErrorBody>(&body)
                .map(|parsed| parsed.error)
                .unwrap_or_else(|_| truncate_text(body.trim(), 256));
            bail!("upload URL request failed ({}): {detail}", status.as_u16());
        }
        serde_json::from_str(&body).context("upload URL response is not a credential")
    }
}

/// Obtains a credential and writes the photo bytes to storage.
pub struct PhotoUploader {
    credentials: Box<dyn CredentialSource>,
    http: HttpClient,
}

impl PhotoUploader {
    pub fn new(credentials: Box<dyn CredentialSource>) -> Result<Self> {
        let http = HttpClient::builder()
            .timeout(UPLOAD_TIMEOUT)
            .build()
            .context("failed building HTTP client")?;
        Ok(Self { credentials, http })
    }

    /// Remote issuer when one is configured, otherwise the in-process issuer
    /// if signing credentials are present. `None` disables uploads.
    pub fn from_config(config: &UploadConfig, timeout: Duration) -> Result<Option<Self>> {
        if let Some(url) = config
            .issuer_url
            .as_deref()
            .map(str::trim)
            .filter(|url| !url.is_empty())
        {
            let issuer = RemoteIssuer::new(url, timeout)?;
            return Ok(Some(Self::new(Box::new(issuer))?));
        }
        if SigningCredentials::from_env().is_none() {
            return Ok(None);
        }
        Ok(Some(Self::new(Box::new(issuer_from_config(config)))?))
    }

    pub fn upload(&self, photo: &LocalPhoto) -> Result<UploadCredential> {
        let credential = self.credentials.credential(&photo.upload_request())?;
        let response = self
            .http
            .put(&credential.upload_url)
            .header(CONTENT_TYPE, photo.mime_type)
            .body(photo.bytes.clone())
            .send()
            .context("photo upload request failed")?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            bail!(
                "photo upload failed ({}): {}",
                status.as_u16(),
                truncate_text(body.trim(), 256)
            );
        }
        Ok(credential)
    }
}

/// A photo attached to the form. The preview always exists; the remote URL
/// only when the upload went through.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PhotoAttachment {
    pub file_name: String,
    pub preview_data_url: String,
    pub remote_url: Option<String>,
    pub warning: Option<&'static str>,
}

impl PhotoAttachment {
    /// Value sent as `photo` in the styling request.
    pub fn reference(&self) -> &str {
        self.remote_url
            .as_deref()
            .unwrap_or(&self.preview_data_url)
    }
}

/// Uploads when possible. Upload problems never fail the attachment; they
/// degrade to the local preview with a warning.
pub fn attach_photo(
    photo: &LocalPhoto,
    uploader: Option<&PhotoUploader>,
    events: Option<&EventWriter>,
) -> PhotoAttachment {
    let mut attachment = PhotoAttachment {
        file_name: photo.file_name.clone(),
        preview_data_url: photo.data_url(),
        remote_url: None,
        warning: None,
    };
    let Some(uploader) = uploader else {
        attachment.warning = Some(UPLOAD_DISABLED_MESSAGE);
        return attachment;
    };
    match uploader.upload(photo) {
        Ok(credential) => {
            tracing::info!(file_url = %credential.file_url, "photo uploaded");
            attachment.remote_url = Some(credential.file_url);
        }
        Err(err) => {
            let detail = error_chain_text(&err, 512);
            tracing::warn!(file = %photo.file_name, error = %detail, "photo upload failed");
            if let Some(events) = events {
                let payload = json!({ "file_name": photo.file_name, "error": detail });
                if let Err(err) = events.emit_json(PHOTO_UPLOAD_FAILED, payload) {
                    tracing::warn!(error = %err, "failed writing photo event");
                }
            }
            attachment.warning = Some(UPLOAD_FAILURE_MESSAGE);
        }
    }
    attachment
}

#[cfg(test)]
mod tests {
    use std::fs;
    use std::time::Duration;

    use anyhow::bail;
    use stylegenie_contracts::upload::{UploadCredential, UploadRequest};

    use super::{
        attach_photo, CredentialSource, LocalPhoto, PhotoError, PhotoUploader, RemoteIssuer,
        UPLOAD_DISABLED_MESSAGE, UPLOAD_FAILURE_MESSAGE,
    };
    use crate::transport::tests::serve_replies;

    const PNG_MAGIC: &[u8] = b"\x89PNG\r\n\x1a\n\x00\x00\x00\rIHDR";

    struct FixedCredential(String);

    impl CredentialSource for FixedCredential {
        fn credential(&self, _request: &UploadRequest) -> anyhow::Result<UploadCredential> {
            Ok(UploadCredential {
                upload_url: self.0.clone(),
                file_url: "https://store.test/abc.png".to_string(),
            })
        }
    }

    struct FailingCredential;

    impl CredentialSource for FailingCredential {
        fn credential(&self, _request: &UploadRequest) -> anyhow::Result<UploadCredential> {
            bail!("issuer unavailable")
        }
    }

    fn png() -> anyhow::Result<LocalPhoto> {
        Ok(LocalPhoto::from_bytes("me.png", PNG_MAGIC.to_vec(), 1024)?)
    }

    #[test]
    fn load_checks_size_and_format() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let good = temp.path().join("me.png");
        fs::write(&good, PNG_MAGIC)?;
        let photo = LocalPhoto::load(&good, 1024)?;
        assert_eq!(photo.file_name, "me.png");
        assert_eq!(photo.mime_type, "image/png");
        assert!(photo.data_url().starts_with("data:image/png;base64,iVBORw0KGgo"));

        let big = temp.path().join("big.png");
        fs::write(&big, vec![0u8; 2048])?;
        assert_eq!(
            LocalPhoto::load(&big, 1024),
            Err(PhotoError::TooLarge {
                size: 2048,
                limit: 1024
            })
        );

        let text = temp.path().join("notes.png");
        fs::write(&text, b"hello there")?;
        assert_eq!(
            LocalPhoto::load(&text, 1024),
            Err(PhotoError::UnsupportedFormat)
        );

        assert_eq!(
            LocalPhoto::from_bytes("empty.png", Vec::new(), 1024),
            Err(PhotoError::Empty)
        );
        assert!(matches!(
            LocalPhoto::load(&temp.path().join("missing.png"), 1024),
            Err(PhotoError::Read { .. })
        ));
        Ok(())
    }

    #[test]
    fn attach_without_uploader_keeps_preview() -> anyhow::Result<()> {
        let photo = png()?;
        let attachment = attach_photo(&photo, None, None);
        assert_eq!(attachment.reference(), photo.data_url());
        assert_eq!(attachment.warning, Some(UPLOAD_DISABLED_MESSAGE));
        Ok(())
    }

    #[test]
    fn attach_uploads_bytes_with_declared_content_type() -> anyhow::Result<()> {
        let (put_url, handle) = serve_replies(vec![(200, "")])?;
        let uploader = PhotoUploader::new(Box::new(FixedCredential(put_url)))?;
        let attachment = attach_photo(&png()?, Some(&uploader), None);
        assert_eq!(attachment.reference(), "https://store.test/abc.png");
        assert_eq!(attachment.warning, None);

        let seen = handle
            .join()
            .map_err(|_| anyhow::anyhow!("server panicked"))?;
        let request = seen[0].to_ascii_lowercase();
        assert!(request.starts_with("put /outfits"));
        assert!(request.contains("content-type: image/png"));
        Ok(())
    }

    #[test]
    fn failed_upload_degrades_to_preview_and_logs_event() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let events_path = temp.path().join("events.jsonl");
        let events = stylegenie_contracts::events::EventWriter::new(&events_path, "s-1");
        let uploader = PhotoUploader::new(Box::new(FailingCredential))?;
        let photo = png()?;
        let attachment = attach_photo(&photo, Some(&uploader), Some(&events));
        assert_eq!(attachment.reference(), photo.data_url());
        assert_eq!(attachment.warning, Some(UPLOAD_FAILURE_MESSAGE));

        let raw = fs::read_to_string(events_path)?;
        assert!(raw.contains("photo_upload_failed"));
        assert!(raw.contains("issuer unavailable"));
        Ok(())
    }

    #[test]
    fn rejected_put_counts_as_upload_failure() -> anyhow::Result<()> {
        let (put_url, handle) = serve_replies(vec![(403, "<Error>AccessDenied</Error>")])?;
        let uploader = PhotoUploader::new(Box::new(FixedCredential(put_url)))?;
        let err = uploader.upload(&png()?).unwrap_err();
        assert!(err.to_string().contains("photo upload failed (403)"));
        handle
            .join()
            .map_err(|_| anyhow::anyhow!("server panicked"))?;
        Ok(())
    }

    #[test]
    fn remote_issuer_parses_credentials_and_errors() -> anyhow::Result<()> {
        let (url, handle) = serve_replies(vec![
            (
                200,
                r#"{"uploadUrl": "https://store.test/put", "fileUrl": "https://store.test/k.png"}"#,
            ),
            (400, r#"{"error": "fileName and fileType are required"}"#),
        ])?;
        let issuer = RemoteIssuer::new(url, Duration::from_secs(5))?;
        let credential = issuer.credential(&UploadRequest::new("k.png", "image/png"))?;
        assert_eq!(credential.file_url, "https://store.test/k.png");

        let err = issuer
            .credential(&UploadRequest::default())
            .unwrap_err();
        assert!(err
            .to_string()
            .contains("(400): fileName and fileType are required"));

        let seen = handle
            .join()
            .map_err(|_| anyhow::anyhow!("server panicked"))?;
        assert!(seen[0].contains(r#""fileName":"k.png""#));
        assert!(seen[0].contains(r#""fileType":"image/png""#));
        Ok(())
    }
}
