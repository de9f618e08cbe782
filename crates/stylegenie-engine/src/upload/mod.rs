mod issuer;
mod signer;

pub use issuer::{IssuerResponse, UploadUrlIssuer, CORS_HEADERS};
pub use signer::{
    S3PresignSigner, SigningCredentials, UrlSigner, ACCESS_KEY_ENV, SECRET_KEY_ENV,
    SESSION_TOKEN_ENV,
};

use crate::config::UploadConfig;

/// Issuer backed by the configured bucket and whatever signing credentials
/// the environment provides. Missing credentials surface per request as a
/// signing failure.
pub fn issuer_from_config(config: &UploadConfig) -> UploadUrlIssuer<S3PresignSigner> {
    let signer = S3PresignSigner::new(
        config.bucket.clone(),
        config.region.clone(),
        SigningCredentials::from_env(),
    )
    .with_public_base_url(config.public_base_url.clone());
    UploadUrlIssuer::new(signer, config.expires_in_s())
}
