//! Proof-of-payment uploads. The blob goes to the configured bucket; the
//! payment row only ever stores the returned reference.

use aws_sdk_s3::primitives::ByteStream;
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::error::{AppError, AppResult, DomainError};
use crate::state::AppState;

const ALLOWED_TYPES: &[(&str, &str)] = &[
    ("image/jpeg", "jpg"),
    ("image/png", "png"),
    ("application/pdf", "pdf"),
];

/// Validates size and MIME type, returning the file extension to store
/// under. Accepts JPEG, PNG and PDF up to the configured limit.
pub fn validate_proof(content_type: &str, size: usize, max_bytes: usize) -> AppResult<&'static str> {
    if size == 0 {
        return Err(DomainError::InvalidFile("file is empty".to_string()).into());
    }
    if size > max_bytes {
        return Err(DomainError::InvalidFile(format!(
            "file size exceeds the {} MB limit",
            max_bytes / (1024 * 1024)
        ))
        .into());
    }

    let normalized = content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase();
    ALLOWED_TYPES
        .iter()
        .find(|(mime, _)| *mime == normalized)
        .map(|(_, ext)| *ext)
        .ok_or_else(|| {
            DomainError::InvalidFile(format!(
                "unsupported type '{content_type}'. Allowed: jpeg, png, pdf"
            ))
            .into()
        })
}

/// Uploads the proof blob and returns the reference to persist. Keyed by
/// content hash so re-uploads of the same file land on the same object.
pub async fn upload_proof(
    state: &AppState,
    payment_id: Uuid,
    content_type: &str,
    bytes: Vec<u8>,
) -> AppResult<String> {
    let extension = validate_proof(content_type, bytes.len(), state.config.proof_max_bytes)?;

    let bucket = state.config.proof_bucket.as_deref().ok_or_else(|| {
        AppError::Dependency("File storage is not configured. Set PROOF_BUCKET.".to_string())
    })?;

    let digest = hex_digest(&bytes);
    let key = format!("payment-proofs/{payment_id}/{digest}.{extension}");

    state
        .s3_client()
        .await
        .put_object()
        .bucket(bucket)
        .key(&key)
        .content_type(content_type)
        .body(ByteStream::from(bytes))
        .send()
        .await
        .map_err(|error| AppError::Dependency(format!("Proof upload failed: {error}")))?;

    let reference = match state.config.proof_public_base_url.as_deref() {
        Some(base) => format!("{}/{key}", base.trim_end_matches('/')),
        None => format!("s3://{bucket}/{key}"),
    };

    tracing::info!(payment_id = %payment_id, key = %key, "Proof of payment stored");
    Ok(reference)
}

fn hex_digest(bytes: &[u8]) -> String {
    let digest = Sha256::digest(bytes);
    digest.iter().map(|byte| format!("{byte:02x}")).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const MAX: usize = 5 * 1024 * 1024;

    #[test]
    fn accepts_allowed_types() {
        assert_eq!(validate_proof("image/jpeg", 1024, MAX).unwrap(), "jpg");
        assert_eq!(validate_proof("image/png", 1024, MAX).unwrap(), "png");
        assert_eq!(validate_proof("application/pdf", 1024, MAX).unwrap(), "pdf");
        assert_eq!(
            validate_proof("image/jpeg; charset=binary", 1024, MAX).unwrap(),
            "jpg"
        );
    }

    #[test]
    fn rejects_oversized_and_empty_files() {
        assert!(validate_proof("image/jpeg", MAX + 1, MAX).is_err());
        assert!(validate_proof("image/jpeg", 0, MAX).is_err());
        // Exactly at the limit is fine.
        assert!(validate_proof("image/jpeg", MAX, MAX).is_ok());
    }

    #[test]
    fn rejects_unknown_types() {
        assert!(validate_proof("image/gif", 1024, MAX).is_err());
        assert!(validate_proof("text/html", 1024, MAX).is_err());
    }

    #[test]
    fn digest_is_stable_hex() {
        let a = hex_digest(b"receipt");
        let b = hex_digest(b"receipt");
        assert_eq!(a, b);
        assert_eq!(a.len(), 64);
    }
}
