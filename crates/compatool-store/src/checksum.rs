use crate::StoreError;
use compatool_catalog::ArtifactDescriptor;
use sha2::{Digest, Sha512};
use std::fs::File;
use std::io::Read;
use std::path::Path;

/// Lowercase hex SHA-512 of a file, streamed.
pub fn sha512_file(path: &Path) -> Result<String, StoreError> {
    let mut file = File::open(path)?;
    let mut hasher = Sha512::new();
    let mut buf = [0u8; 64 * 1024];
    loop {
        let n = file.read(&mut buf)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(hex::encode(hasher.finalize()))
}

/// True when `actual` equals any entry, ignoring case.
pub fn checksum_matches(actual: &str, checksums: &[String]) -> bool {
    checksums.iter().any(|c| c.eq_ignore_ascii_case(actual))
}

/// Verify a downloaded artifact against its descriptor.
///
/// Descriptors without checksums are accepted without hashing.
pub fn verify_artifact(path: &Path, descriptor: &ArtifactDescriptor) -> Result<(), StoreError> {
    if !descriptor.is_verified() {
        tracing::warn!(
            "{} {} has no published checksum; accepting unverified download",
            descriptor.kind,
            descriptor.name
        );
        return Ok(());
    }

    let actual = sha512_file(path)?;
    if checksum_matches(&actual, &descriptor.checksums) {
        tracing::debug!("checksum verified for {}", descriptor.name);
        Ok(())
    } else {
        Err(StoreError::ChecksumMismatch {
            artifact: descriptor.name.clone(),
            actual,
            expected: descriptor.checksums.clone(),
        })
    }
}
