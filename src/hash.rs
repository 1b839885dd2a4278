//! MD5 content fingerprints
//!
//! Fingerprints are recorded in the scan log only; duplicate detection at
//! move time compares sizes, not digests.

use tracing::trace;

/// Hex-encoded MD5 digest of the given bytes
pub fn fingerprint(data: &[u8]) -> String {
    let digest = format!("{:x}", md5::compute(data));
    trace!(len = data.len(), %digest, "Computed fingerprint");
    digest
}
