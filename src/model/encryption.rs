//! Per-resource encryption metadata
//!
//! Describes *where* encryption applies and how the resource was transformed
//! before encryption. Decryption itself is delegated to a DRM-specific
//! collaborator and never happens here.

use serde::Serialize;

/// Encryption descriptor attached to a publication resource.
///
/// Built once by the encryption manifest parser and never mutated afterward.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EncryptionDescriptor {
    /// URI identifying the cipher, e.g.
    /// `http://www.w3.org/2001/04/xmlenc#aes256-cbc`.
    pub algorithm: String,

    /// Name of the compression applied before encryption ("deflate", "none").
    /// Absent means the resource was stored as-is.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub compression: Option<String>,

    /// Decompressed byte length, when the manifest declares it.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub original_length: Option<u64>,

    /// DRM-scheme-specific profile URI.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub profile: Option<String>,

    /// URI of the DRM scheme that produced this encryption. Only populated
    /// when the caller asserted a known scheme via [`DrmContext`];
    /// absent for unrecognized or unaffiliated schemes.
    ///
    /// [`DrmContext`]: crate::drm::DrmContext
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scheme: Option<String>,
}
