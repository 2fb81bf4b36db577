//! DRM scheme identification
//!
//! The caller asserts which rights-management brand, if any, governs a
//! publication. This influences how ambiguous encryption entries are
//! interpreted; it never decrypts anything.

/// A known, supported DRM brand.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DrmBrand {
    /// Readium Licensed Content Protection.
    Lcp,
}

impl DrmBrand {
    /// URI identifying the scheme this brand produces.
    pub fn scheme(self) -> &'static str {
        match self {
            DrmBrand::Lcp => "http://readium.org/2014/01/lcp",
        }
    }
}

/// Caller-declared DRM information for a publication.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DrmContext {
    pub brand: Option<DrmBrand>,
}

impl DrmContext {
    pub fn new(brand: DrmBrand) -> Self {
        Self { brand: Some(brand) }
    }

    /// Scheme URI of the asserted brand, when one is known.
    pub fn scheme(&self) -> Option<&'static str> {
        self.brand.map(DrmBrand::scheme)
    }
}
