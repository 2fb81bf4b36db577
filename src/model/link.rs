//! Resource references within a publication

use serde::Serialize;

use super::encryption::EncryptionDescriptor;

/// Open property bag carried by a [`Link`].
///
/// The property set is fixed and fully enumerated, so this is a struct of
/// optionals rather than an open dictionary.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Properties {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub encryption: Option<EncryptionDescriptor>,
}

impl Properties {
    pub fn is_empty(&self) -> bool {
        self.encryption.is_none()
    }
}

/// A reference to a resource, either within the publication package
/// (root-relative href such as `/chapter01.xhtml`) or external (absolute URL,
/// e.g. the `self` link).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Link {
    pub href: String,

    /// Media type classifying the resource kind, e.g. `audio/mpeg`.
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub media_type: Option<String>,

    /// Relation of this link to the publication, e.g. `self`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rel: Option<String>,

    #[serde(skip_serializing_if = "Properties::is_empty")]
    pub properties: Properties,
}

impl Link {
    pub fn new(href: impl Into<String>) -> Self {
        Self {
            href: href.into(),
            media_type: None,
            rel: None,
            properties: Properties::default(),
        }
    }

    pub fn with_media_type(mut self, media_type: impl Into<String>) -> Self {
        self.media_type = Some(media_type.into());
        self
    }

    pub fn with_rel(mut self, rel: impl Into<String>) -> Self {
        self.rel = Some(rel.into());
        self
    }

    /// Last path component of the href.
    pub fn file_name(&self) -> &str {
        self.href.rsplit('/').next().unwrap_or(&self.href)
    }

    /// Lowercased extension of the href, if any.
    pub fn extension(&self) -> Option<String> {
        let name = self.file_name();
        let (stem, ext) = name.rsplit_once('.')?;
        if stem.is_empty() {
            // Dotfiles like `.DS_Store` have no extension.
            return None;
        }
        Some(ext.to_ascii_lowercase())
    }

    /// Whether this resource is audio content, per its media type.
    pub fn is_audio(&self) -> bool {
        self.media_type
            .as_deref()
            .is_some_and(|t| t.starts_with("audio/"))
    }
}
