//! Canonical, format-agnostic publication model
//!
//! Whatever package a publication arrived in (EPUB container, zipped
//! audiobook, plain file), parsing normalizes it into a [`Manifest`]:
//! metadata plus an ordered reading order and auxiliary link collections.
//! The manifest serializes to the Web Publication JSON shape.

mod encryption;
mod link;

use std::sync::Arc;

use serde::Serialize;

use crate::fetcher::Fetcher;

pub use encryption::EncryptionDescriptor;
pub use link::{Link, Properties};

/// Kind of package a publication was read from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileFormat {
    /// EPUB container.
    Epub,
    /// Zipped Audio Book: an unstructured archive of audio files.
    Zab,
}

/// Canonical rendering family the parsed manifest conforms to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PublicationFormat {
    Epub,
    /// Ordered sequence of audio resources.
    Audio,
}

/// Publication metadata. Format-specific fields extend this over time;
/// `title` is the only field every format must produce (falling back to a
/// caller-supplied default when the source provides none).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Metadata {
    pub title: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub identifier: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
}

impl Metadata {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            identifier: None,
            language: None,
        }
    }
}

/// The canonical publication manifest: metadata, the linear reading order,
/// auxiliary resources, and publication-level links (e.g. `self`).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Manifest {
    pub metadata: Metadata,

    #[serde(rename = "readingOrder")]
    pub reading_order: Vec<Link>,

    /// Resources that are not part of the reading order (images, styles...).
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub resources: Vec<Link>,

    /// Publication-level links; a `self` link is appended when the
    /// publication is bound to a server prefix.
    pub links: Vec<Link>,
}

impl Manifest {
    pub fn new(metadata: Metadata, reading_order: Vec<Link>) -> Self {
        Self {
            metadata,
            reading_order,
            resources: Vec::new(),
            links: Vec::new(),
        }
    }

    /// Find the package-internal link matching `href`. Comparison is
    /// case-insensitive on the path string.
    pub fn link_with_href(&self, href: &str) -> Option<&Link> {
        self.reading_order
            .iter()
            .chain(self.resources.iter())
            .find(|l| l.href.eq_ignore_ascii_case(href))
    }

    /// Visit every package-internal link mutably (reading order + resources).
    pub fn for_each_link_mut(&mut self, mut f: impl FnMut(&mut Link)) {
        for link in self
            .reading_order
            .iter_mut()
            .chain(self.resources.iter_mut())
        {
            f(link);
        }
    }
}

/// A format parser's output bundle: the declared formats, the manifest it
/// built, and the fetcher able to resolve the manifest's links. The bundle
/// owns the manifest; the fetcher is shared since the same instance may back
/// multiple derived views.
pub struct Components {
    pub file_format: FileFormat,
    pub publication_format: PublicationFormat,
    pub manifest: Manifest,
    pub fetcher: Arc<dyn Fetcher>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn link_lookup_is_case_insensitive() {
        let manifest = Manifest::new(
            Metadata::new("Test"),
            vec![Link::new("/Audio/Track01.mp3").with_media_type("audio/mpeg")],
        );
        assert!(manifest.link_with_href("/audio/track01.MP3").is_some());
        assert!(manifest.link_with_href("/missing.mp3").is_none());
    }

    #[test]
    fn manifest_serializes_to_webpub_shape() {
        let mut manifest = Manifest::new(
            Metadata::new("Flatland"),
            vec![Link::new("/chapter01.xhtml").with_media_type("application/xhtml+xml")],
        );
        manifest.links.push(
            Link::new("http://localhost/pub/manifest.json")
                .with_media_type("application/webpub+json")
                .with_rel("self"),
        );

        let json = serde_json::to_value(&manifest).unwrap();
        assert_eq!(json["metadata"]["title"], "Flatland");
        assert_eq!(json["readingOrder"][0]["href"], "/chapter01.xhtml");
        assert_eq!(json["links"][0]["rel"], "self");
        // No auxiliary resources: the key is omitted entirely.
        assert!(json.get("resources").is_none());
    }
}
