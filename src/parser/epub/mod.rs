//! EPUB container parser
//!
//! Reads just enough of the container to build the canonical manifest: the
//! `container.xml` rootfile, the package document's title, manifest items and
//! spine, plus `META-INF/encryption.xml` when present. The full OPF grammar
//! (collections, media overlays, fixed layout...) is out of scope.
//!
//! Like the encryption manifest, package documents arrive with and without
//! namespace prefixes, so elements are matched by local name.

mod encryption;

use std::sync::Arc;

use quick_xml::events::Event;
use quick_xml::Reader;

use crate::drm::DrmContext;
use crate::error::{AppError, Result};
use crate::fetcher::Fetcher;
use crate::model::{Components, FileFormat, Link, Manifest, Metadata, PublicationFormat};
use crate::parser::{PublicationParser, SourceFile};

pub use encryption::parse_encryption;

const CONTAINER_PATH: &str = "/META-INF/container.xml";
const ENCRYPTION_PATH: &str = "/META-INF/encryption.xml";
const MIMETYPE_PATH: &str = "/mimetype";
const EPUB_MIMETYPE: &str = "application/epub+zip";

#[derive(Default)]
pub struct EpubParser;

impl EpubParser {
    pub fn new() -> Self {
        Self
    }
}

impl PublicationParser for EpubParser {
    fn accepts(&self, source: &SourceFile, fetcher: &dyn Fetcher) -> bool {
        if source.format == Some(FileFormat::Epub) {
            return true;
        }
        if fetcher
            .links()
            .iter()
            .any(|l| l.href.eq_ignore_ascii_case(CONTAINER_PATH))
        {
            return true;
        }
        // EPUB OCF requires a `mimetype` entry with this exact value.
        fetcher
            .read(MIMETYPE_PATH, None)
            .ok()
            .and_then(|data| String::from_utf8(data).ok())
            .is_some_and(|s| s.trim() == EPUB_MIMETYPE)
    }

    fn parse(
        &self,
        source: &SourceFile,
        fetcher: Arc<dyn Fetcher>,
        drm: &DrmContext,
        fallback_title: &str,
    ) -> Result<Option<Components>> {
        if !self.accepts(source, fetcher.as_ref()) {
            return Ok(None);
        }

        let container = match fetcher.read(CONTAINER_PATH, None) {
            Ok(data) => data,
            // Declared as EPUB but there is no container document; let the
            // rest of the chain have a go.
            Err(AppError::ResourceNotFound(_)) => return Ok(None),
            Err(e) => return Err(e),
        };

        let opf_path = rootfile_path(&container)?;
        let opf = fetcher
            .read(&opf_path, None)
            .map_err(|e| AppError::Parse(format!("cannot read package document {opf_path}: {e}")))?;

        let package = parse_package(&opf, &opf_path)?;
        if package.reading_order.is_empty() {
            return Ok(None);
        }

        let mut metadata = Metadata::new(match package.title {
            Some(title) if !title.is_empty() => title,
            _ => fallback_title.to_string(),
        });
        metadata.identifier = package.identifier;
        metadata.language = package.language;

        let mut manifest = Manifest::new(metadata, package.reading_order);
        manifest.resources = package.resources;

        if let Ok(data) = fetcher.read(ENCRYPTION_PATH, None) {
            let encryptions = parse_encryption(&data, drm)?;
            manifest.for_each_link_mut(|link| {
                if let Some(descriptor) = encryptions
                    .iter()
                    .find(|(path, _)| path.eq_ignore_ascii_case(&link.href))
                    .map(|(_, d)| d.clone())
                {
                    link.properties.encryption = Some(descriptor);
                }
            });
        }

        Ok(Some(Components {
            file_format: FileFormat::Epub,
            publication_format: PublicationFormat::Epub,
            manifest,
            fetcher,
        }))
    }
}

/// Extract the first rootfile path from `container.xml`.
fn rootfile_path(data: &[u8]) -> Result<String> {
    let text = std::str::from_utf8(data)
        .map_err(|e| AppError::Parse(format!("container.xml is not UTF-8: {e}")))?;
    let mut reader = Reader::from_str(text);
    reader.trim_text(true);

    loop {
        match reader
            .read_event()
            .map_err(|e| AppError::Parse(format!("invalid container.xml: {e}")))?
        {
            Event::Start(ref e) | Event::Empty(ref e)
                if e.local_name().as_ref() == b"rootfile" =>
            {
                if let Some(path) = local_attr(e, b"full-path") {
                    return Ok(format!("/{}", path.trim_start_matches('/')));
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }
    Err(AppError::Parse("container.xml declares no rootfile".into()))
}

fn local_attr(element: &quick_xml::events::BytesStart, name: &[u8]) -> Option<String> {
    element
        .attributes()
        .with_checks(false)
        .flatten()
        .find(|a| a.key.local_name().as_ref() == name)
        .and_then(|a| a.unescape_value().ok())
        .map(|v| v.into_owned())
}

struct ManifestItem {
    id: String,
    href: String,
    media_type: Option<String>,
}

struct Package {
    title: Option<String>,
    identifier: Option<String>,
    language: Option<String>,
    reading_order: Vec<Link>,
    resources: Vec<Link>,
}

/// Fields whose element text we capture while walking the package document.
#[derive(Clone, Copy, PartialEq)]
enum TextField {
    Title,
    Identifier,
    Language,
}

/// Minimal package-document read: dc metadata text, manifest items, spine.
fn parse_package(data: &[u8], opf_path: &str) -> Result<Package> {
    let text = std::str::from_utf8(data)
        .map_err(|e| AppError::Parse(format!("package document is not UTF-8: {e}")))?;
    let mut reader = Reader::from_str(text);
    reader.trim_text(true);

    let mut title = None;
    let mut identifier = None;
    let mut language = None;
    let mut items: Vec<ManifestItem> = Vec::new();
    let mut spine_idrefs: Vec<String> = Vec::new();
    let mut capture: Option<TextField> = None;

    loop {
        let event = reader
            .read_event()
            .map_err(|e| AppError::Parse(format!("invalid package document: {e}")))?;
        // Text capture only makes sense after an opening tag; a self-closing
        // metadata element has no text of its own.
        let is_start = matches!(event, Event::Start(_));
        match event {
            // Manifest and spine elements are usually self-closing, but some
            // producers emit them with explicit end tags.
            Event::Start(ref e) | Event::Empty(ref e) => match e.local_name().as_ref() {
                b"title" if title.is_none() && is_start => capture = Some(TextField::Title),
                b"identifier" if identifier.is_none() && is_start => {
                    capture = Some(TextField::Identifier)
                }
                b"language" if language.is_none() && is_start => {
                    capture = Some(TextField::Language)
                }
                b"item" => {
                    if let (Some(id), Some(href)) = (local_attr(e, b"id"), local_attr(e, b"href"))
                    {
                        items.push(ManifestItem {
                            id,
                            media_type: local_attr(e, b"media-type"),
                            href,
                        });
                    }
                }
                b"itemref" => {
                    if let Some(idref) = local_attr(e, b"idref") {
                        spine_idrefs.push(idref);
                    }
                }
                _ => {}
            },
            Event::Text(ref t) => {
                if let Some(field) = capture {
                    let value = t
                        .unescape()
                        .map_err(|e| AppError::Parse(format!("invalid package document: {e}")))?
                        .into_owned();
                    match field {
                        TextField::Title => title = Some(value),
                        TextField::Identifier => identifier = Some(value),
                        TextField::Language => language = Some(value),
                    }
                }
            }
            Event::End(_) => capture = None,
            Event::Eof => break,
            _ => {}
        }
    }

    let to_link = |item: &ManifestItem| {
        let href = resolve_href(opf_path, &item.href);
        let mut link = Link::new(href);
        link.media_type = item.media_type.clone().or_else(|| {
            mime_guess::from_path(&item.href)
                .first_raw()
                .map(str::to_string)
        });
        link
    };

    let mut reading_order = Vec::with_capacity(spine_idrefs.len());
    for idref in &spine_idrefs {
        match items.iter().find(|item| &item.id == idref) {
            Some(item) => reading_order.push(to_link(item)),
            None => tracing::warn!(idref, "spine references a missing manifest item"),
        }
    }

    let resources = items
        .iter()
        .filter(|item| !spine_idrefs.contains(&item.id))
        .map(to_link)
        .collect();

    Ok(Package {
        title,
        identifier,
        language,
        reading_order,
        resources,
    })
}

/// Resolve a manifest href against the package document's directory into a
/// root-relative path, collapsing `.` and `..` segments.
fn resolve_href(opf_path: &str, href: &str) -> String {
    let decoded = urlencoding::decode(href)
        .map(|c| c.into_owned())
        .unwrap_or_else(|_| href.to_string());

    let opf_dir = opf_path
        .trim_start_matches('/')
        .rsplit_once('/')
        .map(|(dir, _)| dir)
        .unwrap_or("");

    let mut segments: Vec<&str> = opf_dir.split('/').filter(|s| !s.is_empty()).collect();
    for segment in decoded.trim_start_matches('/').split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                segments.pop();
            }
            other => segments.push(other),
        }
    }
    format!("/{}", segments.join("/"))
}
