//! Format detection and parsing pipeline
//!
//! Competing format-specific parsers implement [`PublicationParser`]; the
//! [`ParserChain`] tries them in a fixed priority order and the first one
//! that both accepts the input and produces a manifest wins. New formats are
//! added by appending to the chain, never by modifying existing parsers.

mod audio;
pub mod epub;

use std::sync::Arc;

use crate::drm::DrmContext;
use crate::error::{AppError, Result};
use crate::fetcher::Fetcher;
use crate::model::{Components, FileFormat};

pub use audio::AudioParser;
pub use epub::EpubParser;

/// Descriptor of the package handed to the chain: the original file name and
/// the archive kind declared by the caller, when known.
#[derive(Debug, Clone)]
pub struct SourceFile {
    pub name: String,
    pub format: Option<FileFormat>,
}

impl SourceFile {
    pub fn new(name: impl Into<String>, format: Option<FileFormat>) -> Self {
        Self {
            name: name.into(),
            format,
        }
    }
}

/// A format-specific publication parser.
pub trait PublicationParser: Send + Sync {
    /// Side-effect-free predicate deciding whether this parser claims the
    /// input. Must be fast and must not consume the fetcher's state.
    fn accepts(&self, source: &SourceFile, fetcher: &dyn Fetcher) -> bool;

    /// Build the publication, or return `Ok(None)` when, despite accepting,
    /// no valid content was found (e.g. empty reading order). `None` is not
    /// an error; it defers to the next parser in the chain. Errors are
    /// reserved for unambiguous corruption.
    fn parse(
        &self,
        source: &SourceFile,
        fetcher: Arc<dyn Fetcher>,
        drm: &DrmContext,
        fallback_title: &str,
    ) -> Result<Option<Components>>;
}

/// Ordered set of parsers with first-accept dispatch.
pub struct ParserChain {
    parsers: Vec<Box<dyn PublicationParser>>,
}

impl Default for ParserChain {
    fn default() -> Self {
        Self::new()
    }
}

impl ParserChain {
    /// The default chain: EPUB first (it has an unambiguous container
    /// signature), then the audiobook parser.
    pub fn new() -> Self {
        Self::with_parsers(vec![
            Box::new(EpubParser::new()),
            Box::new(AudioParser::new()),
        ])
    }

    pub fn with_parsers(parsers: Vec<Box<dyn PublicationParser>>) -> Self {
        Self { parsers }
    }

    /// Run the chain. An accepting parser that returns `None` does not stop
    /// dispatch; the chain keeps going until a parser produces a publication
    /// or every parser has passed.
    pub fn parse(
        &self,
        source: &SourceFile,
        fetcher: Arc<dyn Fetcher>,
        drm: &DrmContext,
        fallback_title: &str,
    ) -> Result<Components> {
        for parser in &self.parsers {
            if !parser.accepts(source, fetcher.as_ref()) {
                continue;
            }
            match parser.parse(source, Arc::clone(&fetcher), drm, fallback_title)? {
                Some(components) => return Ok(components),
                None => {
                    tracing::debug!(
                        source = %source.name,
                        "parser accepted but found no content, trying next"
                    );
                }
            }
        }
        Err(AppError::UnsupportedFormat)
    }
}
