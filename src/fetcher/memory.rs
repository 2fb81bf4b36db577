//! In-memory fetcher
//!
//! Holds resources as byte vectors, preserving insertion order. Used by the
//! test suites and handy for assembling synthetic publications.

use std::ops::Range;

use super::{slice_range, Fetcher};
use crate::error::{AppError, Result};
use crate::model::Link;

#[derive(Default)]
pub struct MemoryFetcher {
    entries: Vec<(Link, Vec<u8>)>,
}

impl MemoryFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a resource. The media type is guessed from the path when not
    /// supplied explicitly via [`MemoryFetcher::add_typed`].
    pub fn add(self, href: impl Into<String>, data: impl Into<Vec<u8>>) -> Self {
        let href = href.into();
        let media_type = mime_guess::from_path(&href).first_raw().map(str::to_string);
        self.add_entry(href, media_type, data.into())
    }

    pub fn add_typed(
        self,
        href: impl Into<String>,
        media_type: impl Into<String>,
        data: impl Into<Vec<u8>>,
    ) -> Self {
        self.add_entry(href.into(), Some(media_type.into()), data.into())
    }

    fn add_entry(mut self, href: String, media_type: Option<String>, data: Vec<u8>) -> Self {
        let mut link = Link::new(format!("/{}", href.trim_start_matches('/')));
        link.media_type = media_type;
        self.entries.push((link, data));
        self
    }

    fn entry(&self, href: &str) -> Result<&(Link, Vec<u8>)> {
        self.entries
            .iter()
            .find(|(link, _)| link.href.eq_ignore_ascii_case(href))
            .ok_or_else(|| AppError::ResourceNotFound(href.to_string()))
    }
}

impl Fetcher for MemoryFetcher {
    fn links(&self) -> Vec<Link> {
        self.entries.iter().map(|(link, _)| link.clone()).collect()
    }

    fn read(&self, href: &str, range: Option<Range<u64>>) -> Result<Vec<u8>> {
        let (_, data) = self.entry(href)?;
        slice_range(href, data.clone(), range)
    }

    fn length(&self, href: &str) -> Result<u64> {
        let (_, data) = self.entry(href)?;
        Ok(data.len() as u64)
    }
}
