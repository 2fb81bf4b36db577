//! ZIP-backed fetcher
//!
//! EPUB containers and zipped audiobooks are both plain ZIP archives; this
//! fetcher exposes their entries as root-relative links. ZIP entry streams
//! are not seekable, so ranged reads inflate the entry and slice the result.
//! `length` reports the decompressed size from the central directory.

use std::fs::File;
use std::io::{Read, Seek};
use std::ops::Range;
use std::path::Path;

use parking_lot::Mutex;
use zip::result::ZipError;
use zip::ZipArchive;

use super::{slice_range, Fetcher};
use crate::error::{AppError, Result};
use crate::model::Link;

pub struct ArchiveFetcher<R: Read + Seek + Send> {
    /// The zip reader seeks internally, so even reads need exclusive access.
    archive: Mutex<ZipArchive<R>>,
    links: Vec<Link>,
}

impl ArchiveFetcher<File> {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        Self::new(File::open(path)?)
    }
}

impl<R: Read + Seek + Send> ArchiveFetcher<R> {
    pub fn new(reader: R) -> Result<Self> {
        let mut archive =
            ZipArchive::new(reader).map_err(|e| AppError::Parse(format!("not a zip archive: {e}")))?;

        let mut links = Vec::with_capacity(archive.len());
        for index in 0..archive.len() {
            let entry = archive
                .by_index_raw(index)
                .map_err(|e| AppError::Parse(format!("corrupt zip entry: {e}")))?;
            if entry.is_dir() {
                continue;
            }
            let name = entry.name().to_string();
            let media_type = mime_guess::from_path(&name).first_raw().map(str::to_string);
            let mut link = Link::new(format!("/{}", name.trim_start_matches('/')));
            link.media_type = media_type;
            links.push(link);
        }

        Ok(Self {
            archive: Mutex::new(archive),
            links,
        })
    }

    fn entry_bytes(&self, href: &str) -> Result<Vec<u8>> {
        let name = href.trim_start_matches('/');
        let mut archive = self.archive.lock();
        let mut entry = archive.by_name(name).map_err(|e| match e {
            ZipError::FileNotFound => AppError::ResourceNotFound(href.to_string()),
            other => AppError::Fetch(format!("failed to open zip entry {href}: {other}")),
        })?;
        let mut data = Vec::with_capacity(entry.size() as usize);
        entry
            .read_to_end(&mut data)
            .map_err(|e| AppError::Fetch(format!("failed to inflate {href}: {e}")))?;
        Ok(data)
    }
}

impl<R: Read + Seek + Send> Fetcher for ArchiveFetcher<R> {
    fn links(&self) -> Vec<Link> {
        self.links.clone()
    }

    fn read(&self, href: &str, range: Option<Range<u64>>) -> Result<Vec<u8>> {
        let data = self.entry_bytes(href)?;
        slice_range(href, data, range)
    }

    fn length(&self, href: &str) -> Result<u64> {
        let name = href.trim_start_matches('/');
        let mut archive = self.archive.lock();
        let entry = archive.by_name(name).map_err(|e| match e {
            ZipError::FileNotFound => AppError::ResourceNotFound(href.to_string()),
            other => AppError::Fetch(format!("failed to open zip entry {href}: {other}")),
        })?;
        Ok(entry.size())
    }
}
