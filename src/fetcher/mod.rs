//! Resource access for publication packages
//!
//! A [`Fetcher`] resolves logical, root-relative resource paths
//! (`/dir/track01.mp3`) to bytes and lengths, abstracting over the backing
//! store. Implementations are blocking; async callers drive them through
//! `tokio::task::spawn_blocking`.

mod archive;
mod file;
mod memory;

use std::ops::Range;

use crate::error::{AppError, Result};
use crate::model::Link;

pub use archive::ArchiveFetcher;
pub use file::FileFetcher;
pub use memory::MemoryFetcher;

/// Capability object giving access to a publication's resources.
pub trait Fetcher: Send + Sync {
    /// All resources in the package, as root-relative links with guessed
    /// media types. Order is the package's natural entry order.
    fn links(&self) -> Vec<Link>;

    /// Read a resource, optionally restricted to a byte range of its
    /// decompressed content. A range end past the resource's length is
    /// clamped; a range starting past it is a fetch failure.
    fn read(&self, href: &str, range: Option<Range<u64>>) -> Result<Vec<u8>>;

    /// Full (post-decompression) byte length of a resource.
    fn length(&self, href: &str) -> Result<u64>;
}

/// Infer a publication title from its resource set: when every non-ignored
/// entry lives under a single common root directory, that directory's name
/// is the best available title.
pub fn guess_title(links: &[Link], ignores: impl Fn(&Link) -> bool) -> Option<String> {
    let mut root: Option<&str> = None;
    let mut seen_any = false;

    for link in links.iter().filter(|l| !ignores(l)) {
        seen_any = true;
        let path = link.href.trim_start_matches('/');
        let (dir, _rest) = path.split_once('/')?; // entry at package root: no title
        match root {
            None => root = Some(dir),
            Some(r) if r == dir => {}
            Some(_) => return None,
        }
    }

    if !seen_any {
        return None;
    }
    root.filter(|r| !r.is_empty()).map(str::to_string)
}

/// Slice an in-memory resource to the requested byte range.
///
/// Backing stores whose content is only available decompressed-in-full (ZIP
/// entries, memory maps) share this to get uniform range semantics.
pub(crate) fn slice_range(href: &str, data: Vec<u8>, range: Option<Range<u64>>) -> Result<Vec<u8>> {
    let Some(range) = range else {
        return Ok(data);
    };
    let len = data.len() as u64;
    if range.start >= len {
        return Err(AppError::Fetch(format!(
            "range start {} past end of {} ({} bytes)",
            range.start, href, len
        )));
    }
    let end = range.end.min(len) as usize;
    Ok(data[range.start as usize..end].to_vec())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn never(_: &Link) -> bool {
        false
    }

    #[test]
    fn title_guessed_from_common_root_directory() {
        let links = vec![
            Link::new("/Abbey Road/01.mp3"),
            Link::new("/Abbey Road/02.mp3"),
        ];
        assert_eq!(guess_title(&links, never).as_deref(), Some("Abbey Road"));
    }

    #[test]
    fn no_title_when_roots_differ_or_entries_are_flat() {
        let mixed = vec![Link::new("/a/01.mp3"), Link::new("/b/02.mp3")];
        assert_eq!(guess_title(&mixed, never), None);

        let flat = vec![Link::new("/01.mp3"), Link::new("/02.mp3")];
        assert_eq!(guess_title(&flat, never), None);
    }

    #[test]
    fn ignored_entries_do_not_break_title_guessing() {
        let links = vec![
            Link::new("/Abbey Road/01.mp3"),
            Link::new("/Thumbs.db"),
        ];
        let title = guess_title(&links, |l| l.file_name() == "Thumbs.db");
        assert_eq!(title.as_deref(), Some("Abbey Road"));
    }

    #[test]
    fn slice_range_clamps_end_and_rejects_start_past_eof() {
        let data = b"hello world".to_vec();
        assert_eq!(slice_range("/x", data.clone(), Some(0..5)).unwrap(), b"hello");
        assert_eq!(slice_range("/x", data.clone(), Some(6..999)).unwrap(), b"world");
        assert!(slice_range("/x", data, Some(11..12)).is_err());
    }
}
