//! Single-file fetcher
//!
//! Backs standalone publications that are not archives, such as a lone audio
//! file. The file is exposed as a single root-relative link and ranged reads
//! seek directly into it.

use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::ops::Range;
use std::path::{Path, PathBuf};

use super::Fetcher;
use crate::error::{AppError, Result};
use crate::model::Link;

pub struct FileFetcher {
    path: PathBuf,
    link: Link,
    length: u64,
}

impl FileFetcher {
    pub fn new(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let length = path.metadata()?.len();
        let file_name = path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| AppError::Fetch(format!("unusable file name: {}", path.display())))?;

        let media_type = mime_guess::from_path(&path).first_raw().map(str::to_string);
        let mut link = Link::new(format!("/{file_name}"));
        link.media_type = media_type;

        Ok(Self { path, link, length })
    }

    fn check_href(&self, href: &str) -> Result<()> {
        if href.eq_ignore_ascii_case(&self.link.href) {
            Ok(())
        } else {
            Err(AppError::ResourceNotFound(href.to_string()))
        }
    }
}

impl Fetcher for FileFetcher {
    fn links(&self) -> Vec<Link> {
        vec![self.link.clone()]
    }

    fn read(&self, href: &str, range: Option<Range<u64>>) -> Result<Vec<u8>> {
        self.check_href(href)?;
        let mut file = File::open(&self.path)
            .map_err(|e| AppError::Fetch(format!("failed to open {}: {e}", self.path.display())))?;

        let (start, end) = match range {
            Some(range) => {
                if range.start >= self.length {
                    return Err(AppError::Fetch(format!(
                        "range start {} past end of {href} ({} bytes)",
                        range.start, self.length
                    )));
                }
                (range.start, range.end.min(self.length))
            }
            None => (0, self.length),
        };

        file.seek(SeekFrom::Start(start))
            .map_err(|e| AppError::Fetch(format!("seek failed on {href}: {e}")))?;
        let mut data = Vec::with_capacity((end - start) as usize);
        file.take(end - start)
            .read_to_end(&mut data)
            .map_err(|e| AppError::Fetch(format!("read failed on {href}: {e}")))?;
        Ok(data)
    }

    fn length(&self, href: &str) -> Result<u64> {
        self.check_href(href)?;
        Ok(self.length)
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    fn fixture_file() -> (tempfile::TempDir, FileFetcher) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("narration.mp3");
        let mut file = File::create(&path).unwrap();
        file.write_all(b"abcdefghij").unwrap();
        let fetcher = FileFetcher::new(&path).unwrap();
        (dir, fetcher)
    }

    #[test]
    fn exposes_a_single_typed_link() {
        let (_dir, fetcher) = fixture_file();
        let links = fetcher.links();
        assert_eq!(links.len(), 1);
        assert_eq!(links[0].href, "/narration.mp3");
        assert_eq!(links[0].media_type.as_deref(), Some("audio/mpeg"));
    }

    #[test]
    fn ranged_reads_seek_into_the_file() {
        let (_dir, fetcher) = fixture_file();
        assert_eq!(fetcher.read("/narration.mp3", None).unwrap(), b"abcdefghij");
        assert_eq!(fetcher.read("/narration.mp3", Some(3..6)).unwrap(), b"def");
        assert_eq!(fetcher.read("/narration.mp3", Some(8..100)).unwrap(), b"ij");
        assert_eq!(fetcher.length("/narration.mp3").unwrap(), 10);
    }

    #[test]
    fn other_paths_are_not_found() {
        let (_dir, fetcher) = fixture_file();
        assert!(matches!(
            fetcher.read("/other.mp3", None),
            Err(AppError::ResourceNotFound(_))
        ));
    }
}
