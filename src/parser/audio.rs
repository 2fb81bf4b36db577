//! Audiobook parser
//!
//! Parses an audio publication from an unstructured archive of audio files,
//! such as a ZAB (Zipped Audio Book) or a plain ZIP. Also works for a
//! standalone audio file behind a [`FileFetcher`].
//!
//! [`FileFetcher`]: crate::fetcher::FileFetcher

use std::sync::Arc;

use crate::drm::DrmContext;
use crate::error::Result;
use crate::fetcher::{guess_title, Fetcher};
use crate::model::{Components, FileFormat, Link, Manifest, Metadata, PublicationFormat};
use crate::parser::{PublicationParser, SourceFile};

/// Auxiliary files that may sit next to audio tracks without disqualifying
/// the archive: playlists, subtitles and similar sidecars.
const IGNORED_EXTENSIONS: &[&str] = &[
    "asx", "bio", "m3u", "m3u8", "pla", "pls", "smil", "txt", "vlc", "wpl", "xspf", "zpl",
];

#[derive(Default)]
pub struct AudioParser;

impl AudioParser {
    pub fn new() -> Self {
        Self
    }
}

fn ignores(link: &Link) -> bool {
    let file_name = link.file_name();
    link.extension()
        .is_some_and(|ext| IGNORED_EXTENSIONS.contains(&ext.as_str()))
        || file_name.starts_with('.')
        || file_name == "Thumbs.db"
}

impl PublicationParser for AudioParser {
    fn accepts(&self, source: &SourceFile, fetcher: &dyn Fetcher) -> bool {
        if source.format == Some(FileFormat::Zab) {
            return true;
        }

        // Claim the package when it holds nothing but audio resources and
        // ignorable sidecar files.
        let links = fetcher.links();
        !links.is_empty() && links.iter().all(|link| ignores(link) || link.is_audio())
    }

    fn parse(
        &self,
        source: &SourceFile,
        fetcher: Arc<dyn Fetcher>,
        _drm: &DrmContext,
        fallback_title: &str,
    ) -> Result<Option<Components>> {
        if !self.accepts(source, fetcher.as_ref()) {
            return Ok(None);
        }

        let links = fetcher.links();
        let mut reading_order: Vec<Link> = links
            .iter()
            .filter(|link| !ignores(link) && link.is_audio())
            .cloned()
            .collect();

        // Locale-independent, case-insensitive path ordering.
        reading_order.sort_by(|a, b| {
            a.href
                .to_lowercase()
                .cmp(&b.href.to_lowercase())
                .then_with(|| a.href.cmp(&b.href))
        });

        if reading_order.is_empty() {
            return Ok(None);
        }

        let title =
            guess_title(&links, ignores).unwrap_or_else(|| fallback_title.to_string());

        Ok(Some(Components {
            file_format: FileFormat::Zab,
            publication_format: PublicationFormat::Audio,
            manifest: Manifest::new(Metadata::new(title), reading_order),
            fetcher,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetcher::MemoryFetcher;

    fn zab_source() -> SourceFile {
        SourceFile::new("book.zab", Some(FileFormat::Zab))
    }

    fn plain_source() -> SourceFile {
        SourceFile::new("book.zip", None)
    }

    fn parse(
        parser: &AudioParser,
        source: &SourceFile,
        fetcher: MemoryFetcher,
    ) -> Result<Option<Components>> {
        parser.parse(source, Arc::new(fetcher), &DrmContext::default(), "Fallback")
    }

    #[test]
    fn accepts_declared_zab_format() {
        let parser = AudioParser::new();
        let fetcher = MemoryFetcher::new().add("/notes.pdf", b"".as_slice());
        assert!(parser.accepts(&zab_source(), &fetcher));
    }

    #[test]
    fn accepts_all_audio_with_ignorable_sidecars() {
        let parser = AudioParser::new();
        let fetcher = MemoryFetcher::new()
            .add("/01.mp3", b"".as_slice())
            .add("/02.ogg", b"".as_slice())
            .add("/playlist.m3u", b"".as_slice())
            .add("/.hidden", b"".as_slice())
            .add("/Thumbs.db", b"".as_slice());
        assert!(parser.accepts(&plain_source(), &fetcher));
    }

    #[test]
    fn rejects_mixed_content_and_empty_packages() {
        let parser = AudioParser::new();
        let mixed = MemoryFetcher::new()
            .add("/01.mp3", b"".as_slice())
            .add("/chapter.xhtml", b"".as_slice());
        assert!(!parser.accepts(&plain_source(), &mixed));
        assert!(!parser.accepts(&plain_source(), &MemoryFetcher::new()));
    }

    #[test]
    fn accepted_but_audioless_package_soft_declines() {
        // Declared ZAB with nothing but a playlist: accepted, parses to None.
        let parser = AudioParser::new();
        let fetcher = MemoryFetcher::new().add("/playlist.m3u", b"".as_slice());
        assert!(parser.accepts(&zab_source(), &fetcher));
        let result = parse(&parser, &zab_source(), fetcher).unwrap();
        assert!(result.is_none());
    }

    #[test]
    fn reading_order_sorts_case_insensitively() {
        let parser = AudioParser::new();
        let fetcher = MemoryFetcher::new()
            .add("/B.mp3", b"".as_slice())
            .add("/a.mp3", b"".as_slice());
        let components = parse(&parser, &plain_source(), fetcher).unwrap().unwrap();
        let hrefs: Vec<_> = components
            .manifest
            .reading_order
            .iter()
            .map(|l| l.href.as_str())
            .collect();
        assert_eq!(hrefs, vec!["/a.mp3", "/B.mp3"]);
    }

    #[test]
    fn sidecars_are_excluded_from_the_reading_order() {
        let parser = AudioParser::new();
        let fetcher = MemoryFetcher::new()
            .add("/01.mp3", b"".as_slice())
            .add("/playlist.m3u", b"".as_slice());
        let components = parse(&parser, &plain_source(), fetcher).unwrap().unwrap();
        assert_eq!(components.manifest.reading_order.len(), 1);
        assert_eq!(components.publication_format, PublicationFormat::Audio);
        assert_eq!(components.file_format, FileFormat::Zab);
    }

    #[test]
    fn title_comes_from_common_directory_or_fallback() {
        let parser = AudioParser::new();
        let titled = MemoryFetcher::new()
            .add("/Abbey Road/01.mp3", b"".as_slice())
            .add("/Abbey Road/02.mp3", b"".as_slice());
        let components = parse(&parser, &plain_source(), titled).unwrap().unwrap();
        assert_eq!(components.manifest.metadata.title, "Abbey Road");

        let flat = MemoryFetcher::new().add("/01.mp3", b"".as_slice());
        let components = parse(&parser, &plain_source(), flat).unwrap().unwrap();
        assert_eq!(components.manifest.metadata.title, "Fallback");
    }
}
