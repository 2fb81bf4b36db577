//! Encryption manifest parsing (`META-INF/encryption.xml`)
//!
//! Produces a mapping from root-relative resource path to
//! [`EncryptionDescriptor`]. Producers emit this document both with and
//! without XML namespaces, so every element and attribute is matched by its
//! local name only.

use std::collections::HashMap;

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

use crate::drm::DrmContext;
use crate::error::{AppError, Result};
use crate::model::EncryptionDescriptor;

/// Attribute lookup by local name, ignoring any namespace prefix.
fn attr(element: &BytesStart, name: &[u8]) -> Option<String> {
    element
        .attributes()
        .with_checks(false)
        .flatten()
        .find(|a| a.key.local_name().as_ref() == name)
        .and_then(|a| a.unescape_value().ok())
        .map(|v| v.into_owned())
}

/// Resolve a CipherReference URI to a root-relative path.
fn resolve_uri(uri: &str) -> String {
    let decoded = urlencoding::decode(uri)
        .map(|c| c.into_owned())
        .unwrap_or_else(|_| uri.to_string());
    format!("/{}", decoded.trim_start_matches('/'))
}

/// One `EncryptedData` entry, accumulated during the walk.
#[derive(Default)]
struct Entry {
    path: Option<String>,
    algorithm: Option<String>,
    compression: Option<String>,
    original_length: Option<u64>,
    profile: Option<String>,
}

/// Parse an encryption manifest into a path → descriptor mapping.
///
/// Entries without a recognizable algorithm are skipped. Duplicate paths
/// overwrite with the last-seen entry. A document with zero recognizable
/// entries yields an empty mapping; only a genuinely unparsable byte stream
/// is an error. The descriptor's `scheme` is populated solely from the DRM
/// context, never from the raw document.
pub fn parse_encryption(
    data: &[u8],
    drm: &DrmContext,
) -> Result<HashMap<String, EncryptionDescriptor>> {
    let text = std::str::from_utf8(data)
        .map_err(|e| AppError::Parse(format!("encryption manifest is not UTF-8: {e}")))?;

    let mut reader = Reader::from_str(text);
    reader.trim_text(true);

    let mut encryptions = HashMap::new();
    let mut entry: Option<Entry> = None;

    loop {
        let event = reader
            .read_event()
            .map_err(|e| AppError::Parse(format!("invalid encryption manifest: {e}")))?;

        match event {
            Event::Start(ref e) | Event::Empty(ref e) => {
                let local = e.local_name();
                match local.as_ref() {
                    b"EncryptedData" => entry = Some(Entry::default()),
                    b"EncryptionMethod" => {
                        if let Some(entry) = entry.as_mut() {
                            entry.algorithm = attr(e, b"Algorithm");
                        }
                    }
                    b"CipherReference" => {
                        if let Some(entry) = entry.as_mut() {
                            entry.path = attr(e, b"URI").as_deref().map(resolve_uri);
                        }
                    }
                    b"Compression" => {
                        if let Some(entry) = entry.as_mut() {
                            entry.compression = match attr(e, b"Method").as_deref() {
                                Some("8") => Some("deflate".to_string()),
                                Some("0") => Some("none".to_string()),
                                Some(other) => {
                                    tracing::warn!(method = other, "unknown compression method");
                                    None
                                }
                                None => None,
                            };
                            entry.original_length = attr(e, b"OriginalLength")
                                .and_then(|v| v.parse().ok());
                        }
                    }
                    b"RetrievalMethod" => {
                        if let Some(entry) = entry.as_mut() {
                            entry.profile = attr(e, b"URI");
                        }
                    }
                    _ => {}
                }

                // Self-closing EncryptedData carries nothing useful.
                if matches!(event, Event::Empty(_)) && local.as_ref() == b"EncryptedData" {
                    entry = None;
                }
            }
            Event::End(ref e) if e.local_name().as_ref() == b"EncryptedData" => {
                if let Some(done) = entry.take() {
                    // Algorithm is required; skip the entry otherwise.
                    if let (Some(path), Some(algorithm)) = (done.path, done.algorithm) {
                        encryptions.insert(
                            path,
                            EncryptionDescriptor {
                                algorithm,
                                compression: done.compression,
                                original_length: done.original_length,
                                profile: done.profile,
                                scheme: drm.scheme().map(str::to_string),
                            },
                        );
                    }
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    Ok(encryptions)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::drm::DrmBrand;

    const LCP_PREFIXED: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<encryption xmlns="urn:oasis:names:tc:opendocument:xmlns:container"
            xmlns:enc="http://www.w3.org/2001/04/xmlenc#"
            xmlns:ds="http://www.w3.org/2000/09/xmldsig#">
  <enc:EncryptedData>
    <enc:EncryptionMethod Algorithm="http://www.w3.org/2001/04/xmlenc#aes256-cbc"/>
    <enc:CipherData>
      <enc:CipherReference URI="chapter01.xhtml"/>
    </enc:CipherData>
    <enc:EncryptionProperties>
      <enc:EncryptionProperty>
        <Compression Method="8" OriginalLength="13291"/>
      </enc:EncryptionProperty>
    </enc:EncryptionProperties>
  </enc:EncryptedData>
  <enc:EncryptedData>
    <enc:EncryptionMethod Algorithm="http://www.w3.org/2001/04/xmlenc#aes256-cbc"/>
    <enc:CipherData>
      <enc:CipherReference URI="dir/chapter02.xhtml"/>
    </enc:CipherData>
    <enc:EncryptionProperties>
      <enc:EncryptionProperty>
        <Compression Method="0" OriginalLength="12914"/>
      </enc:EncryptionProperty>
    </enc:EncryptionProperties>
  </enc:EncryptedData>
</encryption>"#;

    const LCP_UNPREFIXED: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<encryption>
  <EncryptedData>
    <EncryptionMethod Algorithm="http://www.w3.org/2001/04/xmlenc#aes256-cbc"/>
    <CipherData>
      <CipherReference URI="chapter01.xhtml"/>
    </CipherData>
    <EncryptionProperties>
      <EncryptionProperty>
        <Compression Method="8" OriginalLength="13291"/>
      </EncryptionProperty>
    </EncryptionProperties>
  </EncryptedData>
  <EncryptedData>
    <EncryptionMethod Algorithm="http://www.w3.org/2001/04/xmlenc#aes256-cbc"/>
    <CipherData>
      <CipherReference URI="dir/chapter02.xhtml"/>
    </CipherData>
    <EncryptionProperties>
      <EncryptionProperty>
        <Compression Method="0" OriginalLength="12914"/>
      </EncryptionProperty>
    </EncryptionProperties>
  </EncryptedData>
</encryption>"#;

    fn lcp() -> DrmContext {
        DrmContext::new(DrmBrand::Lcp)
    }

    #[test]
    fn parses_lcp_encryption_manifest() {
        let sut = parse_encryption(LCP_PREFIXED.as_bytes(), &lcp()).unwrap();

        assert_eq!(sut.len(), 2);
        assert_eq!(
            sut["/chapter01.xhtml"],
            EncryptionDescriptor {
                algorithm: "http://www.w3.org/2001/04/xmlenc#aes256-cbc".into(),
                compression: Some("deflate".into()),
                original_length: Some(13291),
                profile: None,
                scheme: Some("http://readium.org/2014/01/lcp".into()),
            }
        );
        assert_eq!(
            sut["/dir/chapter02.xhtml"],
            EncryptionDescriptor {
                algorithm: "http://www.w3.org/2001/04/xmlenc#aes256-cbc".into(),
                compression: Some("none".into()),
                original_length: Some(12914),
                profile: None,
                scheme: Some("http://readium.org/2014/01/lcp".into()),
            }
        );
    }

    #[test]
    fn namespace_prefix_is_irrelevant() {
        let prefixed = parse_encryption(LCP_PREFIXED.as_bytes(), &lcp()).unwrap();
        let unprefixed = parse_encryption(LCP_UNPREFIXED.as_bytes(), &lcp()).unwrap();
        assert_eq!(prefixed, unprefixed);
    }

    #[test]
    fn scheme_is_gated_on_the_drm_context() {
        let sut = parse_encryption(LCP_PREFIXED.as_bytes(), &DrmContext::default()).unwrap();
        let descriptor = &sut["/chapter01.xhtml"];
        assert_eq!(descriptor.scheme, None);
        // Everything else is identical to the known-brand parse.
        assert_eq!(descriptor.compression.as_deref(), Some("deflate"));
        assert_eq!(descriptor.original_length, Some(13291));
    }

    #[test]
    fn entries_without_an_algorithm_are_skipped() {
        let xml = r#"<encryption>
          <EncryptedData>
            <CipherData><CipherReference URI="skipped.xhtml"/></CipherData>
          </EncryptedData>
          <EncryptedData>
            <EncryptionMethod Algorithm="http://www.w3.org/2001/04/xmlenc#kw-aes128"/>
            <CipherData><CipherReference URI="images/image.jpeg"/></CipherData>
          </EncryptedData>
        </encryption>"#;

        let sut = parse_encryption(xml.as_bytes(), &DrmContext::default()).unwrap();
        assert_eq!(sut.len(), 1);
        let descriptor = &sut["/images/image.jpeg"];
        assert_eq!(descriptor.compression, None);
        assert_eq!(descriptor.original_length, None);
        assert_eq!(descriptor.scheme, None);
    }

    #[test]
    fn duplicate_paths_keep_the_last_entry() {
        let xml = r#"<encryption>
          <EncryptedData>
            <EncryptionMethod Algorithm="first"/>
            <CipherData><CipherReference URI="chapter.xhtml"/></CipherData>
          </EncryptedData>
          <EncryptedData>
            <EncryptionMethod Algorithm="last"/>
            <CipherData><CipherReference URI="chapter.xhtml"/></CipherData>
          </EncryptedData>
        </encryption>"#;

        let sut = parse_encryption(xml.as_bytes(), &DrmContext::default()).unwrap();
        assert_eq!(sut["/chapter.xhtml"].algorithm, "last");
    }

    #[test]
    fn unrelated_documents_yield_an_empty_mapping() {
        let sut = parse_encryption(b"<container><rootfiles/></container>", &lcp()).unwrap();
        assert!(sut.is_empty());
    }

    #[test]
    fn non_utf8_bytes_are_a_parse_error() {
        let result = parse_encryption(&[0xff, 0xfe, 0x00, 0x01], &lcp());
        assert!(matches!(result, Err(AppError::Parse(_))));
    }
}
