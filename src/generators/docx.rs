//! WordprocessingML (`.docx`) container handling.
//!
//! A `.docx` is a ZIP archive of XML parts. Only the parts that carry visible
//! text (body, headers, footers, notes) are ever rewritten; every other entry
//! is carried over byte-for-byte.

use std::io::{Cursor, Read, Write};

use thiserror::Error;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, DateTime, ZipArchive, ZipWriter};

pub const DOCX_CONTENT_TYPE: &str =
    "application/vnd.openxmlformats-officedocument.wordprocessingml.document";

const CONTENT_TYPES_PART: &str = "[Content_Types].xml";
const DOCUMENT_PART: &str = "word/document.xml";
const MAX_UNCOMPRESSED_BYTES: u64 = 256 * 1024 * 1024;

#[derive(Debug, Error)]
pub enum DocxError {
    #[error("not a valid .docx container: {0}")]
    Zip(#[from] zip::result::ZipError),
    #[error("failed to read container entry: {0}")]
    Io(#[from] std::io::Error),
    #[error("container is missing required part '{0}'")]
    MissingPart(&'static str),
    #[error("container expands beyond {MAX_UNCOMPRESSED_BYTES} bytes")]
    TooLarge,
}

#[derive(Debug, Clone)]
struct Entry {
    name: String,
    data: Vec<u8>,
    is_dir: bool,
}

/// An opened `.docx`, fully buffered in memory.
#[derive(Debug, Clone)]
pub struct DocxPackage {
    entries: Vec<Entry>,
}

/// Whether an entry holds text that may contain placeholders.
pub fn is_text_part(name: &str) -> bool {
    let Some(file) = name.strip_prefix("word/") else {
        return false;
    };
    if file.contains('/') || !file.ends_with(".xml") {
        return false;
    }
    let stem = &file[..file.len() - ".xml".len()];
    let numbered = |prefix: &str| {
        stem.strip_prefix(prefix)
            .is_some_and(|rest| rest.chars().all(|c| c.is_ascii_digit()))
    };
    stem == "document"
        || stem == "footnotes"
        || stem == "endnotes"
        || numbered("header")
        || numbered("footer")
}

impl DocxPackage {
    /// Read every entry of the archive and check the parts Word requires.
    pub fn open(bytes: &[u8]) -> Result<Self, DocxError> {
        Self::open_capped(bytes, MAX_UNCOMPRESSED_BYTES)
    }

    fn open_capped(bytes: &[u8], max_bytes: u64) -> Result<Self, DocxError> {
        let mut archive = ZipArchive::new(Cursor::new(bytes))?;
        let mut entries = Vec::with_capacity(archive.len());
        let mut total: u64 = 0;

        for index in 0..archive.len() {
            let mut file = archive.by_index(index)?;
            let declared = file.size();
            if total.saturating_add(declared) > max_bytes {
                return Err(DocxError::TooLarge);
            }

            // Declared sizes can lie; cap what is actually inflated.
            let remaining = max_bytes - total;
            let mut data = Vec::with_capacity(declared.min(remaining) as usize);
            let read = (&mut file).take(remaining + 1).read_to_end(&mut data)? as u64;
            if read > remaining {
                return Err(DocxError::TooLarge);
            }
            total += read;

            entries.push(Entry {
                name: file.name().to_string(),
                is_dir: file.is_dir(),
                data,
            });
        }

        let package = Self { entries };
        for required in [CONTENT_TYPES_PART, DOCUMENT_PART] {
            if package.part(required).is_none() {
                return Err(DocxError::MissingPart(required));
            }
        }
        Ok(package)
    }

    pub fn part(&self, name: &str) -> Option<&[u8]> {
        self.entries
            .iter()
            .find(|e| !e.is_dir && e.name == name)
            .map(|e| e.data.as_slice())
    }

    /// Text-bearing parts in archive order.
    pub fn text_parts(&self) -> impl Iterator<Item = (&str, &[u8])> {
        self.entries
            .iter()
            .filter(|e| !e.is_dir && is_text_part(&e.name))
            .map(|e| (e.name.as_str(), e.data.as_slice()))
    }

    /// Replace the contents of every text part with the result of `rewrite`.
    ///
    /// Stops at the first error; `self` is consumed either way so a partially
    /// rewritten package can never escape.
    pub fn rewrite_text_parts<F, E>(mut self, mut rewrite: F) -> Result<Self, E>
    where
        F: FnMut(&str, &[u8]) -> Result<Vec<u8>, E>,
    {
        for entry in self.entries.iter_mut() {
            if entry.is_dir || !is_text_part(&entry.name) {
                continue;
            }
            entry.data = rewrite(&entry.name, &entry.data)?;
        }
        Ok(self)
    }

    /// Serialize back to a ZIP archive.
    ///
    /// Entries keep their original order and get a fixed timestamp, so the
    /// same package always produces the same bytes.
    pub fn to_bytes(&self) -> Result<Vec<u8>, DocxError> {
        let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
        let options = SimpleFileOptions::default()
            .compression_method(CompressionMethod::Deflated)
            .last_modified_time(DateTime::default());

        for entry in &self.entries {
            if entry.is_dir {
                writer.add_directory(entry.name.as_str(), options)?;
            } else {
                writer.start_file(entry.name.as_str(), options)?;
                writer.write_all(&entry.data)?;
            }
        }

        Ok(writer.finish()?.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn archive(entries: &[(&str, &str)]) -> Vec<u8> {
        let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
        for (name, body) in entries {
            writer
                .start_file(*name, SimpleFileOptions::default())
                .unwrap();
            writer.write_all(body.as_bytes()).unwrap();
        }
        writer.finish().unwrap().into_inner()
    }

    #[test]
    fn test_text_part_detection() {
        assert!(is_text_part("word/document.xml"));
        assert!(is_text_part("word/header1.xml"));
        assert!(is_text_part("word/footer12.xml"));
        assert!(is_text_part("word/footnotes.xml"));
        assert!(!is_text_part("word/styles.xml"));
        assert!(!is_text_part("word/headerX.xml"));
        assert!(!is_text_part("word/_rels/document.xml.rels"));
        assert!(!is_text_part("docProps/core.xml"));
    }

    #[test]
    fn test_open_requires_document_part() {
        let bytes = archive(&[("[Content_Types].xml", "<Types/>")]);
        assert!(matches!(
            DocxPackage::open(&bytes),
            Err(DocxError::MissingPart("word/document.xml"))
        ));
    }

    #[test]
    fn test_open_rejects_non_zip() {
        assert!(matches!(
            DocxPackage::open(b"plain text, not a zip"),
            Err(DocxError::Zip(_))
        ));
    }

    fn deflated(name: &str, body: &[u8]) -> Vec<u8> {
        let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
        let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
        writer.start_file(name, options).unwrap();
        writer.write_all(body).unwrap();
        writer.finish().unwrap().into_inner()
    }

    /// Overwrite the uncompressed size recorded for the only entry.
    fn declare_size(bytes: &mut [u8], size: u32) {
        let size = size.to_le_bytes();
        assert_eq!(&bytes[..4], b"PK\x03\x04");
        bytes[22..26].copy_from_slice(&size);
        let central = bytes
            .windows(4)
            .position(|w| w == b"PK\x01\x02")
            .expect("central directory header");
        bytes[central + 24..central + 28].copy_from_slice(&size);
    }

    #[test]
    fn test_declared_size_over_cap_is_rejected() {
        let bytes = deflated("word/big.bin", &vec![0u8; 64 * 1024]);
        assert!(matches!(
            DocxPackage::open_capped(&bytes, 1024),
            Err(DocxError::TooLarge)
        ));
    }

    #[test]
    fn test_understated_size_cannot_bypass_cap() {
        let mut bytes = deflated("word/big.bin", &vec![0u8; 64 * 1024]);
        declare_size(&mut bytes, 10);
        assert!(matches!(
            DocxPackage::open_capped(&bytes, 1024),
            Err(DocxError::TooLarge)
        ));
    }

    #[test]
    fn test_round_trip_is_deterministic() {
        let bytes = archive(&[
            ("[Content_Types].xml", "<Types/>"),
            ("word/document.xml", "<w:document/>"),
            ("word/styles.xml", "<w:styles/>"),
        ]);
        let package = DocxPackage::open(&bytes).unwrap();
        let first = package.to_bytes().unwrap();
        let second = package.to_bytes().unwrap();
        assert_eq!(first, second);

        let reopened = DocxPackage::open(&first).unwrap();
        assert_eq!(reopened.part("word/styles.xml"), Some(&b"<w:styles/>"[..]));
        assert_eq!(reopened.text_parts().count(), 1);
    }
}
