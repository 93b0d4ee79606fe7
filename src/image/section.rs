//! Section-aware reader for the namespace image container.
//!
//! An image file is a fixed magic header, a run of section byte ranges,
//! and a trailing footer listing every section by name with its offset
//! and length. The footer itself is found through a pointer stored in the
//! final eight bytes of the file. Compression is a whole-file property:
//! the footer names one codec and every non-empty section is compressed
//! with it.
//!
//! Layout:
//! ```text
//! [magic 8B][section bytes ...][footer: varint len + body][footer offset: u64 LE]
//! ```

use crate::error::{FormatError, Result};
use crate::image::wire::{decode_varint, take_bytes, FieldReader};
use memmap2::Mmap;
use std::fs::File;
use std::path::Path;
use tracing::debug;

/// Magic bytes identifying a namespace image file.
pub const MAGIC: [u8; 8] = *b"FSIMG1\r\n";

/// Size of the trailing footer pointer.
const FOOTER_PTR_LEN: usize = 8;

/// Section holding the id -> name string table.
pub const SECTION_STRING_TABLE: &str = "STRING_TABLE";
/// Section holding the inode records.
pub const SECTION_INODE: &str = "INODE";
/// Section holding the inode reference list.
pub const SECTION_REFERENCE: &str = "REFERENCE";
/// Section holding the directory membership records.
pub const SECTION_DIRECTORY: &str = "DIRECTORY";

// Footer field numbers.
const FOOTER_CODEC: u32 = 1;
const FOOTER_SECTION: u32 = 2;

// Section entry field numbers.
const SECTION_NAME: u32 = 1;
const SECTION_OFFSET: u32 = 2;
const SECTION_LENGTH: u32 = 3;

/// Compression codec applied to every non-empty section.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Codec {
    /// Sections are stored raw.
    None,
    /// Sections are zstd frames.
    Zstd,
}

impl Codec {
    fn from_name(name: &str) -> Result<Self> {
        match name {
            "" => Ok(Codec::None),
            "zstd" => Ok(Codec::Zstd),
            other => Err(FormatError::UnknownCodec {
                name: other.to_string(),
            }
            .into()),
        }
    }
}

/// One footer entry: a named byte range within the file.
#[derive(Debug, Clone)]
pub struct SectionEntry {
    pub name: String,
    pub offset: u64,
    pub length: u64,
}

/// A parsed image container: validated magic, parsed footer, and access
/// to decompressed section bytes.
///
/// Borrows the underlying file bytes; [`ImageMmap`] owns a mapping and
/// hands out an `ImageFile` over it.
pub struct ImageFile<'a> {
    data: &'a [u8],
    codec: Codec,
    sections: Vec<SectionEntry>,
}

impl<'a> ImageFile<'a> {
    /// Validate the magic, locate and parse the footer.
    pub fn parse(data: &'a [u8]) -> Result<Self> {
        if data.len() < MAGIC.len() + FOOTER_PTR_LEN {
            return Err(FormatError::FileTooShort { len: data.len() }.into());
        }
        if data[..MAGIC.len()] != MAGIC {
            return Err(FormatError::BadMagic {
                expected: MAGIC,
                found: data[..MAGIC.len()].to_vec(),
            }
            .into());
        }

        let ptr_start = data.len() - FOOTER_PTR_LEN;
        let footer_offset =
            u64::from_le_bytes(data[ptr_start..].try_into().expect("8-byte slice"));
        if footer_offset < MAGIC.len() as u64 || footer_offset >= ptr_start as u64 {
            return Err(FormatError::SectionOutOfBounds {
                name: "FOOTER".to_string(),
                offset: footer_offset,
                length: 0,
            }
            .into());
        }

        let mut pos = footer_offset as usize;
        let footer_len = decode_varint(data, &mut pos, "footer length")?;
        let footer = take_bytes(&data[..ptr_start], &mut pos, footer_len, "footer body")?;
        let (codec, sections) = parse_footer(footer)?;

        // Every section must fall inside the region before the footer.
        for s in &sections {
            let end = s.offset.checked_add(s.length);
            match end {
                Some(end) if s.offset >= MAGIC.len() as u64 && end <= footer_offset => {}
                _ => {
                    return Err(FormatError::SectionOutOfBounds {
                        name: s.name.clone(),
                        offset: s.offset,
                        length: s.length,
                    }
                    .into());
                }
            }
        }

        debug!(
            codec = ?codec,
            sections = sections.len(),
            "parsed image footer"
        );

        Ok(Self {
            data,
            codec,
            sections,
        })
    }

    /// The codec named in the footer.
    pub fn codec(&self) -> Codec {
        self.codec
    }

    /// All sections listed in the footer, in footer order.
    pub fn sections(&self) -> &[SectionEntry] {
        &self.sections
    }

    /// Decompressed bytes of the named section, or `None` if the footer
    /// does not list it. A zero-length section yields an empty buffer.
    pub fn section(&self, name: &str) -> Result<Option<Vec<u8>>> {
        // Footers list at most a handful of sections; a linear scan is fine.
        let entry = match self.sections.iter().find(|s| s.name == name) {
            Some(entry) => entry,
            None => return Ok(None),
        };
        if entry.length == 0 {
            return Ok(Some(Vec::new()));
        }
        let start = entry.offset as usize;
        let end = start + entry.length as usize;
        let raw = &self.data[start..end];
        let bytes = match self.codec {
            Codec::None => raw.to_vec(),
            Codec::Zstd => zstd::decode_all(raw).map_err(|e| FormatError::Decompression {
                section: entry.name.clone(),
                source: e,
            })?,
        };
        Ok(Some(bytes))
    }

    /// Like [`section`](Self::section), but a missing section is a
    /// format error.
    pub fn require_section(&self, name: &'static str) -> Result<Vec<u8>> {
        self.section(name)?
            .ok_or_else(|| FormatError::MissingSection { name }.into())
    }
}

fn parse_footer(footer: &[u8]) -> Result<(Codec, Vec<SectionEntry>)> {
    let mut codec = Codec::None;
    let mut sections: Vec<SectionEntry> = Vec::new();

    let mut reader = FieldReader::new(footer);
    while let Some((field, value)) = reader.next_field()? {
        match field {
            FOOTER_CODEC => {
                let name = std::str::from_utf8(value.as_bytes("codec name")?)
                    .map_err(|_| FormatError::InvalidUtf8 { id: 0 })?;
                codec = Codec::from_name(name)?;
            }
            FOOTER_SECTION => {
                let entry = parse_section_entry(value.as_bytes("section entry")?)?;
                if sections.iter().any(|s| s.name == entry.name) {
                    return Err(FormatError::DuplicateSection { name: entry.name }.into());
                }
                sections.push(entry);
            }
            _ => {}
        }
    }
    Ok((codec, sections))
}

fn parse_section_entry(bytes: &[u8]) -> Result<SectionEntry> {
    let mut name = None;
    let mut offset = None;
    let mut length = None;

    let mut reader = FieldReader::new(bytes);
    while let Some((field, value)) = reader.next_field()? {
        match field {
            SECTION_NAME => {
                let raw = value.as_bytes("section name")?;
                let s = std::str::from_utf8(raw).map_err(|_| FormatError::InvalidUtf8 { id: 0 })?;
                name = Some(s.to_string());
            }
            SECTION_OFFSET => offset = Some(value.as_varint("section offset")?),
            SECTION_LENGTH => length = Some(value.as_varint("section length")?),
            _ => {}
        }
    }

    Ok(SectionEntry {
        name: name.ok_or(FormatError::MissingField {
            field: "section name",
        })?,
        offset: offset.ok_or(FormatError::MissingField {
            field: "section offset",
        })?,
        length: length.ok_or(FormatError::MissingField {
            field: "section length",
        })?,
    })
}

/// A memory-mapped image file.
///
/// Mapping keeps load memory proportional to the sections actually read
/// and lets the OS cache pages across repeated loads of the same image.
pub struct ImageMmap {
    mmap: Mmap,
}

impl ImageMmap {
    /// Map the file at `path` read-only.
    pub fn open(path: &Path) -> Result<Self> {
        let file = File::open(path)?;
        // Safety: the mapping is read-only and the loader treats the file
        // as immutable for the lifetime of the snapshot build.
        let mmap = unsafe { Mmap::map(&file)? };
        Ok(Self { mmap })
    }

    /// The mapped bytes.
    pub fn bytes(&self) -> &[u8] {
        &self.mmap
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::image::wire::testenc::{encode_varint, put_bytes_field, put_varint_field};

    /// Assemble a minimal image: magic, given sections, footer, pointer.
    fn build_image(codec: &str, sections: &[(&str, &[u8])], compress: bool) -> Vec<u8> {
        let mut data = Vec::new();
        data.extend_from_slice(&MAGIC);

        let mut entries = Vec::new();
        for (name, body) in sections {
            let stored = if compress && !body.is_empty() {
                zstd::encode_all(&body[..], 3).unwrap()
            } else {
                body.to_vec()
            };
            let offset = data.len() as u64;
            data.extend_from_slice(&stored);
            entries.push((name.to_string(), offset, stored.len() as u64));
        }

        let mut footer = Vec::new();
        put_bytes_field(FOOTER_CODEC, codec.as_bytes(), &mut footer);
        for (name, offset, length) in &entries {
            let mut entry = Vec::new();
            put_bytes_field(SECTION_NAME, name.as_bytes(), &mut entry);
            put_varint_field(SECTION_OFFSET, *offset, &mut entry);
            put_varint_field(SECTION_LENGTH, *length, &mut entry);
            put_bytes_field(FOOTER_SECTION, &entry, &mut footer);
        }

        let footer_offset = data.len() as u64;
        let mut len_prefix = Vec::new();
        encode_varint(footer.len() as u64, &mut len_prefix);
        data.extend_from_slice(&len_prefix);
        data.extend_from_slice(&footer);
        data.extend_from_slice(&footer_offset.to_le_bytes());
        data
    }

    #[test]
    fn parses_raw_sections() {
        let img = build_image("", &[("INODE", b"abc"), ("EXTRA", b"zz")], false);
        let image = ImageFile::parse(&img).unwrap();
        assert_eq!(image.codec(), Codec::None);
        assert_eq!(image.require_section("INODE").unwrap(), b"abc");
        // Unknown sections are simply available; irrelevant ones ignored.
        assert_eq!(image.section("EXTRA").unwrap().unwrap(), b"zz");
        assert!(image.section("NOPE").unwrap().is_none());
    }

    #[test]
    fn decompresses_zstd_sections() {
        let body = b"hello hello hello hello".repeat(10);
        let img = build_image("zstd", &[("INODE", &body)], true);
        let image = ImageFile::parse(&img).unwrap();
        assert_eq!(image.codec(), Codec::Zstd);
        assert_eq!(image.require_section("INODE").unwrap(), body);
    }

    #[test]
    fn zero_length_section_is_present_but_empty() {
        let img = build_image("zstd", &[("REFERENCE", b"")], true);
        let image = ImageFile::parse(&img).unwrap();
        assert_eq!(image.require_section("REFERENCE").unwrap(), Vec::<u8>::new());
    }

    #[test]
    fn rejects_bad_magic() {
        let mut img = build_image("", &[("INODE", b"abc")], false);
        img[0] = b'X';
        match ImageFile::parse(&img) {
            Err(crate::error::ImageError::Format(FormatError::BadMagic { .. })) => {}
            other => panic!("expected BadMagic, got {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn rejects_truncated_file() {
        assert!(matches!(
            ImageFile::parse(b"FSIM"),
            Err(crate::error::ImageError::Format(FormatError::FileTooShort { .. }))
        ));
    }

    #[test]
    fn rejects_unknown_codec() {
        let img = build_image("lzma", &[("INODE", b"abc")], false);
        assert!(matches!(
            ImageFile::parse(&img),
            Err(crate::error::ImageError::Format(FormatError::UnknownCodec { .. }))
        ));
    }

    #[test]
    fn rejects_out_of_bounds_footer_pointer() {
        let mut img = build_image("", &[("INODE", b"abc")], false);
        let n = img.len();
        img[n - 8..].copy_from_slice(&(u64::MAX).to_le_bytes());
        assert!(matches!(
            ImageFile::parse(&img),
            Err(crate::error::ImageError::Format(FormatError::SectionOutOfBounds { .. }))
        ));
    }

    #[test]
    fn missing_required_section_is_an_error() {
        let img = build_image("", &[("INODE", b"abc")], false);
        let image = ImageFile::parse(&img).unwrap();
        assert!(matches!(
            image.require_section("STRING_TABLE"),
            Err(crate::error::ImageError::Format(FormatError::MissingSection { .. }))
        ));
    }
}
