//! Reference list: positional index -> referred inode id.
//!
//! A directory listing may point at an inode defined elsewhere (hard-
//! link-like reuse) through an index into this list. The list is only an
//! input to directory-index construction; it keeps no other query
//! surface.

use crate::error::{InvariantError, Result};
use crate::image::wire::{decode_varint, take_bytes, FieldReader};
use tracing::debug;

const REF_REFERRED_ID: u32 = 1;

/// Positionally-indexed sequence of referred inode ids.
pub struct ReferenceList {
    targets: Vec<u64>,
}

impl ReferenceList {
    /// Decode the reference section: delimited records until the end of
    /// the buffer (the count is implicit).
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        let mut targets = Vec::new();
        let mut pos = 0;
        while pos < bytes.len() {
            let len = decode_varint(bytes, &mut pos, "reference record length")?;
            let record = take_bytes(bytes, &mut pos, len, "reference record")?;

            let mut referred = None;
            let mut reader = FieldReader::new(record);
            while let Some((field, value)) = reader.next_field()? {
                if field == REF_REFERRED_ID {
                    referred = Some(value.as_varint("referred id")?);
                }
            }
            targets.push(referred.ok_or(crate::error::FormatError::MissingField {
                field: "referred id",
            })?);
        }
        debug!(references = targets.len(), "decoded reference list");
        Ok(Self { targets })
    }

    /// Translate a reference index into the referred inode id.
    pub fn resolve(&self, index: u64) -> Result<u64> {
        self.targets
            .get(index as usize)
            .copied()
            .ok_or_else(|| {
                InvariantError::ReferenceOutOfRange {
                    index,
                    len: self.targets.len(),
                }
                .into()
            })
    }

    pub fn len(&self) -> usize {
        self.targets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }
}
