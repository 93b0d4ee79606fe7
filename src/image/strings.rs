//! String table: integer id -> owner/group/name string.
//!
//! The table is written once per image and referenced by id from every
//! permission field. It is small (one entry per distinct user, group,
//! and reused name), so a dense id-indexed vector is used. An id that
//! does not resolve is a fatal invariant violation: a well-formed image
//! never emits one, so a miss means corruption or a reader/writer
//! version mismatch.

use crate::error::{FormatError, InvariantError, Result};
use crate::image::wire::{decode_varint, take_bytes, FieldReader};
use tracing::debug;

// Entry field numbers.
const ENTRY_ID: u32 = 1;
const ENTRY_STR: u32 = 2;

/// Ids are packed into 24-bit permission sub-fields; anything larger is
/// garbage regardless of table contents.
const MAX_STRING_ID: u64 = (1 << 24) - 1;

/// Dense id-indexed string lookup table.
pub struct StringTable {
    entries: Vec<Option<String>>,
}

impl StringTable {
    /// Decode a count-prefixed sequence of (id, string) entries.
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        let mut pos = 0;
        let count = decode_varint(bytes, &mut pos, "string table count")?;

        let mut entries: Vec<Option<String>> = Vec::new();
        for _ in 0..count {
            let len = decode_varint(bytes, &mut pos, "string entry length")?;
            let entry = take_bytes(bytes, &mut pos, len, "string entry")?;

            let mut id = None;
            let mut value = None;
            let mut reader = FieldReader::new(entry);
            while let Some((field, field_value)) = reader.next_field()? {
                match field {
                    ENTRY_ID => id = Some(field_value.as_varint("string id")?),
                    ENTRY_STR => {
                        let raw = field_value.as_bytes("string value")?;
                        value = Some(raw.to_vec());
                    }
                    _ => {}
                }
            }
            let id = id.ok_or(FormatError::MissingField { field: "string id" })?;
            let raw = value.ok_or(FormatError::MissingField {
                field: "string value",
            })?;
            if id > MAX_STRING_ID {
                return Err(InvariantError::StringIdTooLarge {
                    id,
                    max: MAX_STRING_ID,
                }
                .into());
            }
            let s = String::from_utf8(raw).map_err(|_| FormatError::InvalidUtf8 { id })?;

            let idx = id as usize;
            if idx >= entries.len() {
                entries.resize(idx + 1, None);
            }
            entries[idx] = Some(s);
        }

        debug!(entries = count, "decoded string table");
        Ok(Self { entries })
    }

    /// Resolve an id to its string. A miss is fatal by taxonomy.
    pub fn resolve(&self, id: u64) -> Result<&str> {
        self.entries
            .get(id as usize)
            .and_then(|e| e.as_deref())
            .ok_or_else(|| InvariantError::UnknownString { id }.into())
    }

    /// Number of populated entries.
    pub fn len(&self) -> usize {
        self.entries.iter().filter(|e| e.is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
