//! Directory index: parent inode id -> ordered child inode ids.
//!
//! Each directory record carries a parent id, the directly-listed child
//! ids, and reference indexes for children owned elsewhere. The index
//! stores one combined vector per parent: direct children in on-disk
//! order first, then reference-resolved children. Only ids live here;
//! child records are never materialized during construction.

use crate::error::{FormatError, Result};
use crate::image::record::decode_packed_varints;
use crate::image::refs::ReferenceList;
use crate::image::wire::{decode_varint, take_bytes, FieldReader};
use std::collections::HashMap;
use tracing::debug;

// Directory record field numbers.
const DIR_PARENT: u32 = 1;
const DIR_CHILDREN: u32 = 2;
const DIR_REF_CHILDREN: u32 = 3;

const EMPTY: &[u64] = &[];

/// Parent -> children mapping reconstructed from the directory section.
pub struct DirectoryIndex {
    children: HashMap<u64, Vec<u64>>,
}

impl DirectoryIndex {
    /// Decode delimited directory records until the end of the section,
    /// resolving reference-indexed children through `refs`.
    pub fn build(bytes: &[u8], refs: &ReferenceList) -> Result<Self> {
        let mut children: HashMap<u64, Vec<u64>> = HashMap::new();
        let mut pos = 0;
        while pos < bytes.len() {
            let len = decode_varint(bytes, &mut pos, "directory record length")?;
            let record = take_bytes(bytes, &mut pos, len, "directory record")?;

            let mut parent = None;
            let mut direct: Vec<u64> = Vec::new();
            let mut ref_indexes: Vec<u64> = Vec::new();

            let mut reader = FieldReader::new(record);
            while let Some((field, value)) = reader.next_field()? {
                match field {
                    DIR_PARENT => parent = Some(value.as_varint("parent id")?),
                    DIR_CHILDREN => {
                        direct =
                            decode_packed_varints(value.as_bytes("child ids")?, "child id")?
                    }
                    DIR_REF_CHILDREN => {
                        ref_indexes = decode_packed_varints(
                            value.as_bytes("reference indexes")?,
                            "reference index",
                        )?
                    }
                    _ => {}
                }
            }
            let parent = parent.ok_or(FormatError::MissingField { field: "parent id" })?;

            // Direct children first, reference-resolved children after.
            let mut combined = direct;
            combined.reserve(ref_indexes.len());
            for index in ref_indexes {
                combined.push(refs.resolve(index)?);
            }
            children.entry(parent).or_default().extend(combined);
        }

        debug!(parents = children.len(), "built directory index");
        Ok(Self { children })
    }

    /// The ordered children of `parent_id`. A parent with no recorded
    /// entry has zero children; this is not an error.
    pub fn children(&self, parent_id: u64) -> &[u64] {
        self.children
            .get(&parent_id)
            .map(Vec::as_slice)
            .unwrap_or(EMPTY)
    }

    /// Whether `parent_id` has at least one recorded child.
    pub fn has_children(&self, parent_id: u64) -> bool {
        !self.children(parent_id).is_empty()
    }

    /// Number of parents with at least one recorded child.
    pub fn len(&self) -> usize {
        self.children.len()
    }

    pub fn is_empty(&self) -> bool {
        self.children.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{ImageError, InvariantError};
    use crate::image::wire::testenc::{
        encode_varint, pack_varints, put_bytes_field, put_varint_field,
    };

    fn build_dir_section(entries: &[(u64, &[u64], &[u64])]) -> Vec<u8> {
        let mut buf = Vec::new();
        for (parent, direct, ref_indexes) in entries {
            let mut record = Vec::new();
            put_varint_field(DIR_PARENT, *parent, &mut record);
            if !direct.is_empty() {
                put_bytes_field(DIR_CHILDREN, &pack_varints(direct), &mut record);
            }
            if !ref_indexes.is_empty() {
                put_bytes_field(DIR_REF_CHILDREN, &pack_varints(ref_indexes), &mut record);
            }
            encode_varint(record.len() as u64, &mut buf);
            buf.extend_from_slice(&record);
        }
        buf
    }

    fn refs_from(ids: &[u64]) -> ReferenceList {
        let mut buf = Vec::new();
        for id in ids {
            let mut record = Vec::new();
            put_varint_field(1, *id, &mut record);
            encode_varint(record.len() as u64, &mut buf);
            buf.extend_from_slice(&record);
        }
        ReferenceList::decode(&buf).unwrap()
    }

    #[test]
    fn direct_children_precede_reference_children() {
        let refs = refs_from(&[100, 200]);
        let section = build_dir_section(&[(1, &[5, 3, 4], &[1, 0])]);
        let index = DirectoryIndex::build(&section, &refs).unwrap();
        // On-disk direct order kept, then refs resolved positionally.
        assert_eq!(index.children(1), &[5, 3, 4, 200, 100]);
    }

    #[test]
    fn unlisted_parent_has_no_children() {
        let refs = refs_from(&[]);
        let section = build_dir_section(&[(1, &[2], &[])]);
        let index = DirectoryIndex::build(&section, &refs).unwrap();
        assert_eq!(index.children(999), EMPTY);
        assert!(!index.has_children(999));
        assert!(index.has_children(1));
    }

    #[test]
    fn reference_only_listing() {
        let refs = refs_from(&[42]);
        let section = build_dir_section(&[(7, &[], &[0])]);
        let index = DirectoryIndex::build(&section, &refs).unwrap();
        assert_eq!(index.children(7), &[42]);
    }

    #[test]
    fn bad_reference_index_fails_the_build() {
        let refs = refs_from(&[42]);
        let section = build_dir_section(&[(1, &[], &[3])]);
        assert!(matches!(
            DirectoryIndex::build(&section, &refs),
            Err(ImageError::Invariant(
                InvariantError::ReferenceOutOfRange { index: 3, .. }
            ))
        ));
    }

    #[test]
    fn empty_section_builds_empty_index() {
        let refs = refs_from(&[]);
        let index = DirectoryIndex::build(&[], &refs).unwrap();
        assert!(index.is_empty());
    }
}
