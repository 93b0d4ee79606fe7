//! Inode repository: byte-exact record storage with id-sorted lookup.
//!
//! The inode section is a record count followed by length-prefixed raw
//! records. The repository keeps the section buffer as an arena and
//! indexes it with one span per record, so memory stays proportional to
//! raw record bytes no matter how many records there are. Records are
//! decoded one at a time, on lookup.
//!
//! Sorting the span index by id is the most expensive step of loading an
//! image; the strategy (single-threaded or rayon) is chosen by the
//! caller, because images can exceed tens of millions of records.

use crate::error::{InvariantError, Result};
use crate::image::record::{Inode, ROOT_INODE_ID};
use crate::image::wire::{decode_varint, sort_key, take_bytes};
use rayon::prelude::*;
use std::time::Instant;
use tracing::{debug, info};

/// How to sort the record index during [`InodeRepository::build`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortStrategy {
    /// Single-threaded `sort_unstable`.
    Sequential,
    /// `rayon` parallel sort; worthwhile from a few million records up.
    #[default]
    Parallel,
}

/// Byte span of one raw record within the arena.
#[derive(Debug, Clone, Copy)]
struct RecordSpan {
    id: u64,
    offset: usize,
    len: u32,
}

/// Id-sorted store of raw inode records.
pub struct InodeRepository {
    /// Decompressed inode section; every span points into this arena.
    arena: Vec<u8>,
    /// Spans sorted by id.
    spans: Vec<RecordSpan>,
    /// Ids extracted from `spans` after sorting, for binary search
    /// without touching the wider span structs.
    ids: Vec<u64>,
    /// The root record, decoded once at build time. Nearly every path
    /// resolution starts here.
    root: Inode,
}

impl InodeRepository {
    /// Index, sort, and wrap the raw inode section.
    ///
    /// Sorting uses only the two-field micro-decode; records are not
    /// structurally decoded here (a full decode per comparison is 3-5x
    /// slower at image scale).
    pub fn build(arena: Vec<u8>, strategy: SortStrategy) -> Result<Self> {
        let start = Instant::now();

        let mut pos = 0;
        let count = decode_varint(&arena, &mut pos, "inode record count")?;
        let mut spans = Vec::with_capacity(count as usize);
        for _ in 0..count {
            let len = decode_varint(&arena, &mut pos, "inode record length")?;
            let offset = pos;
            take_bytes(&arena, &mut pos, len, "inode record")?;
            let (_, id) = sort_key(&arena[offset..offset + len as usize])?;
            spans.push(RecordSpan {
                id,
                offset,
                len: len as u32,
            });
        }
        let indexed = start.elapsed();

        match strategy {
            SortStrategy::Sequential => spans.sort_unstable_by_key(|s| s.id),
            SortStrategy::Parallel => spans.par_sort_unstable_by_key(|s| s.id),
        }
        let ids: Vec<u64> = spans.iter().map(|s| s.id).collect();

        info!(
            records = spans.len(),
            strategy = ?strategy,
            index_ms = indexed.as_millis() as u64,
            total_ms = start.elapsed().as_millis() as u64,
            "built inode repository"
        );

        let root = match ids.binary_search(&ROOT_INODE_ID) {
            Ok(i) => {
                let span = spans[i];
                Inode::decode(&arena[span.offset..span.offset + span.len as usize])?
            }
            Err(_) => return Err(InvariantError::MissingRoot { id: ROOT_INODE_ID }.into()),
        };
        debug!(root_id = root.id, "pre-decoded root record");

        Ok(Self {
            arena,
            spans,
            ids,
            root,
        })
    }

    /// Number of records in the repository.
    pub fn len(&self) -> usize {
        self.spans.len()
    }

    pub fn is_empty(&self) -> bool {
        self.spans.is_empty()
    }

    /// All ids, ascending.
    pub fn ids(&self) -> &[u64] {
        &self.ids
    }

    /// The pre-decoded root directory record.
    pub fn root(&self) -> &Inode {
        &self.root
    }

    /// The raw stored bytes of one record.
    ///
    /// A miss is an invariant violation: only internally-consistent ids
    /// are ever dereferenced, so an absent id means the image cannot be
    /// trusted.
    pub fn raw(&self, id: u64) -> Result<&[u8]> {
        let idx = self
            .ids
            .binary_search(&id)
            .map_err(|_| InvariantError::UnknownInode { id })?;
        let span = &self.spans[idx];
        Ok(&self.arena[span.offset..span.offset + span.len as usize])
    }

    /// Decode the record with the given id. The root comes from the
    /// build-time pre-decode instead of a fresh parse.
    pub fn get(&self, id: u64) -> Result<Inode> {
        if id == ROOT_INODE_ID {
            return Ok(self.root.clone());
        }
        Inode::decode(self.raw(id)?)
    }

    /// Whether the repository holds a record for `id`.
    pub fn contains(&self, id: u64) -> bool {
        self.ids.binary_search(&id).is_ok()
    }
}
