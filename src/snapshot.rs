//! The loaded, queryable snapshot and its path resolver.
//!
//! A snapshot owns the string table, the inode repository, and the
//! directory index. It is built once by [`Snapshot::load`] and never
//! mutated afterward, so any number of readers (including the parallel
//! traversal engine's workers) share it without locking.

use crate::error::{LookupError, Result};
use crate::image::record::{unpack_permission, Inode, Permission, ROOT_INODE_ID};
use crate::image::section::{
    ImageFile, ImageMmap, SECTION_DIRECTORY, SECTION_INODE, SECTION_REFERENCE,
    SECTION_STRING_TABLE,
};
use crate::image::{
    DirectoryIndex, InodeRepository, ReferenceList, SortStrategy, StringTable,
};
use crate::walker::{
    walk_parallel, walk_sequential, InodeVisitor, TraverseMode, TraverseOptions, TraverseStats,
    VisitCounters,
};
use std::path::Path;
use std::time::Instant;
use tracing::info;

/// Knobs for the loading pipeline.
#[derive(Debug, Clone, Default)]
pub struct LoadOptions {
    /// Sort strategy for the inode repository build, the most expensive
    /// load phase.
    pub sort: SortStrategy,
}

/// Fully loaded, immutable, queryable namespace image.
pub struct Snapshot {
    strings: StringTable,
    inodes: InodeRepository,
    dirs: DirectoryIndex,
}

impl Snapshot {
    /// Load an image file with default options.
    pub fn load(path: &Path) -> Result<Snapshot> {
        Self::load_with(path, &LoadOptions::default())
    }

    /// Load an image file.
    pub fn load_with(path: &Path, options: &LoadOptions) -> Result<Snapshot> {
        info!(image = %path.display(), "loading namespace image");
        let mmap = ImageMmap::open(path)?;
        Self::from_bytes(mmap.bytes(), options)
    }

    /// Load an image from an in-memory byte buffer.
    ///
    /// Sections are consumed in dependency order: string table, inodes,
    /// references, then directories (which need the reference list).
    pub fn from_bytes(data: &[u8], options: &LoadOptions) -> Result<Snapshot> {
        let start = Instant::now();
        let image = ImageFile::parse(data)?;

        let phase = Instant::now();
        let strings = StringTable::decode(&image.require_section(SECTION_STRING_TABLE)?)?;
        let strings_ms = phase.elapsed().as_millis() as u64;

        let phase = Instant::now();
        let inodes = InodeRepository::build(image.require_section(SECTION_INODE)?, options.sort)?;
        let inodes_ms = phase.elapsed().as_millis() as u64;

        let phase = Instant::now();
        let refs = ReferenceList::decode(&image.require_section(SECTION_REFERENCE)?)?;
        let dirs = DirectoryIndex::build(&image.require_section(SECTION_DIRECTORY)?, &refs)?;
        let dirs_ms = phase.elapsed().as_millis() as u64;

        info!(
            inodes = inodes.len(),
            strings_ms,
            inodes_ms,
            dirs_ms,
            total_ms = start.elapsed().as_millis() as u64,
            "snapshot loaded"
        );

        Ok(Snapshot {
            strings,
            inodes,
            dirs,
        })
    }

    /// The inode repository.
    pub fn repository(&self) -> &InodeRepository {
        &self.inodes
    }

    /// The directory index.
    pub fn directories(&self) -> &DirectoryIndex {
        &self.dirs
    }

    /// The string table.
    pub fn strings(&self) -> &StringTable {
        &self.strings
    }

    /// Resolve an absolute path to its inode record.
    ///
    /// Runs of repeated separators collapse to one and trailing
    /// separators are ignored, so `/a//b/` resolves like `/a/b`. `/`
    /// resolves to the root without descending.
    pub fn resolve(&self, path: &str) -> Result<Inode> {
        if !path.starts_with('/') {
            return Err(LookupError::NotAbsolute {
                path: path.to_string(),
            }
            .into());
        }

        let mut current = self.inodes.root().clone();
        for segment in path.split('/').filter(|s| !s.is_empty()) {
            let children = self.dirs.children(current.id);
            if children.is_empty() {
                return Err(LookupError::NotFound {
                    path: path.to_string(),
                }
                .into());
            }
            // Linear scan, decoding candidates one at a time. The cost is
            // O(children) full decodes per segment; a per-directory name
            // index is deliberately not maintained.
            let mut matched = None;
            for &child_id in children {
                let child = self.inodes.get(child_id)?;
                if child.name == segment.as_bytes() {
                    matched = Some(child);
                    break;
                }
            }
            current = matched.ok_or_else(|| LookupError::NotFound {
                path: path.to_string(),
            })?;
        }
        Ok(current)
    }

    /// Whether `path` resolves.
    pub fn exists(&self, path: &str) -> bool {
        self.resolve(path).is_ok()
    }

    /// Child names of the directory at `path`, in index order (direct
    /// children first, then reference-resolved children).
    pub fn children(&self, path: &str) -> Result<Vec<String>> {
        let inode = self.resolve(path)?;
        self.dirs
            .children(inode.id)
            .iter()
            .map(|&id| Ok(self.inodes.get(id)?.name_lossy().into_owned()))
            .collect()
    }

    /// Whether the entry at `path` has at least one child.
    pub fn has_children(&self, path: &str) -> Result<bool> {
        let inode = self.resolve(path)?;
        Ok(self.dirs.has_children(inode.id))
    }

    /// Whether the inode with `id` has at least one child. An unknown id
    /// simply has no children here; `repository().get` is the strict
    /// variant.
    pub fn has_children_id(&self, id: u64) -> bool {
        self.dirs.has_children(id)
    }

    /// Unpack an inode's permission id against the string table.
    pub fn permission_of<'a>(&'a self, inode: &Inode) -> Result<Permission<'a>> {
        let (owner_id, group_id, mode) = unpack_permission(inode.permission_id());
        Ok(Permission {
            owner: self.strings.resolve(owner_id)?,
            group: self.strings.resolve(group_id)?,
            mode,
        })
    }

    /// Walk the tree rooted at `start_path` (default `/`), dispatching
    /// each node to the visitor.
    pub fn traverse<V: InodeVisitor + ?Sized>(
        &self,
        visitor: &V,
        start_path: Option<&str>,
        options: &TraverseOptions,
    ) -> Result<TraverseStats> {
        let start_path = start_path.unwrap_or("/");
        let start = self.resolve(start_path)?;
        let normalized = normalize_display_path(start_path, start.id);

        let counters = VisitCounters::default();
        let policy = options.effective_policy();
        let start_time = Instant::now();

        let failures = match options.mode {
            TraverseMode::Sequential => {
                walk_sequential(self, visitor, &start, &normalized, policy, &counters)?
            }
            TraverseMode::Parallel => walk_parallel(
                self,
                visitor,
                &start,
                &normalized,
                policy,
                options.workers,
                &counters,
            )?,
        };

        let stats = counters.into_stats(failures);
        info!(
            start = %normalized,
            mode = ?options.mode,
            visited = stats.total(),
            failed_subtrees = stats.failures.len(),
            elapsed_ms = start_time.elapsed().as_millis() as u64,
            "traversal finished"
        );
        Ok(stats)
    }
}

/// Canonical display form of a start path: `/` for the root, otherwise
/// the user's path with collapsed and trailing separators removed.
fn normalize_display_path(path: &str, inode_id: u64) -> String {
    if inode_id == ROOT_INODE_ID {
        return "/".to_string();
    }
    let mut out = String::with_capacity(path.len());
    for segment in path.split('/').filter(|s| !s.is_empty()) {
        out.push('/');
        out.push_str(segment);
    }
    if out.is_empty() {
        out.push('/');
    }
    out
}
