//! Visitor-driven traversal over a loaded snapshot.
//!
//! Two engines share one visitor contract:
//!
//! ```text
//!                      ┌──────────────────────────┐
//!                      │        Snapshot          │
//!                      │  (immutable, shared)     │
//!                      └───────────┬──────────────┘
//!                                  │
//!              ┌───────────────────┴───────────────────┐
//!              │                                       │
//!      ┌───────▼────────┐                     ┌────────▼────────┐
//!      │   Sequential   │                     │    Parallel     │
//!      │ recursive DFS  │                     │ inline files +  │
//!      │ listing order  │                     │ one task per    │
//!      │                │                     │ subdirectory    │
//!      └────────────────┘                     └─────────────────┘
//! ```
//!
//! The parallel engine visits the start directory inline, then spawns one
//! task per immediate subdirectory on a worker pool; each subtree is
//! walked sequentially inside its task and all tasks are joined before
//! the traversal returns. Ordering across sibling subtrees is not
//! guaranteed; a directory is always visited before its children.
//!
//! Visitors that accumulate state across parallel callbacks must
//! synchronize it themselves (atomics, or per-branch accumulation merged
//! at the end); the engines only guarantee the snapshot itself is safe to
//! share.

mod parallel;
mod sequential;

use crate::error::{ImageError, Result};
use crate::image::record::Inode;
use std::sync::atomic::{AtomicU64, Ordering};

pub(crate) use parallel::walk_parallel;
pub(crate) use sequential::walk_sequential;

/// Visitor callbacks, dispatched by inode type.
///
/// Each callback receives the decoded record and the full path of the
/// visited node (`/` for the root, otherwise parent path + `/` + name).
/// Returning an error from a callback fails that subtree like any lookup
/// failure would.
pub trait InodeVisitor: Sync {
    fn visit_directory(&self, inode: &Inode, path: &str) -> Result<()>;
    fn visit_file(&self, inode: &Inode, path: &str) -> Result<()>;
    fn visit_symlink(&self, inode: &Inode, path: &str) -> Result<()>;
}

/// Which traversal engine to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TraverseMode {
    Sequential,
    #[default]
    Parallel,
}

/// What to do when a subtree fails mid-traversal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailurePolicy {
    /// Abort the whole traversal on the first failure.
    Propagate,
    /// Catch a failure at the boundary of an immediate subtree of the
    /// start directory, log it, record it, and keep walking siblings.
    /// The traversal completes with a partial result.
    Isolate,
}

/// Traversal options.
#[derive(Debug, Clone, Default)]
pub struct TraverseOptions {
    pub mode: TraverseMode,
    /// Defaults per mode when unset: sequential propagates, parallel
    /// isolates. The asymmetry favors complete results for interactive
    /// use and availability for bulk reporting; either combination can
    /// be requested explicitly.
    pub failure_policy: Option<FailurePolicy>,
    /// Worker threads for the parallel engine. `None` uses the global
    /// rayon pool.
    pub workers: Option<usize>,
}

impl TraverseOptions {
    pub fn sequential() -> Self {
        Self {
            mode: TraverseMode::Sequential,
            ..Default::default()
        }
    }

    pub fn parallel() -> Self {
        Self {
            mode: TraverseMode::Parallel,
            ..Default::default()
        }
    }

    /// The effective failure policy for this mode.
    pub fn effective_policy(&self) -> FailurePolicy {
        self.failure_policy.unwrap_or(match self.mode {
            TraverseMode::Sequential => FailurePolicy::Propagate,
            TraverseMode::Parallel => FailurePolicy::Isolate,
        })
    }
}

/// A subtree that failed under [`FailurePolicy::Isolate`].
#[derive(Debug)]
pub struct SubtreeFailure {
    /// Path of the failing subtree's root.
    pub path: String,
    /// Inode id of the failing subtree's root.
    pub inode_id: u64,
    pub error: ImageError,
}

/// Result of one traversal.
#[derive(Debug, Default)]
pub struct TraverseStats {
    pub dirs: u64,
    pub files: u64,
    pub symlinks: u64,
    /// Subtrees skipped under [`FailurePolicy::Isolate`]; empty under
    /// [`FailurePolicy::Propagate`].
    pub failures: Vec<SubtreeFailure>,
}

impl TraverseStats {
    /// Total nodes visited.
    pub fn total(&self) -> u64 {
        self.dirs + self.files + self.symlinks
    }
}

/// Shared visit counters, updated from worker tasks.
#[derive(Debug, Default)]
pub(crate) struct VisitCounters {
    pub dirs: AtomicU64,
    pub files: AtomicU64,
    pub symlinks: AtomicU64,
}

impl VisitCounters {
    pub fn into_stats(self, failures: Vec<SubtreeFailure>) -> TraverseStats {
        TraverseStats {
            dirs: self.dirs.load(Ordering::Relaxed),
            files: self.files.load(Ordering::Relaxed),
            symlinks: self.symlinks.load(Ordering::Relaxed),
            failures,
        }
    }
}
