//! Parallel traversal: inline files, one worker task per subdirectory.
//!
//! The start directory is visited inline, its file and symlink children
//! are visited inline in listing order, and each subdirectory subtree
//! becomes one task on a rayon scope. The scope join makes this
//! structured concurrency: the fan-out never outlives the call, and task
//! count is bounded by the start directory's subdirectory count.

use super::sequential::{join_path, walk_subtree};
use super::{FailurePolicy, InodeVisitor, SubtreeFailure, VisitCounters};
use crate::error::{Result, WorkerError};
use crate::image::record::{Inode, InodeKind};
use crate::snapshot::Snapshot;
use crossbeam_channel::{unbounded, Sender};
use std::sync::atomic::Ordering;
use tracing::warn;

/// Parallel engine entry point.
///
/// Failures inside one subdirectory's subtree are caught at the task
/// boundary. Under [`FailurePolicy::Isolate`] they are logged and
/// collected; sibling subtrees run to completion either way, and under
/// [`FailurePolicy::Propagate`] the first failure is returned after the
/// join.
pub(crate) fn walk_parallel<V: InodeVisitor + ?Sized>(
    snapshot: &Snapshot,
    visitor: &V,
    start: &Inode,
    start_path: &str,
    policy: FailurePolicy,
    workers: Option<usize>,
    counters: &VisitCounters,
) -> Result<Vec<SubtreeFailure>> {
    let dir = match &start.kind {
        InodeKind::Directory(_) => start,
        // A non-directory start degenerates to a single inline visit.
        _ => {
            walk_subtree(snapshot, visitor, start, start_path, counters)?;
            return Ok(Vec::new());
        }
    };

    visitor.visit_directory(dir, start_path)?;
    counters.dirs.fetch_add(1, Ordering::Relaxed);

    // Partition immediate children: files and symlinks are visited
    // inline in listing order; each subdirectory becomes a unit of
    // concurrent work.
    let mut subdirs: Vec<(Inode, String)> = Vec::new();
    for &child_id in snapshot.directories().children(dir.id) {
        let child = snapshot.repository().get(child_id)?;
        let child_path = join_path(start_path, &child.name_lossy());
        match &child.kind {
            InodeKind::Directory(_) => subdirs.push((child, child_path)),
            InodeKind::File(_) => {
                visitor.visit_file(&child, &child_path)?;
                counters.files.fetch_add(1, Ordering::Relaxed);
            }
            InodeKind::Symlink(_) => {
                visitor.visit_symlink(&child, &child_path)?;
                counters.symlinks.fetch_add(1, Ordering::Relaxed);
            }
        }
    }

    let (failure_tx, failure_rx) = unbounded::<SubtreeFailure>();

    match workers {
        Some(n) => {
            let pool = rayon::ThreadPoolBuilder::new()
                .num_threads(n)
                .thread_name(|i| format!("walker-{i}"))
                .build()
                .map_err(|e| WorkerError::PoolBuild(e.to_string()))?;
            pool.scope(|scope| {
                fan_out(scope, snapshot, visitor, &subdirs, counters, &failure_tx)
            });
        }
        None => rayon::scope(|scope| {
            fan_out(scope, snapshot, visitor, &subdirs, counters, &failure_tx)
        }),
    }

    drop(failure_tx);
    let failures: Vec<SubtreeFailure> = failure_rx.into_iter().collect();

    match policy {
        FailurePolicy::Isolate => Ok(failures),
        FailurePolicy::Propagate => match failures.into_iter().next() {
            Some(first) => Err(first.error),
            None => Ok(Vec::new()),
        },
    }
}

/// Spawn one task per subdirectory on `scope`. Tying every borrow to the
/// scope lifetime `'scope` is what lets `scope.spawn` accept these tasks.
fn fan_out<'scope, V: InodeVisitor + ?Sized>(
    scope: &rayon::Scope<'scope>,
    snapshot: &'scope Snapshot,
    visitor: &'scope V,
    subdirs: &'scope [(Inode, String)],
    counters: &'scope VisitCounters,
    failure_tx: &Sender<SubtreeFailure>,
) {
    for (child, child_path) in subdirs {
        let failure_tx = failure_tx.clone();
        scope.spawn(move |_| {
            if let Err(error) =
                walk_subtree(snapshot, visitor, child, child_path, counters)
            {
                warn!(
                    subtree = %child_path,
                    inode = child.id,
                    %error,
                    "subtree traversal failed"
                );
                let _ = failure_tx.send(SubtreeFailure {
                    path: child_path.clone(),
                    inode_id: child.id,
                    error,
                });
            }
        });
    }
}
