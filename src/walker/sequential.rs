//! Sequential traversal: recursive depth-first walk in listing order.

use super::{FailurePolicy, InodeVisitor, SubtreeFailure, VisitCounters};
use crate::error::Result;
use crate::image::record::{Inode, InodeKind};
use crate::snapshot::Snapshot;
use std::sync::atomic::Ordering;
use tracing::warn;

/// Join a parent path and a child name without duplicating separators.
pub(crate) fn join_path(parent: &str, name: &str) -> String {
    if parent == "/" {
        format!("/{name}")
    } else {
        format!("{parent}/{name}")
    }
}

/// Visit one node and, for directories, recurse over its children in
/// listing order. Any failure propagates and aborts the walk.
pub(crate) fn walk_subtree<V: InodeVisitor + ?Sized>(
    snapshot: &Snapshot,
    visitor: &V,
    inode: &Inode,
    path: &str,
    counters: &VisitCounters,
) -> Result<()> {
    match &inode.kind {
        InodeKind::Directory(_) => {
            visitor.visit_directory(inode, path)?;
            counters.dirs.fetch_add(1, Ordering::Relaxed);
            for &child_id in snapshot.directories().children(inode.id) {
                let child = snapshot.repository().get(child_id)?;
                let child_path = join_path(path, &child.name_lossy());
                walk_subtree(snapshot, visitor, &child, &child_path, counters)?;
            }
        }
        InodeKind::File(_) => {
            visitor.visit_file(inode, path)?;
            counters.files.fetch_add(1, Ordering::Relaxed);
        }
        InodeKind::Symlink(_) => {
            visitor.visit_symlink(inode, path)?;
            counters.symlinks.fetch_add(1, Ordering::Relaxed);
        }
    }
    Ok(())
}

/// Sequential engine entry point.
///
/// Under [`FailurePolicy::Propagate`] this is a plain recursive walk.
/// Under [`FailurePolicy::Isolate`] the walk catches failures at the
/// boundary of each immediate child of the start node, records them, and
/// continues with the remaining siblings in listing order.
pub(crate) fn walk_sequential<V: InodeVisitor + ?Sized>(
    snapshot: &Snapshot,
    visitor: &V,
    start: &Inode,
    start_path: &str,
    policy: FailurePolicy,
    counters: &VisitCounters,
) -> Result<Vec<SubtreeFailure>> {
    if policy == FailurePolicy::Propagate {
        walk_subtree(snapshot, visitor, start, start_path, counters)?;
        return Ok(Vec::new());
    }

    // Isolate: the start node itself still fails hard; only its
    // immediate subtrees are fault boundaries.
    let mut failures = Vec::new();
    match &start.kind {
        InodeKind::Directory(_) => {
            visitor.visit_directory(start, start_path)?;
            counters.dirs.fetch_add(1, Ordering::Relaxed);
            for &child_id in snapshot.directories().children(start.id) {
                match visit_child(snapshot, visitor, child_id, start_path, counters) {
                    Ok(()) => {}
                    Err((path, error)) => {
                        warn!(
                            subtree = %path,
                            inode = child_id,
                            %error,
                            "subtree traversal failed; continuing with siblings"
                        );
                        failures.push(SubtreeFailure {
                            path,
                            inode_id: child_id,
                            error,
                        });
                    }
                }
            }
        }
        _ => {
            walk_subtree(snapshot, visitor, start, start_path, counters)?;
        }
    }
    Ok(failures)
}

/// Decode and walk one immediate child, reporting a failure with the
/// child's path attached.
fn visit_child<V: InodeVisitor + ?Sized>(
    snapshot: &Snapshot,
    visitor: &V,
    child_id: u64,
    parent_path: &str,
    counters: &VisitCounters,
) -> std::result::Result<(), (String, crate::error::ImageError)> {
    let child = snapshot
        .repository()
        .get(child_id)
        .map_err(|e| (join_path(parent_path, &format!("#{child_id}")), e))?;
    let child_path = join_path(parent_path, &child.name_lossy());
    walk_subtree(snapshot, visitor, &child, &child_path, counters)
        .map_err(|e| (child_path, e))
}
