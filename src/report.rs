//! Statistical aggregation over a traversal, and report rendering.
//!
//! `SummaryVisitor` is the bulk-reporting consumer of the visitor
//! contract: counts and byte totals in atomics, per-owner and per-group
//! tallies behind a mutex, a power-of-two size histogram in atomic
//! buckets. It is safe under the parallel engine; the mutexed maps are
//! touched once per file and merged nowhere (the lock is the merge).

use crate::error::Result;
use crate::image::record::{Inode, InodeKind};
use crate::snapshot::Snapshot;
use crate::walker::InodeVisitor;
use chrono::{DateTime, Utc};
use console::style;
use humansize::{format_size, BINARY};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

/// Histogram buckets: zero-byte files, then one bucket per power of two
/// up to 1 TiB, then everything larger.
const HISTOGRAM_BUCKETS: usize = 42;

/// Per-owner (or per-group) tallies.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OwnerStats {
    pub files: u64,
    pub bytes: u64,
}

/// Traversal visitor that aggregates namespace-wide statistics.
pub struct SummaryVisitor<'a> {
    snapshot: &'a Snapshot,
    dirs: AtomicU64,
    files: AtomicU64,
    symlinks: AtomicU64,
    total_bytes: AtomicU64,
    total_blocks: AtomicU64,
    by_owner: Mutex<HashMap<String, OwnerStats>>,
    by_group: Mutex<HashMap<String, OwnerStats>>,
    histogram: Vec<AtomicU64>,
}

impl<'a> SummaryVisitor<'a> {
    pub fn new(snapshot: &'a Snapshot) -> Self {
        Self {
            snapshot,
            dirs: AtomicU64::new(0),
            files: AtomicU64::new(0),
            symlinks: AtomicU64::new(0),
            total_bytes: AtomicU64::new(0),
            total_blocks: AtomicU64::new(0),
            by_owner: Mutex::new(HashMap::new()),
            by_group: Mutex::new(HashMap::new()),
            histogram: (0..HISTOGRAM_BUCKETS).map(|_| AtomicU64::new(0)).collect(),
        }
    }

    /// Consume the visitor and produce the final report.
    pub fn into_report(self) -> SummaryReport {
        SummaryReport {
            dirs: self.dirs.load(Ordering::Relaxed),
            files: self.files.load(Ordering::Relaxed),
            symlinks: self.symlinks.load(Ordering::Relaxed),
            total_bytes: self.total_bytes.load(Ordering::Relaxed),
            total_blocks: self.total_blocks.load(Ordering::Relaxed),
            by_owner: self.by_owner.into_inner(),
            by_group: self.by_group.into_inner(),
            histogram: self
                .histogram
                .iter()
                .map(|b| b.load(Ordering::Relaxed))
                .collect(),
        }
    }

    fn record_ownership(&self, inode: &Inode, bytes: u64, is_file: bool) -> Result<()> {
        let perm = self.snapshot.permission_of(inode)?;
        let files = u64::from(is_file);
        {
            let mut owners = self.by_owner.lock();
            let entry = owners.entry(perm.owner.to_string()).or_default();
            entry.files += files;
            entry.bytes += bytes;
        }
        {
            let mut groups = self.by_group.lock();
            let entry = groups.entry(perm.group.to_string()).or_default();
            entry.files += files;
            entry.bytes += bytes;
        }
        Ok(())
    }
}

/// Bucket index for a file size.
fn histogram_bucket(size: u64) -> usize {
    if size == 0 {
        0
    } else {
        let bucket = 64 - size.leading_zeros() as usize;
        bucket.min(HISTOGRAM_BUCKETS - 1)
    }
}

/// Lower bound of a bucket, for labels.
fn bucket_floor(bucket: usize) -> u64 {
    if bucket == 0 {
        0
    } else {
        1u64 << (bucket - 1)
    }
}

impl InodeVisitor for SummaryVisitor<'_> {
    fn visit_directory(&self, inode: &Inode, _path: &str) -> Result<()> {
        self.dirs.fetch_add(1, Ordering::Relaxed);
        self.record_ownership(inode, 0, false)
    }

    fn visit_file(&self, inode: &Inode, _path: &str) -> Result<()> {
        let file = match &inode.kind {
            InodeKind::File(f) => f,
            // The engines dispatch by kind; tolerate a direct caller.
            _ => return Ok(()),
        };
        let size = file.size();
        self.files.fetch_add(1, Ordering::Relaxed);
        self.total_bytes.fetch_add(size, Ordering::Relaxed);
        self.total_blocks
            .fetch_add(file.blocks.len() as u64, Ordering::Relaxed);
        self.histogram[histogram_bucket(size)].fetch_add(1, Ordering::Relaxed);
        self.record_ownership(inode, size, true)
    }

    fn visit_symlink(&self, inode: &Inode, _path: &str) -> Result<()> {
        self.symlinks.fetch_add(1, Ordering::Relaxed);
        self.record_ownership(inode, 0, false)
    }
}

/// Final aggregated numbers, detached from the snapshot.
#[derive(Debug)]
pub struct SummaryReport {
    pub dirs: u64,
    pub files: u64,
    pub symlinks: u64,
    pub total_bytes: u64,
    pub total_blocks: u64,
    pub by_owner: HashMap<String, OwnerStats>,
    pub by_group: HashMap<String, OwnerStats>,
    pub histogram: Vec<u64>,
}

impl SummaryReport {
    /// Render the report to stdout.
    pub fn print(&self) {
        println!();
        println!("{}", style("Namespace summary").bold());
        println!("  Directories: {}", format_count(self.dirs));
        println!("  Files:       {}", format_count(self.files));
        println!("  Symlinks:    {}", format_count(self.symlinks));
        println!("  Blocks:      {}", format_count(self.total_blocks));
        println!(
            "  Total size:  {} ({} bytes)",
            format_size(self.total_bytes, BINARY),
            format_count(self.total_bytes)
        );

        let mut owners: Vec<(&String, &OwnerStats)> = self.by_owner.iter().collect();
        owners.sort_by(|a, b| b.1.bytes.cmp(&a.1.bytes).then_with(|| a.0.cmp(b.0)));
        if !owners.is_empty() {
            println!();
            println!("{}", style("By owner").bold());
            for (owner, stats) in owners {
                println!(
                    "  {:<20} {:>10} files  {:>12}",
                    owner,
                    format_count(stats.files),
                    format_size(stats.bytes, BINARY)
                );
            }
        }

        let mut groups: Vec<(&String, &OwnerStats)> = self.by_group.iter().collect();
        groups.sort_by(|a, b| b.1.bytes.cmp(&a.1.bytes).then_with(|| a.0.cmp(b.0)));
        if !groups.is_empty() {
            println!();
            println!("{}", style("By group").bold());
            for (group, stats) in groups {
                println!(
                    "  {:<20} {:>10} files  {:>12}",
                    group,
                    format_count(stats.files),
                    format_size(stats.bytes, BINARY)
                );
            }
        }

        let populated: Vec<(usize, u64)> = self
            .histogram
            .iter()
            .enumerate()
            .filter(|(_, &count)| count > 0)
            .map(|(i, &count)| (i, count))
            .collect();
        if !populated.is_empty() {
            println!();
            println!("{}", style("File size histogram").bold());
            for (bucket, count) in populated {
                println!(
                    "  {:>12} .. {:<12} {}",
                    format_size(bucket_floor(bucket), BINARY),
                    if bucket + 1 < HISTOGRAM_BUCKETS {
                        format_size(bucket_floor(bucket + 1), BINARY)
                    } else {
                        "inf".to_string()
                    },
                    format_count(count)
                );
            }
        }
    }
}

/// Render one directory listing line per child of `path`.
pub fn print_listing(snapshot: &Snapshot, path: &str) -> Result<()> {
    let dir = snapshot.resolve(path)?;
    for &child_id in snapshot.directories().children(dir.id) {
        let child = snapshot.repository().get(child_id)?;
        println!("{}", listing_line(snapshot, &child)?);
    }
    Ok(())
}

/// Render one `ls -l`-style line for an inode.
pub fn listing_line(snapshot: &Snapshot, inode: &Inode) -> Result<String> {
    let perm = snapshot.permission_of(inode)?;
    let mode = perm.mode_string(inode.node_type());
    let size = match &inode.kind {
        InodeKind::File(f) => f.size(),
        _ => 0,
    };
    let mtime = inode
        .mtime_ms()
        .and_then(|ms| DateTime::<Utc>::from_timestamp_millis(ms as i64))
        .map(|t| t.format("%Y-%m-%d %H:%M").to_string())
        .unwrap_or_else(|| "-".to_string());
    Ok(format!(
        "{} {:<12} {:<12} {:>12} {:>16} {}",
        mode,
        perm.owner,
        perm.group,
        size,
        mtime,
        inode.name_lossy()
    ))
}

/// Render a detailed, multi-line description of one inode.
pub fn print_detail(snapshot: &Snapshot, path: &str) -> Result<()> {
    let inode = snapshot.resolve(path)?;
    let perm = snapshot.permission_of(&inode)?;

    println!("  Path:  {path}");
    println!("  Id:    {}", inode.id);
    println!(
        "  Perm:  {} {}:{}",
        perm.mode_string(inode.node_type()),
        perm.owner,
        perm.group
    );
    match &inode.kind {
        InodeKind::File(f) => {
            println!("  Type:  file");
            println!(
                "  Size:  {} in {} blocks (preferred block size {})",
                format_size(f.size(), BINARY),
                f.blocks.len(),
                format_size(f.preferred_block_size, BINARY)
            );
            if f.ec_policy_id != 0 {
                println!("  EC:    policy {}", f.ec_policy_id);
            } else {
                println!("  Repl:  {}", f.replication);
            }
        }
        InodeKind::Directory(d) => {
            println!("  Type:  directory");
            println!(
                "  Items: {}",
                snapshot.directories().children(inode.id).len()
            );
            if d.ns_quota >= 0 {
                println!("  NS quota: {}", d.ns_quota);
            }
            if d.ds_quota >= 0 {
                println!("  DS quota: {}", format_size(d.ds_quota as u64, BINARY));
            }
        }
        InodeKind::Symlink(s) => {
            println!("  Type:  symlink");
            println!("  Target: {}", String::from_utf8_lossy(&s.target));
        }
    }
    Ok(())
}

/// Thousands-separated integer rendering.
fn format_count(n: u64) -> String {
    let s = n.to_string();
    let mut out = String::with_capacity(s.len() + s.len() / 3);
    for (i, c) in s.chars().enumerate() {
        if i > 0 && (s.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn histogram_buckets_are_monotonic() {
        assert_eq!(histogram_bucket(0), 0);
        assert_eq!(histogram_bucket(1), 1);
        assert_eq!(histogram_bucket(2), 2);
        assert_eq!(histogram_bucket(1024), 11);
        assert!(histogram_bucket(u64::MAX) < HISTOGRAM_BUCKETS);
        for size in [1u64, 5, 1024, 1 << 30, u64::MAX] {
            let b = histogram_bucket(size);
            assert!(bucket_floor(b) <= size);
        }
    }

    #[test]
    fn counts_format_with_separators() {
        assert_eq!(format_count(0), "0");
        assert_eq!(format_count(999), "999");
        assert_eq!(format_count(1000), "1,000");
        assert_eq!(format_count(1234567), "1,234,567");
    }
}
