//! fsimage-walker - Offline Namespace Image Inspector
//!
//! Loads a point-in-time snapshot of a distributed filesystem's metadata
//! (a "namespace image") and exposes it for lookup, enumeration, and
//! bulk statistical traversal - without touching the live filesystem.
//!
//! # Features
//!
//! - **Section-aware reader**: validates the image magic, reads the
//!   trailing footer, and demultiplexes the file into typed sub-streams,
//!   decompressing per the codec named in the footer.
//!
//! - **Byte-exact inode storage**: tens of millions of records are kept
//!   as raw bytes in one arena and decoded only on lookup, so memory
//!   stays proportional to raw record bytes rather than parsed-object
//!   counts.
//!
//! - **Parallel load and traversal**: the inode sort (the hottest load
//!   phase) and the traversal fan-out both run on a worker pool; the
//!   loaded snapshot is immutable and shared without locks.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                     Namespace image file                    │
//! │  [magic][sections ...][footer][footer ptr]                  │
//! └───────────────────────────┬─────────────────────────────────┘
//!                             │ ImageFile (magic, footer, codec)
//!             ┌───────────────┼───────────────┬─────────────────┐
//!             ▼               ▼               ▼                 ▼
//!      ┌────────────┐  ┌────────────┐  ┌───────────┐  ┌─────────────┐
//!      │StringTable │  │   Inode    │  │ Reference │  │  Directory  │
//!      │  id→name   │  │ Repository │  │   List    │─▶│    Index    │
//!      └─────┬──────┘  └─────┬──────┘  └───────────┘  └──────┬──────┘
//!            │               │                               │
//!            └───────────────┼───────────────────────────────┘
//!                            ▼
//!                     ┌────────────┐
//!                     │  Snapshot  │  resolve / exists / children
//!                     └─────┬──────┘
//!                           ▼
//!              ┌─────────────────────────┐
//!              │    Traversal engines    │
//!              │  sequential │ parallel  │──▶ InodeVisitor
//!              └─────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```no_run
//! use fsimage_walker::{LoadOptions, Snapshot, TraverseOptions};
//! use fsimage_walker::report::SummaryVisitor;
//!
//! # fn main() -> fsimage_walker::Result<()> {
//! let snapshot = Snapshot::load(std::path::Path::new("fsimage.img"))?;
//! assert!(snapshot.exists("/"));
//!
//! let visitor = SummaryVisitor::new(&snapshot);
//! snapshot.traverse(&visitor, None, &TraverseOptions::parallel())?;
//! visitor.into_report().print();
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod error;
pub mod image;
pub mod progress;
pub mod report;
pub mod snapshot;
pub mod walker;

pub use error::{ImageError, Result};
pub use image::{Inode, InodeKind, InodeType, Permission, SortStrategy, ROOT_INODE_ID};
pub use snapshot::{LoadOptions, Snapshot};
pub use walker::{
    FailurePolicy, InodeVisitor, SubtreeFailure, TraverseMode, TraverseOptions, TraverseStats,
};
