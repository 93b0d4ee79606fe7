//! Image decoding: container, sections, and the four typed sub-streams.
//!
//! Loading order matters: the directory index needs the reference list,
//! so sections are consumed as string table, inodes, references,
//! directories. The [`crate::snapshot`] module drives that pipeline.

pub mod dirs;
pub mod inodes;
pub mod record;
pub mod refs;
pub mod section;
pub mod strings;
pub mod wire;

pub use dirs::DirectoryIndex;
pub use inodes::{InodeRepository, SortStrategy};
pub use record::{
    Block, DirectoryInode, FileInode, Inode, InodeKind, InodeType, Permission, SymlinkInode,
    ROOT_INODE_ID,
};
pub use refs::ReferenceList;
pub use section::{Codec, ImageFile, ImageMmap, SectionEntry};
pub use strings::StringTable;
