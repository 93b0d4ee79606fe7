//! Inode record model and full decoder.
//!
//! Records are stored byte-exact in the repository and decoded to these
//! structures only on demand. An inode is a tagged union: identity fields
//! shared by every entry (id, type, raw name bytes) plus a variant payload
//! for files, directories, and symlinks.
//!
//! Timestamps are milliseconds since the Unix epoch. Quota values of -1
//! mean "unset".

use crate::error::{FormatError, Result};
use crate::image::wire::{decode_varint, zigzag_decode, FieldReader};
use std::borrow::Cow;

/// Well-known id of the filesystem root directory.
pub const ROOT_INODE_ID: u64 = 1;

// Inode record field numbers.
const INODE_TYPE: u32 = 1;
const INODE_ID: u32 = 2;
const INODE_NAME: u32 = 3;
const INODE_FILE: u32 = 4;
const INODE_DIRECTORY: u32 = 5;
const INODE_SYMLINK: u32 = 6;

// File payload field numbers.
const FILE_REPLICATION: u32 = 1;
const FILE_MTIME: u32 = 2;
const FILE_ATIME: u32 = 3;
const FILE_BLOCK_SIZE: u32 = 4;
const FILE_PERMISSION: u32 = 5;
const FILE_BLOCK: u32 = 6;
const FILE_EC_POLICY: u32 = 7;

// Block field numbers.
const BLOCK_ID: u32 = 1;
const BLOCK_GEN_STAMP: u32 = 2;
const BLOCK_NUM_BYTES: u32 = 3;

// Directory payload field numbers.
const DIR_MTIME: u32 = 1;
const DIR_NS_QUOTA: u32 = 2;
const DIR_DS_QUOTA: u32 = 3;
const DIR_PERMISSION: u32 = 4;

// Symlink payload field numbers.
const SYMLINK_PERMISSION: u32 = 1;
const SYMLINK_TARGET: u32 = 2;
const SYMLINK_ATIME: u32 = 3;

// Packed permission layout: owner id in bits 40..64, group id in bits
// 16..40, mode bits in bits 0..16.
const PERM_OWNER_SHIFT: u32 = 40;
const PERM_GROUP_SHIFT: u32 = 16;
const PERM_ID_MASK: u64 = (1 << 24) - 1;
const PERM_MODE_MASK: u64 = (1 << 16) - 1;

/// Wire tag values for the inode type field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(u8)]
pub enum InodeType {
    File = 1,
    Directory = 2,
    Symlink = 3,
}

impl InodeType {
    pub fn from_tag(tag: u64) -> Result<Self> {
        match tag {
            1 => Ok(InodeType::File),
            2 => Ok(InodeType::Directory),
            3 => Ok(InodeType::Symlink),
            _ => Err(FormatError::UnknownInodeType { tag }.into()),
        }
    }
}

/// One filesystem entry, fully decoded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Inode {
    /// Globally unique, immutable numeric id.
    pub id: u64,
    /// Raw name bytes as stored on disk. Not required to be UTF-8.
    pub name: Vec<u8>,
    /// Variant payload.
    pub kind: InodeKind,
}

/// Variant payload of an inode.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InodeKind {
    File(FileInode),
    Directory(DirectoryInode),
    Symlink(SymlinkInode),
}

/// File payload: block list and size-relevant attributes.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct FileInode {
    pub replication: u32,
    pub mtime_ms: u64,
    pub atime_ms: u64,
    pub preferred_block_size: u64,
    pub permission: u64,
    pub blocks: Vec<Block>,
    /// 0 for replicated files, otherwise the erasure-coding policy id.
    pub ec_policy_id: u32,
}

impl FileInode {
    /// Logical file size: the sum of its block byte lengths.
    pub fn size(&self) -> u64 {
        self.blocks.iter().map(|b| b.num_bytes).sum()
    }
}

/// One block of a file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Block {
    pub id: u64,
    pub gen_stamp: u64,
    pub num_bytes: u64,
}

/// Directory payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DirectoryInode {
    pub mtime_ms: u64,
    /// Namespace quota; -1 when unset.
    pub ns_quota: i64,
    /// Diskspace quota in bytes; -1 when unset.
    pub ds_quota: i64,
    pub permission: u64,
}

/// Symlink payload.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SymlinkInode {
    pub permission: u64,
    /// Raw link target bytes.
    pub target: Vec<u8>,
    pub atime_ms: u64,
}

impl Inode {
    /// Fully decode one raw record.
    pub fn decode(record: &[u8]) -> Result<Inode> {
        let mut node_type = None;
        let mut id = None;
        let mut name = None;
        let mut kind = None;

        let mut reader = FieldReader::new(record);
        while let Some((field, value)) = reader.next_field()? {
            match field {
                INODE_TYPE => {
                    node_type = Some(InodeType::from_tag(value.as_varint("inode type")?)?)
                }
                INODE_ID => id = Some(value.as_varint("inode id")?),
                INODE_NAME => name = Some(value.as_bytes("inode name")?.to_vec()),
                INODE_FILE => {
                    kind = Some(InodeKind::File(decode_file(
                        value.as_bytes("file payload")?,
                    )?))
                }
                INODE_DIRECTORY => {
                    kind = Some(InodeKind::Directory(decode_directory(
                        value.as_bytes("directory payload")?,
                    )?))
                }
                INODE_SYMLINK => {
                    kind = Some(InodeKind::Symlink(decode_symlink(
                        value.as_bytes("symlink payload")?,
                    )?))
                }
                _ => {}
            }
        }

        let node_type = node_type.ok_or(FormatError::MissingField {
            field: "inode type",
        })?;
        let id = id.ok_or(FormatError::MissingField { field: "inode id" })?;
        let kind = kind.ok_or(FormatError::MissingField {
            field: "inode payload",
        })?;

        // The declared type tag and the payload variant must agree.
        let tag_matches = matches!(
            (&node_type, &kind),
            (InodeType::File, InodeKind::File(_))
                | (InodeType::Directory, InodeKind::Directory(_))
                | (InodeType::Symlink, InodeKind::Symlink(_))
        );
        if !tag_matches {
            return Err(FormatError::MissingField {
                field: "matching inode payload",
            }
            .into());
        }

        Ok(Inode {
            id,
            name: name.unwrap_or_default(),
            kind,
        })
    }

    /// The type of this inode, derived from its payload.
    pub fn node_type(&self) -> InodeType {
        match self.kind {
            InodeKind::File(_) => InodeType::File,
            InodeKind::Directory(_) => InodeType::Directory,
            InodeKind::Symlink(_) => InodeType::Symlink,
        }
    }

    pub fn is_directory(&self) -> bool {
        matches!(self.kind, InodeKind::Directory(_))
    }

    pub fn is_file(&self) -> bool {
        matches!(self.kind, InodeKind::File(_))
    }

    pub fn is_symlink(&self) -> bool {
        matches!(self.kind, InodeKind::Symlink(_))
    }

    /// Name as UTF-8 for display; invalid bytes are replaced.
    pub fn name_lossy(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.name)
    }

    /// The packed permission id of this inode.
    pub fn permission_id(&self) -> u64 {
        match &self.kind {
            InodeKind::File(f) => f.permission,
            InodeKind::Directory(d) => d.permission,
            InodeKind::Symlink(s) => s.permission,
        }
    }

    /// Modification time where the variant records one.
    pub fn mtime_ms(&self) -> Option<u64> {
        match &self.kind {
            InodeKind::File(f) => Some(f.mtime_ms),
            InodeKind::Directory(d) => Some(d.mtime_ms),
            InodeKind::Symlink(_) => None,
        }
    }
}

/// Owner, group, and mode bits unpacked from a permission id.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Permission<'a> {
    pub owner: &'a str,
    pub group: &'a str,
    pub mode: u16,
}

impl Permission<'_> {
    /// Render mode bits in `rwxr-xr-x` form, prefixed with the type
    /// character for the given inode type.
    pub fn mode_string(&self, node_type: InodeType) -> String {
        let type_char = match node_type {
            InodeType::File => '-',
            InodeType::Directory => 'd',
            InodeType::Symlink => 'l',
        };
        let mut s = String::with_capacity(10);
        s.push(type_char);
        for shift in [6u16, 3, 0] {
            let bits = (self.mode >> shift) & 0o7;
            s.push(if bits & 0o4 != 0 { 'r' } else { '-' });
            s.push(if bits & 0o2 != 0 { 'w' } else { '-' });
            s.push(if bits & 0o1 != 0 { 'x' } else { '-' });
        }
        s
    }
}

/// Split a packed permission id into (owner string id, group string id,
/// mode bits).
pub fn unpack_permission(permission: u64) -> (u64, u64, u16) {
    let owner = (permission >> PERM_OWNER_SHIFT) & PERM_ID_MASK;
    let group = (permission >> PERM_GROUP_SHIFT) & PERM_ID_MASK;
    let mode = (permission & PERM_MODE_MASK) as u16;
    (owner, group, mode)
}

fn decode_file(bytes: &[u8]) -> Result<FileInode> {
    let mut file = FileInode::default();
    let mut reader = FieldReader::new(bytes);
    while let Some((field, value)) = reader.next_field()? {
        match field {
            FILE_REPLICATION => file.replication = value.as_varint("replication")? as u32,
            FILE_MTIME => file.mtime_ms = value.as_varint("mtime")?,
            FILE_ATIME => file.atime_ms = value.as_varint("atime")?,
            FILE_BLOCK_SIZE => file.preferred_block_size = value.as_varint("block size")?,
            FILE_PERMISSION => file.permission = value.as_varint("permission")?,
            FILE_BLOCK => file.blocks.push(decode_block(value.as_bytes("block")?)?),
            FILE_EC_POLICY => file.ec_policy_id = value.as_varint("ec policy")? as u32,
            _ => {}
        }
    }
    Ok(file)
}

fn decode_block(bytes: &[u8]) -> Result<Block> {
    let mut id = 0;
    let mut gen_stamp = 0;
    let mut num_bytes = 0;
    let mut reader = FieldReader::new(bytes);
    while let Some((field, value)) = reader.next_field()? {
        match field {
            BLOCK_ID => id = value.as_varint("block id")?,
            BLOCK_GEN_STAMP => gen_stamp = value.as_varint("gen stamp")?,
            BLOCK_NUM_BYTES => num_bytes = value.as_varint("block bytes")?,
            _ => {}
        }
    }
    Ok(Block {
        id,
        gen_stamp,
        num_bytes,
    })
}

fn decode_directory(bytes: &[u8]) -> Result<DirectoryInode> {
    let mut dir = DirectoryInode::default();
    let mut reader = FieldReader::new(bytes);
    while let Some((field, value)) = reader.next_field()? {
        match field {
            DIR_MTIME => dir.mtime_ms = value.as_varint("mtime")?,
            DIR_NS_QUOTA => dir.ns_quota = zigzag_decode(value.as_varint("ns quota")?),
            DIR_DS_QUOTA => dir.ds_quota = zigzag_decode(value.as_varint("ds quota")?),
            DIR_PERMISSION => dir.permission = value.as_varint("permission")?,
            _ => {}
        }
    }
    Ok(dir)
}

fn decode_symlink(bytes: &[u8]) -> Result<SymlinkInode> {
    let mut link = SymlinkInode::default();
    let mut reader = FieldReader::new(bytes);
    while let Some((field, value)) = reader.next_field()? {
        match field {
            SYMLINK_PERMISSION => link.permission = value.as_varint("permission")?,
            SYMLINK_TARGET => link.target = value.as_bytes("target")?.to_vec(),
            SYMLINK_ATIME => link.atime_ms = value.as_varint("atime")?,
            _ => {}
        }
    }
    Ok(link)
}

/// Decode packed varints (a length-delimited run of varints) into ids.
pub fn decode_packed_varints(bytes: &[u8], context: &'static str) -> Result<Vec<u64>> {
    let mut out = Vec::new();
    let mut pos = 0;
    while pos < bytes.len() {
        out.push(decode_varint(bytes, &mut pos, context)?);
    }
    Ok(out)
}

/// Pack a permission id from its parts. Used by fixtures and tests; the
/// loader itself only ever unpacks.
pub fn pack_permission(owner_id: u64, group_id: u64, mode: u16) -> u64 {
    ((owner_id & PERM_ID_MASK) << PERM_OWNER_SHIFT)
        | ((group_id & PERM_ID_MASK) << PERM_GROUP_SHIFT)
        | mode as u64
}
