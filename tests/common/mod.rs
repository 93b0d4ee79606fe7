//! Fixture image builder for integration tests and benches.
//!
//! Produces complete namespace image files (magic, sections, footer,
//! trailing pointer) from a declarative description. This is the only
//! place in the repository that writes image bytes; the crate itself is
//! read-only with respect to images.

#![allow(dead_code)]

use fsimage_walker::image::record::pack_permission;

const MAGIC: &[u8; 8] = b"FSIMG1\r\n";

// Wire types.
const WT_VARINT: u64 = 0;
const WT_BYTES: u64 = 2;

pub fn encode_varint(mut value: u64, buf: &mut Vec<u8>) {
    loop {
        let mut byte = (value & 0x7F) as u8;
        value >>= 7;
        if value != 0 {
            byte |= 0x80;
        }
        buf.push(byte);
        if value == 0 {
            break;
        }
    }
}

pub fn zigzag_encode(value: i64) -> u64 {
    ((value << 1) ^ (value >> 63)) as u64
}

fn put_varint_field(field: u32, value: u64, buf: &mut Vec<u8>) {
    encode_varint(((field as u64) << 3) | WT_VARINT, buf);
    encode_varint(value, buf);
}

fn put_bytes_field(field: u32, payload: &[u8], buf: &mut Vec<u8>) {
    encode_varint(((field as u64) << 3) | WT_BYTES, buf);
    encode_varint(payload.len() as u64, buf);
    buf.extend_from_slice(payload);
}

fn pack_varints(values: &[u64]) -> Vec<u8> {
    let mut buf = Vec::new();
    for &v in values {
        encode_varint(v, &mut buf);
    }
    buf
}

/// Assemble one inode record: type, id, name, then the variant payload
/// in its type-specific field.
fn inode_record(type_tag: u64, id: u64, name: &[u8], payload_field: u32, payload: &[u8]) -> Vec<u8> {
    let mut record = Vec::new();
    put_varint_field(1, type_tag, &mut record);
    put_varint_field(2, id, &mut record);
    put_bytes_field(3, name, &mut record);
    put_bytes_field(payload_field, payload, &mut record);
    record
}

/// Ownership triple applied to fixture entries.
#[derive(Debug, Clone, Copy)]
pub struct Owner {
    pub owner_id: u64,
    pub group_id: u64,
    pub mode: u16,
}

impl Owner {
    pub fn new(owner_id: u64, group_id: u64, mode: u16) -> Self {
        Self {
            owner_id,
            group_id,
            mode,
        }
    }

    fn packed(&self) -> u64 {
        pack_permission(self.owner_id, self.group_id, self.mode)
    }
}

#[derive(Debug, Clone)]
struct DirEntry {
    parent: u64,
    children: Vec<u64>,
    ref_indexes: Vec<u64>,
}

/// Declarative builder for a complete namespace image.
pub struct ImageBuilder {
    strings: Vec<(u64, String)>,
    inode_records: Vec<Vec<u8>>,
    references: Vec<u64>,
    dir_entries: Vec<DirEntry>,
    zstd: bool,
}

impl ImageBuilder {
    pub fn new() -> Self {
        Self {
            strings: Vec::new(),
            inode_records: Vec::new(),
            references: Vec::new(),
            dir_entries: Vec::new(),
            zstd: false,
        }
    }

    /// Compress every section with zstd and say so in the footer.
    pub fn with_zstd(mut self) -> Self {
        self.zstd = true;
        self
    }

    pub fn string(mut self, id: u64, value: &str) -> Self {
        self.strings.push((id, value.to_string()));
        self
    }

    pub fn directory(mut self, id: u64, name: &[u8], owner: Owner) -> Self {
        let mut payload = Vec::new();
        put_varint_field(1, 1_700_000_000_000, &mut payload); // mtime
        put_varint_field(2, zigzag_encode(-1), &mut payload); // ns quota
        put_varint_field(3, zigzag_encode(-1), &mut payload); // ds quota
        put_varint_field(4, owner.packed(), &mut payload);
        self.inode_records.push(inode_record(2, id, name, 5, &payload));
        self
    }

    pub fn file(mut self, id: u64, name: &[u8], owner: Owner, block_bytes: &[u64]) -> Self {
        let mut payload = Vec::new();
        put_varint_field(1, 3, &mut payload); // replication
        put_varint_field(2, 1_700_000_100_000, &mut payload); // mtime
        put_varint_field(3, 1_700_000_200_000, &mut payload); // atime
        put_varint_field(4, 128 * 1024 * 1024, &mut payload); // block size
        put_varint_field(5, owner.packed(), &mut payload);
        for (i, &bytes) in block_bytes.iter().enumerate() {
            let mut block = Vec::new();
            put_varint_field(1, id * 100 + i as u64, &mut block);
            put_varint_field(2, 1, &mut block);
            put_varint_field(3, bytes, &mut block);
            put_bytes_field(6, &block, &mut payload);
        }
        put_varint_field(7, 0, &mut payload); // ec policy
        self.inode_records.push(inode_record(1, id, name, 4, &payload));
        self
    }

    pub fn symlink(mut self, id: u64, name: &[u8], owner: Owner, target: &[u8]) -> Self {
        let mut payload = Vec::new();
        put_varint_field(1, owner.packed(), &mut payload);
        put_bytes_field(2, target, &mut payload);
        put_varint_field(3, 1_700_000_300_000, &mut payload);
        self.inode_records.push(inode_record(3, id, name, 6, &payload));
        self
    }

    /// Append a raw inode record as-is (for malformed-record tests).
    pub fn raw_inode_record(mut self, record: Vec<u8>) -> Self {
        self.inode_records.push(record);
        self
    }

    /// Add a reference slot and return its index.
    pub fn reference(mut self, referred_id: u64) -> Self {
        self.references.push(referred_id);
        self
    }

    pub fn children(mut self, parent: u64, children: &[u64]) -> Self {
        self.dir_entries.push(DirEntry {
            parent,
            children: children.to_vec(),
            ref_indexes: Vec::new(),
        });
        self
    }

    pub fn children_with_refs(
        mut self,
        parent: u64,
        children: &[u64],
        ref_indexes: &[u64],
    ) -> Self {
        self.dir_entries.push(DirEntry {
            parent,
            children: children.to_vec(),
            ref_indexes: ref_indexes.to_vec(),
        });
        self
    }

    fn string_section(&self) -> Vec<u8> {
        let mut buf = Vec::new();
        encode_varint(self.strings.len() as u64, &mut buf);
        for (id, s) in &self.strings {
            let mut entry = Vec::new();
            put_varint_field(1, *id, &mut entry);
            put_bytes_field(2, s.as_bytes(), &mut entry);
            encode_varint(entry.len() as u64, &mut buf);
            buf.extend_from_slice(&entry);
        }
        buf
    }

    fn inode_section(&self) -> Vec<u8> {
        let mut buf = Vec::new();
        encode_varint(self.inode_records.len() as u64, &mut buf);
        for record in &self.inode_records {
            encode_varint(record.len() as u64, &mut buf);
            buf.extend_from_slice(record);
        }
        buf
    }

    fn reference_section(&self) -> Vec<u8> {
        let mut buf = Vec::new();
        for id in &self.references {
            let mut record = Vec::new();
            put_varint_field(1, *id, &mut record);
            encode_varint(record.len() as u64, &mut buf);
            buf.extend_from_slice(&record);
        }
        buf
    }

    fn directory_section(&self) -> Vec<u8> {
        let mut buf = Vec::new();
        for entry in &self.dir_entries {
            let mut record = Vec::new();
            put_varint_field(1, entry.parent, &mut record);
            if !entry.children.is_empty() {
                put_bytes_field(2, &pack_varints(&entry.children), &mut record);
            }
            if !entry.ref_indexes.is_empty() {
                put_bytes_field(3, &pack_varints(&entry.ref_indexes), &mut record);
            }
            encode_varint(record.len() as u64, &mut buf);
            buf.extend_from_slice(&record);
        }
        buf
    }

    /// Assemble the complete image file.
    pub fn build(&self) -> Vec<u8> {
        let sections = [
            ("STRING_TABLE", self.string_section()),
            ("INODE", self.inode_section()),
            ("REFERENCE", self.reference_section()),
            ("DIRECTORY", self.directory_section()),
        ];

        let mut data = Vec::new();
        data.extend_from_slice(MAGIC);

        let mut entries = Vec::new();
        for (name, body) in &sections {
            let stored = if self.zstd && !body.is_empty() {
                zstd::encode_all(&body[..], 3).expect("zstd encode")
            } else {
                body.clone()
            };
            let offset = data.len() as u64;
            data.extend_from_slice(&stored);
            entries.push((*name, offset, stored.len() as u64));
        }

        let mut footer = Vec::new();
        let codec = if self.zstd { "zstd" } else { "" };
        put_bytes_field(1, codec.as_bytes(), &mut footer);
        for (name, offset, length) in &entries {
            let mut entry = Vec::new();
            put_bytes_field(1, name.as_bytes(), &mut entry);
            put_varint_field(2, *offset, &mut entry);
            put_varint_field(3, *length, &mut entry);
            put_bytes_field(2, &entry, &mut footer);
        }

        let footer_offset = data.len() as u64;
        let mut len_prefix = Vec::new();
        encode_varint(footer.len() as u64, &mut len_prefix);
        data.extend_from_slice(&len_prefix);
        data.extend_from_slice(&footer);
        data.extend_from_slice(&footer_offset.to_le_bytes());
        data
    }
}

impl Default for ImageBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// The fixture most tests share:
///
/// ```text
/// /                 (1, dir,  alice:eng)
/// ├── a             (2, dir,  alice:eng)
/// │   ├── f.txt     (10, file, alice:eng, 1024 B)
/// │   ├── g.log     (11, file, bob:staff, 2048+512 B)
/// │   └── sub       (3, dir,  alice:eng)
/// │       └── h.txt (12, file, bob:eng, 0 B)
/// ├── b             (4, dir,  alice:eng, empty)
/// ├── link          (20, symlink -> /a/f.txt)
/// └── f.txt         (10 again, reference-resolved child of the root)
/// ```
pub fn standard_fixture() -> ImageBuilder {
    let alice_eng = Owner::new(1, 2, 0o755);
    let alice_eng_file = Owner::new(1, 2, 0o644);
    let bob_staff = Owner::new(3, 4, 0o640);
    let bob_eng = Owner::new(3, 2, 0o600);

    ImageBuilder::new()
        .string(1, "alice")
        .string(2, "eng")
        .string(3, "bob")
        .string(4, "staff")
        .directory(1, b"", alice_eng)
        .directory(2, b"a", alice_eng)
        .directory(3, b"sub", alice_eng)
        .directory(4, b"b", alice_eng)
        .file(10, b"f.txt", alice_eng_file, &[1024])
        .file(11, b"g.log", bob_staff, &[2048, 512])
        .file(12, b"h.txt", bob_eng, &[])
        .symlink(20, b"link", alice_eng_file, b"/a/f.txt")
        .reference(10)
        .children_with_refs(1, &[2, 4, 20], &[0])
        .children(2, &[10, 11, 3])
        .children(3, &[12])
}
