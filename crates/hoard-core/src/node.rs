//! Catalog entry types.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, IntoStaticStr};

use crate::table::KeyHasher;

/// Identity of a filesystem object, shared by all of its hard links.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct FileKey {
    /// Device ID.
    pub device: u64,
    /// Inode number.
    pub inode: u64,
}

impl FileKey {
    /// Create a new file key.
    pub fn new(device: u64, inode: u64) -> Self {
        Self { device, inode }
    }

    /// Spread the key over 64 bits.
    ///
    /// Inode numbers are often small and sequential, so the raw combination
    /// is run through a Murmur3-style finalizer before bucket selection.
    pub fn mix(&self) -> u64 {
        let mut k = self.inode ^ (self.device << 7);
        k ^= k >> 33;
        k = k.wrapping_mul(0xff51_afd7_ed55_8ccd);
        k ^= k >> 33;
        k = k.wrapping_mul(0xc4ce_b9fe_1a85_ec53);
        k ^= k >> 33;
        k
    }
}

/// [`KeyHasher`] used by the catalog table.
#[derive(Debug, Clone, Copy, Default)]
pub struct FileKeyHasher;

impl KeyHasher<FileKey> for FileKeyHasher {
    fn hash(&self, key: &FileKey) -> u64 {
        key.mix()
    }

    fn eq(&self, a: &FileKey, b: &FileKey) -> bool {
        a.inode == b.inode && a.device == b.device
    }
}

/// Type of filesystem object, decoded from the mode bits.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
    Display,
    EnumIter,
    IntoStaticStr,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum FileKind {
    File,
    Directory,
    Symlink,
    Fifo,
    Socket,
    CharDevice,
    BlockDevice,
    Unknown,
}

impl FileKind {
    /// Decode the file type bits of a `st_mode` value.
    pub fn from_mode(mode: u32) -> Self {
        let kind = mode & libc::S_IFMT as u32;
        if kind == libc::S_IFREG as u32 {
            Self::File
        } else if kind == libc::S_IFDIR as u32 {
            Self::Directory
        } else if kind == libc::S_IFLNK as u32 {
            Self::Symlink
        } else if kind == libc::S_IFIFO as u32 {
            Self::Fifo
        } else if kind == libc::S_IFSOCK as u32 {
            Self::Socket
        } else if kind == libc::S_IFCHR as u32 {
            Self::CharDevice
        } else if kind == libc::S_IFBLK as u32 {
            Self::BlockDevice
        } else {
            Self::Unknown
        }
    }
}

/// A cataloged filesystem object.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileRecord {
    /// Path relative to the traversal root argument.
    pub path: PathBuf,
    /// Raw `st_mode`.
    pub mode: u32,
    /// Size in bytes.
    pub size: u64,
}

impl FileRecord {
    /// Create a new record.
    pub fn new(path: impl Into<PathBuf>, mode: u32, size: u64) -> Self {
        Self {
            path: path.into(),
            mode,
            size,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Object type.
    pub fn kind(&self) -> FileKind {
        FileKind::from_mode(self.mode)
    }

    /// Permission bits (including setuid, setgid and sticky).
    pub fn permissions(&self) -> u32 {
        self.mode & 0o7777
    }

    pub fn is_dir(&self) -> bool {
        self.kind() == FileKind::Directory
    }

    pub fn is_file(&self) -> bool {
        self.kind() == FileKind::File
    }

    pub fn is_symlink(&self) -> bool {
        self.kind() == FileKind::Symlink
    }

    /// Number of path components.
    pub fn depth(&self) -> usize {
        self.path.components().count()
    }
}
