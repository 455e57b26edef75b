//! Open flags for traversal.

use bitflags::bitflags;
use hoard_core::IndexConfig;

bitflags! {
    /// Flags controlling how directories are opened and entries are examined.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct OpenFlags: u32 {
        /// Do not follow symbolic links, neither when reading an entry's
        /// metadata nor when opening a directory.
        const NO_FOLLOW = 1 << 0;
    }
}

impl OpenFlags {
    /// Flags matching an indexing configuration.
    pub fn from_config(config: &IndexConfig) -> Self {
        if config.follow_symlinks {
            Self::empty()
        } else {
            Self::NO_FOLLOW
        }
    }

    /// Whether symbolic links are resolved.
    pub fn follows_symlinks(self) -> bool {
        !self.contains(Self::NO_FOLLOW)
    }

    /// `openat` flags for opening a directory.
    pub(crate) fn open_mode(self) -> libc::c_int {
        let mut mode = libc::O_RDONLY | libc::O_DIRECTORY | libc::O_CLOEXEC;
        if self.contains(Self::NO_FOLLOW) {
            mode |= libc::O_NOFOLLOW;
        }
        mode
    }

    /// `fstatat` flags for reading an entry's metadata.
    pub(crate) fn stat_mode(self) -> libc::c_int {
        if self.contains(Self::NO_FOLLOW) {
            libc::AT_SYMLINK_NOFOLLOW
        } else {
            0
        }
    }
}
