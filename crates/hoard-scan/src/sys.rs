//! Descriptor-relative directory syscalls.
//!
//! Every lookup below a traversal root goes through an already-open
//! directory descriptor (`openat`, `fstatat`), never through a path string
//! that would be resolved again.

use std::ffi::{CStr, CString};
use std::io;
use std::mem::MaybeUninit;
use std::os::fd::{AsRawFd, FromRawFd, IntoRawFd, OwnedFd, RawFd};
use std::ptr::NonNull;

use nix::errno::Errno;

/// An open directory stream. Closing the stream closes its descriptor.
#[derive(Debug)]
pub(crate) struct DirStream {
    dir: NonNull<libc::DIR>,
}

impl DirStream {
    /// Open `name` relative to `parent` and bind a stream to it.
    ///
    /// With no parent, `name` is resolved against the working directory
    /// (absolute names are opened as given).
    pub(crate) fn open_at(parent: Option<RawFd>, name: &CStr, oflags: libc::c_int) -> io::Result<Self> {
        let dirfd = parent.unwrap_or(libc::AT_FDCWD);

        // SAFETY: `name` is a valid NUL-terminated string.
        let raw = unsafe { libc::openat(dirfd, name.as_ptr(), oflags) };
        if raw < 0 {
            return Err(io::Error::last_os_error());
        }
        // SAFETY: `raw` was just returned by openat and is owned by nobody else.
        let fd = unsafe { OwnedFd::from_raw_fd(raw) };

        // SAFETY: `fd` is an open directory descriptor.
        let dir = unsafe { libc::fdopendir(fd.as_raw_fd()) };
        match NonNull::new(dir) {
            Some(dir) => {
                // the stream owns the descriptor from here on
                let _ = fd.into_raw_fd();
                Ok(Self { dir })
            }
            None => Err(io::Error::last_os_error()),
        }
    }

    /// Descriptor backing the stream.
    pub(crate) fn fd(&self) -> RawFd {
        // SAFETY: `self.dir` is a live stream until drop.
        unsafe { libc::dirfd(self.dir.as_ptr()) }
    }

    /// Read the next entry name, or `None` at the end of the stream.
    pub(crate) fn next_name(&mut self) -> Option<io::Result<CString>> {
        Errno::clear();
        // SAFETY: `self.dir` is a live stream and is not shared.
        let entry = unsafe { libc::readdir(self.dir.as_ptr()) };
        if entry.is_null() {
            return match Errno::last() {
                Errno::UnknownErrno => None,
                errno => Some(Err(io::Error::from_raw_os_error(errno as i32))),
            };
        }

        // SAFETY: readdir returned a valid entry whose name is NUL-terminated;
        // it is copied out before the next readdir call.
        let name = unsafe { CStr::from_ptr((*entry).d_name.as_ptr()) };
        Some(Ok(name.to_owned()))
    }
}

impl Drop for DirStream {
    fn drop(&mut self) {
        // SAFETY: the stream is closed exactly once, here.
        unsafe {
            libc::closedir(self.dir.as_ptr());
        }
    }
}

/// The parts of `struct stat` the catalog needs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct EntryMeta {
    pub device: u64,
    pub inode: u64,
    pub mode: u32,
    pub size: u64,
}

/// `fstatat` an entry relative to an open directory.
#[allow(clippy::unnecessary_cast)]
pub(crate) fn stat_at(dirfd: RawFd, name: &CStr, flags: libc::c_int) -> io::Result<EntryMeta> {
    let mut st = MaybeUninit::<libc::stat>::uninit();
    // SAFETY: `name` is NUL-terminated and `st` is valid for writes.
    let rc = unsafe { libc::fstatat(dirfd, name.as_ptr(), st.as_mut_ptr(), flags) };
    if rc != 0 {
        return Err(io::Error::last_os_error());
    }
    // SAFETY: fstatat succeeded, so the buffer is initialized.
    let st = unsafe { st.assume_init() };

    Ok(EntryMeta {
        device: st.st_dev as u64,
        inode: st.st_ino as u64,
        mode: st.st_mode as u32,
        size: st.st_size.max(0) as u64,
    })
}
