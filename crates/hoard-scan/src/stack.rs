//! Explicit stack of open directories, replacing call recursion.

use std::ffi::{CString, OsStr, OsString};
use std::os::fd::RawFd;
use std::os::unix::ffi::{OsStrExt, OsStringExt};
use std::path::{Path, PathBuf};

use hoard_core::{Status, StatusCode};

use crate::flags::OpenFlags;
use crate::sys::DirStream;

/// Join a directory path and an entry name.
///
/// An empty or `"."` base yields `name` verbatim, so the result never starts
/// with `./`. A separator is added only if `base` does not already end with
/// one.
pub fn path_concat(base: impl AsRef<Path>, name: impl AsRef<OsStr>) -> PathBuf {
    let base = base.as_ref().as_os_str().as_bytes();
    let name = name.as_ref().as_bytes();

    if base.is_empty() || base == b"." {
        return PathBuf::from(OsStr::from_bytes(name));
    }

    let mut joined = Vec::with_capacity(base.len() + 1 + name.len());
    joined.extend_from_slice(base);
    if !base.ends_with(b"/") {
        joined.push(b'/');
    }
    joined.extend_from_slice(name);
    PathBuf::from(OsString::from_vec(joined))
}

/// One open directory on the traversal stack.
#[derive(Debug)]
pub struct DirFrame {
    name: OsString,
    stream: DirStream,
    path: PathBuf,
}

impl DirFrame {
    /// Entry name the directory was opened by.
    pub fn name(&self) -> &OsStr {
        &self.name
    }

    /// Path of the directory, relative to the traversal root argument.
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub(crate) fn fd(&self) -> RawFd {
        self.stream.fd()
    }

    pub(crate) fn stream_mut(&mut self) -> &mut DirStream {
        &mut self.stream
    }
}

/// LIFO of open directory frames.
///
/// Each frame exclusively owns its stream; dropping the stack, popping or
/// unwinding releases every frame exactly once.
#[derive(Debug, Default)]
pub struct TraversalStack {
    frames: Vec<DirFrame>,
}

impl TraversalStack {
    /// Create an empty stack.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of open frames.
    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// The directory currently being searched.
    pub fn top(&self) -> Option<&DirFrame> {
        self.frames.last()
    }

    pub(crate) fn top_mut(&mut self) -> Option<&mut DirFrame> {
        self.frames.last_mut()
    }

    /// Open `name` relative to the top frame and make it the new top.
    ///
    /// With an empty stack, `name` is resolved against the working directory.
    /// On failure the stack is unchanged and the status carries the path that
    /// could not be opened.
    pub fn push(&mut self, name: impl AsRef<OsStr>, flags: OpenFlags) -> Result<(), Status> {
        let name = name.as_ref();
        let (parent_fd, parent_path) = match self.frames.last() {
            Some(frame) => (Some(frame.fd()), frame.path()),
            None => (None, Path::new("")),
        };
        let path = path_concat(parent_path, name);

        let c_name = CString::new(name.as_bytes()).map_err(|_| {
            Status::new(StatusCode::OpenDirectory, "Opening directory")
                .with_errno(libc::EINVAL)
                .with_path(&path)
        })?;

        let stream = DirStream::open_at(parent_fd, &c_name, flags.open_mode()).map_err(|err| {
            Status::from_io(StatusCode::OpenDirectory, "Opening directory", &err).with_path(&path)
        })?;

        tracing::trace!(path = %path.display(), depth = self.frames.len() + 1, "Pushed directory");
        self.frames.push(DirFrame {
            name: name.to_os_string(),
            stream,
            path,
        });
        Ok(())
    }

    /// Remove and release the top frame.
    pub fn pop(&mut self) -> Result<(), Status> {
        let frame = self
            .frames
            .pop()
            .ok_or_else(|| Status::new(StatusCode::EmptyStack, "Popping directory"))?;
        tracing::trace!(path = %frame.path.display(), "Popped directory");
        Ok(())
    }

    /// Pop every frame. Returns how many were released.
    pub fn unwind(&mut self) -> usize {
        let mut released = 0;
        while self.pop().is_ok() {
            released += 1;
        }
        released
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hoard_core::Severity;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_path_concat() {
        assert_eq!(path_concat("", "a"), PathBuf::from("a"));
        assert_eq!(path_concat(".", "a"), PathBuf::from("a"));
        assert_eq!(path_concat("a", "b"), PathBuf::from("a/b"));
        assert_eq!(path_concat("a/", "b"), PathBuf::from("a/b"));
        assert_eq!(path_concat("/", "etc"), PathBuf::from("/etc"));
        assert_eq!(path_concat("./x", "y"), PathBuf::from("./x/y"));
    }

    #[test]
    fn test_path_concat_keeps_non_utf8_names() {
        let name = OsStr::from_bytes(b"caf\xe9");
        let joined = path_concat("dir", name);
        assert_eq!(joined.as_os_str().as_bytes(), b"dir/caf\xe9");
    }

    #[test]
    fn test_push_and_pop() {
        let temp = TempDir::new().unwrap();
        fs::create_dir(temp.path().join("child")).unwrap();

        let mut stack = TraversalStack::new();
        stack.push(temp.path(), OpenFlags::NO_FOLLOW).unwrap();
        stack.push("child", OpenFlags::NO_FOLLOW).unwrap();

        assert_eq!(stack.len(), 2);
        assert_eq!(stack.top().unwrap().name(), OsStr::new("child"));
        assert_eq!(stack.top().unwrap().path(), temp.path().join("child"));

        stack.pop().unwrap();
        assert_eq!(stack.top().unwrap().path(), temp.path());
        stack.pop().unwrap();
        assert!(stack.is_empty());
    }

    #[test]
    fn test_failed_push_leaves_stack_unchanged() {
        let temp = TempDir::new().unwrap();
        let mut stack = TraversalStack::new();
        stack.push(temp.path(), OpenFlags::NO_FOLLOW).unwrap();

        let status = stack.push("missing", OpenFlags::NO_FOLLOW).unwrap_err();
        assert_eq!(status.code(), StatusCode::OpenDirectory);
        assert_eq!(status.errno(), Some(libc::ENOENT));
        assert_eq!(status.path(), Some(temp.path().join("missing").as_path()));
        assert_eq!(stack.len(), 1);
    }

    #[test]
    fn test_push_refuses_symlink_with_no_follow() {
        let temp = TempDir::new().unwrap();
        fs::create_dir(temp.path().join("real")).unwrap();
        std::os::unix::fs::symlink("real", temp.path().join("link")).unwrap();

        let mut stack = TraversalStack::new();
        stack.push(temp.path(), OpenFlags::NO_FOLLOW).unwrap();
        assert!(stack.push("link", OpenFlags::NO_FOLLOW).is_err());
        assert!(stack.push("link", OpenFlags::empty()).is_ok());
    }

    #[test]
    fn test_pop_empty_is_internal() {
        let mut stack = TraversalStack::new();
        let status = stack.pop().unwrap_err();
        assert_eq!(status.severity(), Severity::Internal);
        assert_eq!(status.code(), StatusCode::EmptyStack);
    }

    #[test]
    fn test_unwind() {
        let temp = TempDir::new().unwrap();
        fs::create_dir_all(temp.path().join("a/b/c")).unwrap();

        let mut stack = TraversalStack::new();
        stack.push(temp.path(), OpenFlags::NO_FOLLOW).unwrap();
        for name in ["a", "b", "c"] {
            stack.push(name, OpenFlags::NO_FOLLOW).unwrap();
        }
        assert_eq!(stack.top().unwrap().path(), temp.path().join("a/b/c"));
        assert_eq!(stack.unwind(), 4);
        assert!(stack.is_empty());
    }
}
