//! Iterative, descriptor-relative traversal that fills a [`Catalog`].

use std::ffi::OsStr;
use std::os::unix::ffi::OsStrExt;
use std::path::Path;
use std::time::{Duration, Instant};

use hoard_core::{Catalog, FileKey, FileRecord, IndexConfig, Status, StatusCode, TableError};
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;

use crate::flags::OpenFlags;
use crate::progress::IndexProgress;
use crate::stack::{TraversalStack, path_concat};
use crate::sys::stat_at;

/// What a call to [`search_current_directory`] did to the stack.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    /// A subdirectory was pushed and is now the top frame.
    Descended,
    /// The top frame was exhausted and popped.
    Finished,
}

/// Counters and warnings collected by one traversal.
#[derive(Debug, Clone, Default)]
pub struct TraverseOutcome {
    /// Permission-denied entries and directories that were skipped.
    pub warnings: Vec<Status>,
    /// Directories opened, including the root.
    pub directories: u64,
    /// Entries examined, excluding `.` and `..`.
    pub entries_seen: u64,
    /// Entries added to the catalog.
    pub cataloged: u64,
    /// Entries whose device and inode were already cataloged.
    pub aliases_skipped: u64,
    /// Wall time of the traversal.
    pub duration: Duration,
}

impl TraverseOutcome {
    /// Snapshot for progress subscribers.
    pub fn progress(&self, elapsed: Duration) -> IndexProgress {
        IndexProgress {
            entries_cataloged: self.cataloged,
            directories: self.directories,
            aliases_skipped: self.aliases_skipped,
            warnings: self.warnings.len() as u64,
            elapsed,
        }
    }

    fn record_warning(&mut self, status: Status) {
        let status = status.into_warning();
        tracing::warn!(path = ?status.path(), code = ?status.code(), "Permission denied, skipping");
        self.warnings.push(status);
    }
}

#[track_caller]
fn table_status(code: StatusCode, action: &str, err: TableError) -> Status {
    let status = Status::new(code, format!("{action}: {err}"));
    match err {
        TableError::Allocation => status.with_errno(libc::ENOMEM),
        _ => status,
    }
}

/// Read entries of the top frame until a subdirectory is pushed or the
/// frame is exhausted.
///
/// Unseen entries are cataloged under their device and inode; entries already
/// in the catalog are neither inserted again nor descended into. An `EACCES`
/// while reading an entry's metadata is recorded in `outcome` and the entry
/// is skipped. A push failure is returned with the parent frame still on top,
/// so the caller may record it and call again to resume the parent.
pub fn search_current_directory(
    stack: &mut TraversalStack,
    catalog: &mut Catalog,
    flags: OpenFlags,
    outcome: &mut TraverseOutcome,
) -> Result<Step, Status> {
    loop {
        let frame = stack
            .top_mut()
            .ok_or_else(|| Status::new(StatusCode::EmptyStack, "Searching directory"))?;

        let next = frame.stream_mut().next_name();
        let name = match next {
            Some(Ok(name)) => name,
            Some(Err(err)) => {
                return Err(Status::from_io(StatusCode::ReadDirectory, "Reading directory", &err)
                    .with_path(frame.path()));
            }
            None => {
                stack.pop()?;
                return Ok(Step::Finished);
            }
        };

        let bytes = name.to_bytes();
        if bytes == b"." || bytes == b".." {
            continue;
        }
        let entry_name = OsStr::from_bytes(bytes);
        outcome.entries_seen += 1;

        if let Some(capacity) = catalog
            .grow_if_needed()
            .map_err(|err| table_status(StatusCode::TableResize, "Resizing catalog", err))?
        {
            tracing::debug!(capacity, entries = catalog.len(), "Catalog resized");
        }

        let meta = match stat_at(frame.fd(), &name, flags.stat_mode()) {
            Ok(meta) => meta,
            Err(err) => {
                let status = Status::from_io(StatusCode::ReadMetadata, "Reading metadata", &err)
                    .with_path(entry_name);
                if status.is_permission_denied() {
                    outcome.record_warning(status);
                    continue;
                }
                return Err(status);
            }
        };

        let key = FileKey::new(meta.device, meta.inode);
        if catalog.contains(&key) {
            outcome.aliases_skipped += 1;
            continue;
        }

        let record = FileRecord::new(path_concat(frame.path(), entry_name), meta.mode, meta.size);
        let is_dir = record.is_dir();
        if let Err(err) = catalog.insert(key, record) {
            stack.pop()?;
            return Err(table_status(StatusCode::Allocation, "Cataloging entry", err));
        }
        outcome.cataloged += 1;

        if is_dir {
            stack.push(entry_name, flags)?;
            outcome.directories += 1;
            return Ok(Step::Descended);
        }
    }
}

/// Walk the tree under `root`, adding every unseen object to `catalog`.
///
/// The root itself is opened relative to the working directory and is not
/// cataloged. Permission-denied entries and subdirectories become warnings.
/// Any other failure, or a cancelled `cancel` token, releases every open
/// directory and returns the status; whatever was cataloged before that stays
/// in `catalog`.
pub fn traverse(
    root: impl AsRef<Path>,
    catalog: &mut Catalog,
    flags: OpenFlags,
    cancel: &CancellationToken,
) -> Result<TraverseOutcome, Status> {
    let mut outcome = TraverseOutcome::default();
    drive(root.as_ref(), catalog, flags, cancel, &mut outcome, |_| {})?;
    Ok(outcome)
}

/// Like [`traverse`], but counters and warnings go into `outcome`.
///
/// When the walk stops early, `outcome` still holds the warnings and counts
/// gathered up to that point.
pub fn traverse_into(
    root: impl AsRef<Path>,
    catalog: &mut Catalog,
    flags: OpenFlags,
    cancel: &CancellationToken,
    outcome: &mut TraverseOutcome,
) -> Result<(), Status> {
    drive(root.as_ref(), catalog, flags, cancel, outcome, |_| {})
}

fn drive<F>(
    root: &Path,
    catalog: &mut Catalog,
    flags: OpenFlags,
    cancel: &CancellationToken,
    outcome: &mut TraverseOutcome,
    mut observe: F,
) -> Result<(), Status>
where
    F: FnMut(&TraverseOutcome),
{
    if root.as_os_str().is_empty() {
        return Err(Status::new(StatusCode::NullArgument, "Traversal root is empty"));
    }

    let start = Instant::now();
    let mut stack = TraversalStack::new();

    // The root is resolved even when it is a symlink.
    stack.push(root, flags.difference(OpenFlags::NO_FOLLOW))?;
    outcome.directories += 1;
    tracing::debug!(root = %root.display(), ?flags, "Traversal started");

    while !stack.is_empty() {
        if cancel.is_cancelled() {
            let released = stack.unwind();
            outcome.duration += start.elapsed();
            tracing::debug!(
                released,
                cataloged = outcome.cataloged,
                warnings = outcome.warnings.len(),
                "Traversal cancelled"
            );
            return Err(Status::cancelled());
        }

        match search_current_directory(&mut stack, catalog, flags, outcome) {
            Ok(_) => {}
            Err(status) if status.is_permission_denied() => outcome.record_warning(status),
            Err(status) => {
                let released = stack.unwind();
                outcome.duration += start.elapsed();
                tracing::debug!(released, code = ?status.code(), "Traversal aborted");
                return Err(status);
            }
        }
        observe(outcome);
    }

    outcome.duration += start.elapsed();
    tracing::debug!(
        cataloged = outcome.cataloged,
        directories = outcome.directories,
        warnings = outcome.warnings.len(),
        "Traversal finished"
    );
    Ok(())
}

/// Reusable indexing front end with progress reporting and cancellation.
pub struct Traverser {
    config: IndexConfig,
    progress_tx: broadcast::Sender<IndexProgress>,
    cancel: CancellationToken,
}

impl Traverser {
    /// Create a traverser for `config`.
    pub fn new(config: IndexConfig) -> Self {
        let (progress_tx, _) = broadcast::channel(100);
        Self {
            config,
            progress_tx,
            cancel: CancellationToken::new(),
        }
    }

    /// Subscribe to progress snapshots.
    pub fn subscribe(&self) -> broadcast::Receiver<IndexProgress> {
        self.progress_tx.subscribe()
    }

    /// Token that stops a running index when cancelled.
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn config(&self) -> &IndexConfig {
        &self.config
    }

    pub fn flags(&self) -> OpenFlags {
        OpenFlags::from_config(&self.config)
    }

    /// Build a fresh catalog and index the configured root into it.
    pub fn index(&self) -> Result<(Catalog, TraverseOutcome), Status> {
        let mut catalog = Catalog::from_config(&self.config)
            .map_err(|err| table_status(StatusCode::TableCreate, "Creating catalog", err))?;
        let outcome = self.index_into(&mut catalog)?;
        Ok((catalog, outcome))
    }

    /// Index the configured root into an existing catalog.
    ///
    /// On failure `catalog` keeps everything indexed so far.
    pub fn index_into(&self, catalog: &mut Catalog) -> Result<TraverseOutcome, Status> {
        let mut outcome = TraverseOutcome::default();
        self.run(catalog, &mut outcome)?;
        Ok(outcome)
    }

    /// Index the configured root, collecting counters and warnings in
    /// `outcome`.
    ///
    /// A cancelled or failed run leaves both `catalog` and `outcome` holding
    /// what was gathered before it stopped.
    pub fn run(&self, catalog: &mut Catalog, outcome: &mut TraverseOutcome) -> Result<(), Status> {
        let start = Instant::now();
        let interval = self.config.progress_interval.max(1);
        let mut next_report = outcome.cataloged + interval;

        let result = drive(&self.config.root, catalog, self.flags(), &self.cancel, outcome, |outcome| {
            if outcome.cataloged >= next_report {
                let _ = self.progress_tx.send(outcome.progress(start.elapsed()));
                next_report = outcome.cataloged + interval;
            }
        });

        let _ = self.progress_tx.send(outcome.progress(start.elapsed()));
        result
    }
}
