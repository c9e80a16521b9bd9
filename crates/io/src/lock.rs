//! Advisory file locking.
//!
//! One OS-level lock handle exists per document input; taking a new lock
//! releases the prior one. On unix the lock is `flock`-based and
//! non-blocking; elsewhere locking degrades to a no-op so the surrounding
//! protocol still works.

use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::FileIoError;

/// The kind of lock held or desired.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LockType {
	/// No locking.
	#[default]
	None,
	/// Other readers may hold the file too.
	Shared,
	/// Sole holder.
	Exclusive,
}

/// A desired locking configuration.
///
/// With `only_as_editing` the lock is not taken until the document is first
/// modified, and is released when it returns to the unmodified state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LockMode {
	/// The kind of lock to hold.
	pub lock_type: LockType,
	/// Defer acquisition until the document is actually being edited.
	pub only_as_editing: bool,
}

/// Holder of at most one advisory lock.
#[derive(Debug, Default)]
pub(crate) struct FileLocker {
	file: Option<File>,
	lock_type: LockType,
	/// Set when the lock had to create the file; it is removed on unlock.
	delete_on_unlock: Option<PathBuf>,
}

impl FileLocker {
	pub(crate) fn has_lock(&self) -> bool {
		self.file.is_some()
	}

	/// The held lock type, [`LockType::None`] when nothing is held.
	pub(crate) fn lock_type(&self) -> LockType {
		if self.has_lock() {
			self.lock_type
		} else {
			LockType::None
		}
	}

	/// Locks `path`, releasing any prior lock on success.
	///
	/// Returns `true` when the lock was acquired exclusively by this
	/// process or as a fresh shared holder; `false` when a pre-existing
	/// shared holder was detected (shared mode only). A missing file is
	/// created and deleted again on unlock.
	pub(crate) fn lock(&mut self, path: &Path, shared: bool) -> Result<bool, FileIoError> {
		let already_shared = shared && probe_shared_holder(path);

		let mut created = false;
		let file = match File::open(path) {
			Ok(f) => f,
			Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
				created = true;
				OpenOptions::new()
					.read(true)
					.write(true)
					.create(true)
					.truncate(false)
					.open(path)
					.map_err(|e| FileIoError::io(path, e))?
			}
			Err(e) => return Err(FileIoError::io(path, e)),
		};
		acquire(&file, shared).map_err(|e| FileIoError::io(path, e))?;

		self.unlock();
		self.file = Some(file);
		self.lock_type = if shared {
			LockType::Shared
		} else {
			LockType::Exclusive
		};
		self.delete_on_unlock = created.then(|| path.to_path_buf());
		debug!(path = %path.display(), shared, already_shared, "file locked");
		Ok(!already_shared)
	}

	/// Releases the held lock; returns whether release succeeded.
	pub(crate) fn unlock(&mut self) -> bool {
		if let Some(file) = self.file.take() {
			drop(file);
			if let Some(path) = self.delete_on_unlock.take() {
				let _ = std::fs::remove_file(&path);
			}
			true
		} else {
			true
		}
	}
}

impl Drop for FileLocker {
	fn drop(&mut self) {
		self.unlock();
	}
}

/// Detects a pre-existing shared holder by probing for an exclusive lock.
#[cfg(unix)]
fn probe_shared_holder(path: &Path) -> bool {
	use rustix::fs::FlockOperation;
	match File::open(path) {
		Ok(file) => {
			let busy = rustix::fs::flock(&file, FlockOperation::NonBlockingLockExclusive).is_err();
			let _ = rustix::fs::flock(&file, FlockOperation::Unlock);
			busy
		}
		Err(_) => false,
	}
}

#[cfg(unix)]
fn acquire(file: &File, shared: bool) -> std::io::Result<()> {
	use rustix::fs::FlockOperation;
	let operation = if shared {
		FlockOperation::NonBlockingLockShared
	} else {
		FlockOperation::NonBlockingLockExclusive
	};
	rustix::fs::flock(file, operation).map_err(std::io::Error::from)
}

#[cfg(not(unix))]
fn probe_shared_holder(_path: &Path) -> bool {
	false
}

#[cfg(not(unix))]
fn acquire(_file: &File, _shared: bool) -> std::io::Result<()> {
	Ok(())
}
