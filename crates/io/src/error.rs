//! Error types of the file-binding layer.

use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;
use vellum_primitives::DocumentError;

/// Errors raised by file I/O, encoding conversion, and the document input.
#[derive(Debug, Error)]
pub enum FileIoError {
	/// An operating-system I/O failure on `path`.
	#[error("i/o error on {}: {source}", path.display())]
	Io {
		path: PathBuf,
		#[source]
		source: io::Error,
	},

	/// No encoder or detector answers to the given name.
	#[error("unsupported encoding {0:?}")]
	UnsupportedEncoding(String),

	/// The encoder could not represent a character in the target encoding.
	#[error("encountered an unmappable character in encoding/decoding")]
	UnmappableCharacter,

	/// The decoder found invalid input.
	#[error("malformed input")]
	MalformedInput,

	/// The operation requires a literal newline kind.
	#[error("the newline kind has no literal representation")]
	NonLiteralNewline,

	/// The bound path names a device, FIFO, or other non-regular file.
	#[error("{} is a special file", .0.display())]
	SpecialFile(PathBuf),

	/// The original file disappeared while replacing it and the replacement
	/// could not be moved into place.
	#[error("lost the disk file {}", .0.display())]
	LostDiskFile(PathBuf),

	/// The input is not bound to a file.
	#[error("the input is not bound to a file")]
	NotBound,

	/// A document-level failure while streaming content.
	#[error(transparent)]
	Document(#[from] DocumentError),
}

impl FileIoError {
	/// Wraps an OS error together with the path it occurred on.
	pub fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
		Self::Io {
			path: path.into(),
			source,
		}
	}

	/// Whether this is an OS error meaning the file does not exist.
	pub fn is_file_not_found(&self) -> bool {
		matches!(self, Self::Io { source, .. } if source.kind() == io::ErrorKind::NotFound)
	}

	/// Whether this is an OS error meaning access was denied.
	pub fn is_permission_denied(&self) -> bool {
		matches!(self, Self::Io { source, .. } if source.kind() == io::ErrorKind::PermissionDenied)
	}
}

/// Maps a closure's `io::Error` onto [`FileIoError::Io`] for `path`.
pub(crate) fn at_path<T>(path: &Path, result: io::Result<T>) -> Result<T, FileIoError> {
	result.map_err(|e| FileIoError::io(path, e))
}
