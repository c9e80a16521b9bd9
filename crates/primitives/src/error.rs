//! The shared error type of the document layer.

use thiserror::Error;

use crate::position::{Position, Region};

/// Errors raised by document-model operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DocumentError {
	/// The position names a line that does not exist, an offset beyond the
	/// line length, or an offset off a character boundary.
	#[error("bad position {0}")]
	BadPosition(Position),

	/// The region has an end outside the document.
	#[error("bad region {0}")]
	BadRegion(Region),

	/// The mutation escapes the narrowed accessible region.
	#[error("region {0} escapes the accessible region")]
	AccessViolation(Region),

	/// The document is read-only.
	#[error("the document is read-only")]
	ReadOnly,

	/// A listener vetoed the change; the document is unchanged.
	#[error("a listener rejected the change")]
	ChangeRejected,

	/// The operation is not permitted in the document's current state, such
	/// as mutating from within a change notification.
	#[error("illegal state: {0}")]
	IllegalState(&'static str),

	/// A parameter is out of the operation's domain.
	#[error("invalid argument: {0}")]
	InvalidArgument(&'static str),

	/// An iterator was stepped past its end or its beginning.
	#[error("no such element")]
	NoSuchElement,
}
