//! The document-input seam.
//!
//! A document input binds a document to an external source of content —
//! typically a disk file. The engine consults it before the first
//! modification of an editing session and tells it when the modification
//! sign flips, which file-backed inputs use for deferred locking.

use std::path::PathBuf;

use vellum_primitives::NewlineKind;

use crate::Document;

/// External content source bound to a document.
#[allow(unused_variables)]
pub trait DocumentInput {
	/// A presentable location of the source, if bound to one.
	fn location(&self) -> Option<PathBuf>;

	/// The newline kind to use for lines without an intrinsic kind.
	fn default_newline(&self) -> NewlineKind {
		NewlineKind::default()
	}

	/// Asked before the first modification of a session. Returning `false`
	/// rejects the change; the caller of `replace` sees
	/// [`DocumentError::ChangeRejected`].
	///
	/// [`DocumentError::ChangeRejected`]: vellum_primitives::DocumentError::ChangeRejected
	fn is_changeable(&self, document: &Document) -> bool {
		true
	}

	/// Called when `is_modified` flips in either direction.
	fn modification_sign_changed(&mut self, document: &Document) {}
}
