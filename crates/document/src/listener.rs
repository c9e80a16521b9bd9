//! Document listener registration.

use vellum_primitives::Region;

use crate::Document;
use crate::change::DocumentChange;

/// Returned from [`DocumentListener::document_about_to_be_changed`] to veto
/// a change before it is applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChangeVeto;

/// Observer of document state.
///
/// Listeners are owned by the document and notified synchronously, in
/// registration order, from inside the mutating call. The partitioner (if
/// installed) always hears about a change before any listener. Callbacks
/// receive the document by shared reference; attempting to mutate it through
/// other means is rejected by the document's re-entry guard.
#[allow(unused_variables)]
pub trait DocumentListener {
	/// Called before a change is applied. Returning `Err(ChangeVeto)` aborts
	/// the change; the document is left untouched and the caller of
	/// `replace` sees [`DocumentError::ChangeRejected`].
	///
	/// [`DocumentError::ChangeRejected`]: vellum_primitives::DocumentError::ChangeRejected
	fn document_about_to_be_changed(
		&mut self,
		document: &Document,
		change: &DocumentChange,
	) -> Result<(), ChangeVeto> {
		Ok(())
	}

	/// Called after a change has been applied and all internal state
	/// (points, bookmarks, narrowing, partitioning) has been updated.
	fn document_changed(&mut self, document: &Document, change: &DocumentChange) {}

	/// Called when the accessible region is narrowed or widened.
	fn accessible_region_changed(&mut self, document: &Document) {}

	/// Called when `is_modified` flips.
	fn modification_sign_changed(&mut self, document: &Document) {}

	/// Called when the read-only flag flips.
	fn read_only_sign_changed(&mut self, document: &Document) {}

	/// Called when a document property changes.
	fn property_changed(&mut self, document: &Document, key: &str) {}

	/// Called when the partitioner reports a repartitioned region.
	fn partitioning_changed(&mut self, document: &Document, changed: &Region) {}
}

/// Handle identifying a registered listener.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(pub(crate) u64);
