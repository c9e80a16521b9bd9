//! The partitioner seam.
//!
//! A partitioner classifies every position of its document into a content
//! type. The document owns at most one partitioner exclusively; installing a
//! new one releases the previous. The engine only defines the contract —
//! the lexical implementation lives in its own crate.

use vellum_primitives::{ContentType, Position, Region};

use crate::Document;
use crate::change::DocumentChange;

/// A maximal run of positions sharing one content type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DocumentPartition {
	/// The run's content type.
	pub content_type: ContentType,
	/// The run's extent; `region.second` is the start of the next partition
	/// or the document end.
	pub region: Region,
}

/// Maintains the partitioning of a document.
///
/// The document notifies the installed partitioner of every change *before*
/// general listeners, so listeners observe consistent partitioning.
#[allow(unused_variables)]
pub trait DocumentPartitioner {
	/// Called when the partitioner is installed (and again after a content
	/// reset). Must compute partition state for the entire document.
	fn install(&mut self, document: &Document);

	/// Called when the partitioner is replaced or removed.
	fn uninstall(&mut self) {}

	/// Called before a change is applied to the line store.
	fn document_about_to_be_changed(&mut self, document: &Document) {}

	/// Called after a change; returns the region whose partitioning changed,
	/// if any, for re-broadcast to listeners.
	fn document_changed(&mut self, document: &Document, change: &DocumentChange)
	-> Option<Region>;

	/// The partition containing `at`. `at` has been validated against the
	/// document.
	fn partition_at(&self, document: &Document, at: Position) -> DocumentPartition;
}

/// The partition query result when no partitioner is installed: the whole
/// document is one default-typed partition.
pub(crate) fn default_partition(document: &Document) -> DocumentPartition {
	DocumentPartition {
		content_type: ContentType::DEFAULT,
		region: document.region(),
	}
}
