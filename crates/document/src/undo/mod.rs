//! Undo/redo record keeping.
//!
//! The engine owns two stacks of records and the state of any open compound
//! frame. It records inverses of applied changes, merges textually adjacent
//! records, and hands records back out for the document to replay; the
//! replay itself (and the revision bookkeeping around it) is driven by
//! [`Document::undo`] and [`Document::redo`].
//!
//! [`Document::undo`]: crate::Document::undo
//! [`Document::redo`]: crate::Document::redo

#[cfg(test)]
mod tests;

use vellum_primitives::{DocumentError, Region};

use crate::change::DocumentChange;

/// One replace to perform when a record fires: erase `region`, insert `text`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct AtomicReplace {
	pub(crate) region: Region,
	pub(crate) text: String,
}

/// A unit on an undo or redo stack.
#[derive(Debug, Clone)]
pub(crate) enum UndoRecord {
	/// A single replace, with the revision interval it covers.
	Replace {
		atom: AtomicReplace,
		revision_before: u64,
		revision_after: u64,
	},
	/// A bracketed group fired as one unit; children are in fire order.
	Compound {
		children: Vec<AtomicReplace>,
		revision_before: u64,
		revision_after: u64,
	},
	/// Marker that blocks adjacency merging. Never fired.
	Boundary,
}

impl UndoRecord {
	fn is_boundary(&self) -> bool {
		matches!(self, UndoRecord::Boundary)
	}
}

/// Undo/redo stacks with compound and merge state.
#[derive(Debug, Default)]
pub(crate) struct UndoEngine {
	undo_stack: Vec<UndoRecord>,
	redo_stack: Vec<UndoRecord>,
	/// Nesting depth of `begin_compound_change`.
	compound_depth: usize,
	/// Inverses recorded while a compound frame is open, in recorded order.
	open_children: Vec<AtomicReplace>,
	/// Revision interval of the open frame.
	open_revisions: Option<(u64, u64)>,
	/// Set after undo/redo or an empty compound; blocks the next merge.
	merge_interrupted: bool,
}

impl UndoEngine {
	pub(crate) fn clear(&mut self) {
		self.undo_stack.clear();
		self.redo_stack.clear();
		self.compound_depth = 0;
		self.open_children.clear();
		self.open_revisions = None;
		self.merge_interrupted = false;
	}

	pub(crate) fn undoable_changes(&self) -> usize {
		let open = usize::from(!self.open_children.is_empty());
		self.undo_stack.iter().filter(|r| !r.is_boundary()).count() + open
	}

	pub(crate) fn redoable_changes(&self) -> usize {
		self.redo_stack.iter().filter(|r| !r.is_boundary()).count()
	}

	pub(crate) fn is_compound_changing(&self) -> bool {
		self.compound_depth > 0
	}

	/// Records the inverse of an applied change.
	///
	/// Inside a compound frame the inverse joins the frame. Otherwise it
	/// merges into the top record when the change is textually adjacent to
	/// it and nothing (boundary, undo, empty compound) broke the run, or is
	/// pushed as a fresh record. Recording always clears the redo stack.
	pub(crate) fn record(
		&mut self,
		change: &DocumentChange,
		erased_text: String,
		revision_before: u64,
		revision_after: u64,
	) {
		self.redo_stack.clear();

		let atom = AtomicReplace {
			region: change.inserted_region(),
			text: erased_text,
		};

		if self.compound_depth > 0 {
			let (first, _) = self.open_revisions.unwrap_or((revision_before, revision_after));
			self.open_revisions = Some((first, revision_after));
			self.open_children.push(atom);
			return;
		}

		if !self.merge_interrupted && self.try_merge(change, &atom, revision_after) {
			return;
		}

		self.undo_stack.push(UndoRecord::Replace {
			atom,
			revision_before,
			revision_after,
		});
		self.merge_interrupted = false;
	}

	/// Attempts adjacency merging of `change` into the top record.
	fn try_merge(&mut self, change: &DocumentChange, atom: &AtomicReplace, revision_after: u64) -> bool {
		let Some(UndoRecord::Replace {
			atom: top,
			revision_after: top_after,
			..
		}) = self.undo_stack.last_mut()
		else {
			return false;
		};

		let erased = change.erased_region();
		let inserted = change.inserted_region();

		// pure insertion appending at the end of the previous insertion
		if erased.is_empty()
			&& inserted.first.line == inserted.second.line
			&& !top.region.is_empty()
			&& top.region.second == inserted.first
		{
			top.region.second = inserted.second;
			*top_after = revision_after;
			return true;
		}

		// pure erasure abutting the previous erasure on either side
		if inserted.is_empty()
			&& erased.first.line == erased.second.line
			&& top.region.is_empty()
			&& !top.text.is_empty()
		{
			if top.region.first == erased.first {
				// deleting forward at the same spot
				top.text.push_str(&atom.text);
				*top_after = revision_after;
				return true;
			}
			if top.region.first == erased.second {
				// deleting backward toward the document beginning
				let mut text = atom.text.clone();
				text.push_str(&top.text);
				top.text = text;
				top.region = Region::make_empty(erased.first);
				*top_after = revision_after;
				return true;
			}
		}

		false
	}

	/// Pushes a boundary unless one is already on top. Ignored inside a
	/// compound frame.
	pub(crate) fn insert_boundary(&mut self) {
		if self.compound_depth > 0 {
			return;
		}
		if !matches!(self.undo_stack.last(), Some(UndoRecord::Boundary)) {
			self.undo_stack.push(UndoRecord::Boundary);
		}
	}

	pub(crate) fn begin_compound(&mut self) {
		self.compound_depth += 1;
	}

	/// Closes the innermost compound frame.
	pub(crate) fn end_compound(&mut self) -> Result<(), DocumentError> {
		if self.compound_depth == 0 {
			return Err(DocumentError::IllegalState("no compound change is open"));
		}
		self.compound_depth -= 1;
		if self.compound_depth == 0 {
			self.close_frame();
		}
		Ok(())
	}

	/// Closes every open frame, as when undo interrupts a composition.
	pub(crate) fn force_close_compound(&mut self) {
		if self.compound_depth > 0 {
			self.compound_depth = 0;
			self.close_frame();
		}
	}

	fn close_frame(&mut self) {
		if self.open_children.is_empty() {
			// an empty compound still breaks automatic composition
			self.merge_interrupted = true;
			self.open_revisions = None;
			return;
		}
		let (revision_before, revision_after) = self
			.open_revisions
			.take()
			.expect("open frame has children, so revisions were recorded");
		let mut children = std::mem::take(&mut self.open_children);
		children.reverse(); // recorded order -> fire order
		self.undo_stack.push(UndoRecord::Compound {
			children,
			revision_before,
			revision_after,
		});
		self.merge_interrupted = false;
	}

	/// Pops the next record to undo, discarding trailing boundaries.
	pub(crate) fn pop_undoable(&mut self) -> Option<UndoRecord> {
		while matches!(self.undo_stack.last(), Some(UndoRecord::Boundary)) {
			self.undo_stack.pop();
		}
		let record = self.undo_stack.pop();
		if record.is_some() {
			self.merge_interrupted = true;
		}
		record
	}

	/// Pops the next record to redo, discarding trailing boundaries.
	pub(crate) fn pop_redoable(&mut self) -> Option<UndoRecord> {
		while matches!(self.redo_stack.last(), Some(UndoRecord::Boundary)) {
			self.redo_stack.pop();
		}
		let record = self.redo_stack.pop();
		if record.is_some() {
			self.merge_interrupted = true;
		}
		record
	}

	/// Pushes a record transferred from the other stack; no merging.
	pub(crate) fn push_undo(&mut self, record: UndoRecord) {
		self.undo_stack.push(record);
	}

	/// Pushes a record transferred from the other stack.
	pub(crate) fn push_redo(&mut self, record: UndoRecord) {
		self.redo_stack.push(record);
	}
}
