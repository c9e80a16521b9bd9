//! The document coordinator.
//!
//! A [`Document`] owns the line store, undo engine, bookmarks, point arena,
//! narrowing bounds, listeners, the installed partitioner and the bound
//! input. Every mutation funnels through [`Document::replace`], which runs
//! the change protocol: veto, mutate, record, adapt, repartition, notify.


use std::collections::BTreeMap;

use tracing::{debug, error};
use vellum_primitives::{ContentType, Direction, DocumentError, Position, Region};

use crate::bookmark::{BookmarkSet, Bookmarker, BookmarkerMut};
use crate::change::{DocumentChange, update_position};
use crate::input::DocumentInput;
use crate::line_store::{Line, LineStore};
use crate::listener::{DocumentListener, ListenerId};
use crate::partitioner::{DocumentPartition, DocumentPartitioner, default_partition};
use crate::point::{PointArena, PointId};
use crate::undo::{AtomicReplace, UndoEngine, UndoRecord};

/// The in-memory document model.
///
/// A document is always at least one line long. It tracks a monotonic
/// revision counter for forward edits (undo rewinds it), a saved revision
/// that defines the modification sign, an optional narrowed accessible
/// region, and the registered observers.
///
/// The document assumes a single caller at a time; callbacks run
/// synchronously inside the mutating call, and re-entrant mutation is
/// rejected with [`DocumentError::IllegalState`].
pub struct Document {
	lines: LineStore,
	revision: u64,
	saved_revision: u64,
	forced_modified: bool,
	read_only: bool,
	changing: bool,
	recording: bool,
	accessible: Option<Region>,
	undo: UndoEngine,
	bookmarks: BookmarkSet,
	points: PointArena,
	listeners: Vec<(ListenerId, Box<dyn DocumentListener>)>,
	next_listener: u64,
	partitioner: Option<Box<dyn DocumentPartitioner>>,
	input: Option<Box<dyn DocumentInput>>,
	properties: BTreeMap<String, String>,
}

impl Document {
	/// The property key carrying the document's title.
	pub const TITLE_PROPERTY: &'static str = "title";

	/// Creates an empty document: one empty line, revision zero, unmodified.
	pub fn new() -> Self {
		Self {
			lines: LineStore::new(),
			revision: 0,
			saved_revision: 0,
			forced_modified: false,
			read_only: false,
			changing: false,
			recording: true,
			accessible: None,
			undo: UndoEngine::default(),
			bookmarks: BookmarkSet::default(),
			points: PointArena::default(),
			listeners: Vec::new(),
			next_listener: 0,
			partitioner: None,
			input: None,
			properties: BTreeMap::new(),
		}
	}

	// --- content queries ---------------------------------------------------

	/// The number of lines; at least one.
	pub fn number_of_lines(&self) -> usize {
		self.lines.len()
	}

	/// Total content length in bytes, each newline counting as one.
	pub fn length(&self) -> usize {
		self.lines.characters()
	}

	/// The full line record at `line`.
	pub fn line_content(&self, line: usize) -> Result<&Line, DocumentError> {
		self.lines.line(line)
	}

	/// The text of `line`, without its terminator.
	pub fn line_text(&self, line: usize) -> Result<&str, DocumentError> {
		self.lines.line(line).map(Line::text)
	}

	/// The byte length of `line`.
	pub fn line_length(&self, line: usize) -> Result<usize, DocumentError> {
		self.lines.line(line).map(|l| l.text().len())
	}

	/// The region covering the whole document.
	pub fn region(&self) -> Region {
		Region::new(Position::zero(), self.lines.end_position())
	}

	/// The text covered by `region`, joined with each line's stored newline.
	pub fn region_text(&self, region: Region) -> Result<String, DocumentError> {
		self.lines.region_text(region)
	}

	/// The whole document text.
	pub fn text(&self) -> String {
		self.lines
			.region_text(self.region())
			.expect("the whole region is always valid")
	}

	/// Validates `at` against the current content.
	pub fn check_position(&self, at: Position) -> Result<(), DocumentError> {
		self.lines.check_position(at)
	}

	// --- flags and revisions -----------------------------------------------

	/// The revision number. Increments on every successful mutation; undo
	/// rewinds it to the revision before the undone record.
	pub fn revision_number(&self) -> u64 {
		self.revision
	}

	/// Whether the document differs from its saved state: the revision
	/// differs from the saved revision, or modification was forced.
	pub fn is_modified(&self) -> bool {
		self.forced_modified || self.revision != self.saved_revision
	}

	/// Forces the modification sign on.
	pub fn set_modified(&mut self) {
		let was = self.is_modified();
		self.forced_modified = true;
		if !was {
			self.notify_modification_sign();
		}
	}

	/// Snapshots the current revision as the saved revision and clears the
	/// modification sign.
	pub fn mark_unmodified(&mut self) {
		let was = self.is_modified();
		self.forced_modified = false;
		self.saved_revision = self.revision;
		if was {
			self.notify_modification_sign();
		}
	}

	/// Whether the document rejects mutations.
	pub fn is_read_only(&self) -> bool {
		self.read_only
	}

	/// Sets the read-only flag, notifying listeners on a flip.
	pub fn set_read_only(&mut self, read_only: bool) {
		if self.read_only != read_only {
			self.read_only = read_only;
			self.notify(|l, doc| l.read_only_sign_changed(doc));
		}
	}

	/// Whether a mutation is currently in flight (listeners are being
	/// notified).
	pub fn is_changing(&self) -> bool {
		self.changing
	}

	// --- properties --------------------------------------------------------

	/// The value of property `key`.
	pub fn property(&self, key: &str) -> Option<&str> {
		self.properties.get(key).map(String::as_str)
	}

	/// Sets property `key`, notifying property listeners.
	pub fn set_property(&mut self, key: &str, value: impl Into<String>) {
		self.properties.insert(key.to_string(), value.into());
		let key = key.to_string();
		self.notify(|l, doc| l.property_changed(doc, &key));
	}

	// --- narrowing ---------------------------------------------------------

	/// The region mutations are permitted in.
	pub fn accessible_region(&self) -> Region {
		self.accessible.unwrap_or_else(|| self.region())
	}

	/// Whether the accessible region is a proper subset of the document.
	pub fn is_narrowed(&self) -> bool {
		self.accessible_region() != self.region()
	}

	/// Restricts mutations to `region`.
	pub fn narrow_to_region(&mut self, region: Region) -> Result<(), DocumentError> {
		self.lines.check_region(region)?;
		self.accessible = Some(region);
		self.notify(|l, doc| l.accessible_region_changed(doc));
		Ok(())
	}

	/// Restores the accessible region to the whole document.
	pub fn widen(&mut self) {
		if self.accessible.take().is_some() {
			self.notify(|l, doc| l.accessible_region_changed(doc));
		}
	}

	// --- listeners, partitioner, input -------------------------------------

	/// Registers a listener; notification order is registration order.
	pub fn add_listener(&mut self, listener: Box<dyn DocumentListener>) -> ListenerId {
		let id = ListenerId(self.next_listener);
		self.next_listener += 1;
		self.listeners.push((id, listener));
		id
	}

	/// Removes a listener; returns whether it was registered.
	pub fn remove_listener(&mut self, id: ListenerId) -> bool {
		let before = self.listeners.len();
		self.listeners.retain(|(lid, _)| *lid != id);
		self.listeners.len() != before
	}

	/// Installs `partitioner` (releasing any previous one) or removes the
	/// current one. The new partitioner computes state for the entire
	/// document before this returns.
	pub fn set_partitioner(&mut self, partitioner: Option<Box<dyn DocumentPartitioner>>) {
		if let Some(mut old) = self.partitioner.take() {
			old.uninstall();
		}
		if let Some(mut p) = partitioner {
			p.install(self);
			self.partitioner = Some(p);
		}
		let whole = self.region();
		self.notify(|l, doc| l.partitioning_changed(doc, &whole));
	}

	/// The partition containing `at`. Without a partitioner the whole
	/// document is one default-typed partition.
	pub fn partition_at(&self, at: Position) -> Result<DocumentPartition, DocumentError> {
		self.lines.check_position(at)?;
		Ok(match &self.partitioner {
			Some(p) => p.partition_at(self, at),
			None => default_partition(self),
		})
	}

	/// The content type at `at`; shorthand for the partition query.
	pub fn content_type_at(&self, at: Position) -> Result<ContentType, DocumentError> {
		self.partition_at(at).map(|p| p.content_type)
	}

	/// Binds `input` as the document's content source, or unbinds.
	pub fn set_input(&mut self, input: Option<Box<dyn DocumentInput>>) {
		self.input = input;
	}

	/// The bound input, if any.
	pub fn input(&self) -> Option<&dyn DocumentInput> {
		self.input.as_deref()
	}

	// --- points ------------------------------------------------------------

	/// Registers an adapting, forward-gravity point at `at`.
	pub fn create_point(&mut self, at: Position) -> Result<PointId, DocumentError> {
		self.lines.check_position(at)?;
		Ok(self.points.insert(at))
	}

	/// Releases a point handle.
	///
	/// # Panics
	///
	/// Panics if `id` was already released.
	pub fn release_point(&mut self, id: PointId) {
		self.points.remove(id);
	}

	/// The point's current position.
	///
	/// # Panics
	///
	/// Panics if `id` was released.
	pub fn point_position(&self, id: PointId) -> Position {
		self.points.get(id).position
	}

	/// Moves the point to `to`.
	pub fn move_point_to(&mut self, id: PointId, to: Position) -> Result<(), DocumentError> {
		self.lines.check_position(to)?;
		self.points.get_mut(id).position = to;
		Ok(())
	}

	/// The point's gravity.
	pub fn point_gravity(&self, id: PointId) -> Direction {
		self.points.get(id).gravity
	}

	/// Sets which side of an insertion at the point it follows.
	pub fn set_point_gravity(&mut self, id: PointId, gravity: Direction) {
		self.points.get_mut(id).gravity = gravity;
	}

	/// Whether the point rewrites itself on changes.
	pub fn point_adapts(&self, id: PointId) -> bool {
		self.points.get(id).adapts
	}

	/// Enables or disables adaptation. A non-adapting point keeps stale
	/// coordinates; their validity is not guaranteed.
	pub fn set_point_adapts(&mut self, id: PointId, adapts: bool) {
		self.points.get_mut(id).adapts = adapts;
	}

	// --- bookmarks ---------------------------------------------------------

	/// Read access to the bookmarks.
	pub fn bookmarker(&self) -> Bookmarker<'_> {
		Bookmarker::new(&self.bookmarks, self.lines.len())
	}

	/// Mutable access to the bookmarks.
	pub fn bookmarker_mut(&mut self) -> BookmarkerMut<'_> {
		BookmarkerMut::new(&mut self.bookmarks, self.lines.len())
	}

	// --- mutation ----------------------------------------------------------

	/// Erases `region` and inserts `text` at its beginning, returning the
	/// end of the inserted text.
	///
	/// `text` may contain any mixture of the six literal newline kinds; each
	/// becomes a line boundary keeping its kind. Exactly one
	/// [`DocumentChange`] is emitted. The operation is transactional: on any
	/// error nothing is observable — content, revision, undo stacks and the
	/// modification sign are untouched.
	///
	/// # Errors
	///
	/// * [`DocumentError::IllegalState`] — called from inside a change
	///   notification
	/// * [`DocumentError::ReadOnly`] — the document is read-only
	/// * [`DocumentError::BadRegion`] — `region` is not inside the document
	/// * [`DocumentError::AccessViolation`] — `region` escapes the narrowed
	///   accessible region
	/// * [`DocumentError::ChangeRejected`] — a listener vetoed, or the bound
	///   input refused the first modification
	pub fn replace(&mut self, region: Region, text: &str) -> Result<Position, DocumentError> {
		self.replace_and_capture(region, text, true)
			.map(|(end, _)| end)
	}

	fn replace_and_capture(
		&mut self,
		region: Region,
		text: &str,
		record: bool,
	) -> Result<(Position, String), DocumentError> {
		if self.changing {
			return Err(DocumentError::IllegalState(
				"the document is already being changed",
			));
		}
		if self.read_only {
			return Err(DocumentError::ReadOnly);
		}
		self.lines.check_region(region)?;
		if !self.accessible_region().encompasses(&region) {
			return Err(DocumentError::AccessViolation(region));
		}
		if region.is_empty() && text.is_empty() {
			return Ok((region.first, String::new()));
		}

		// consult the bound input before the first modification of a session
		if !self.is_modified()
			&& let Some(input) = &self.input
			&& !input.is_changeable(self)
		{
			return Err(DocumentError::ChangeRejected);
		}

		let inserted_end = if text.is_empty() {
			region.first
		} else {
			self.lines.end_of_insertion(region.first, text)
		};
		let change = DocumentChange::new(
			region,
			Region::new(region.first, inserted_end),
			text.to_string(),
		);

		let was_modified = self.is_modified();
		self.changing = true;

		if let Some(mut p) = self.partitioner.take() {
			p.document_about_to_be_changed(self);
			self.partitioner = Some(p);
		}
		if let Err(e) = self.notify_about_to_change(&change) {
			self.changing = false;
			return Err(e);
		}

		let revision_before = self.revision;
		let (end, erased) = self.lines.replace(region, text, revision_before + 1);
		debug_assert_eq!(end, inserted_end);
		self.revision = revision_before + 1;

		if record && self.recording {
			self.undo
				.record(&change, erased.clone(), revision_before, self.revision);
		}

		if let Some(acc) = self.accessible {
			self.accessible = Some(Region::new(
				update_position(acc.first, &change, Direction::Backward),
				update_position(acc.second, &change, Direction::Forward),
			));
		}

		self.bookmarks.adapt_to_change(&change);
		self.points.adapt_to_change(&change);

		if let Some(mut p) = self.partitioner.take() {
			let repartitioned = p.document_changed(self, &change);
			self.partitioner = Some(p);
			if let Some(changed) = repartitioned {
				self.notify(|l, doc| l.partitioning_changed(doc, &changed));
			}
		}

		if self.is_modified() != was_modified {
			self.notify_modification_sign();
		}

		self.notify(|l, doc| l.document_changed(doc, &change));
		self.changing = false;

		Ok((end, erased))
	}

	/// Rewinds to a single empty line: clears undo history and bookmarks,
	/// widens, resets the revision to zero and the modification sign to
	/// clean. Adapting points jump to the beginning; non-adapting points
	/// keep their stale coordinates.
	///
	/// # Panics
	///
	/// Panics when called from inside a change notification.
	pub fn reset_content(&mut self) {
		assert!(!self.changing, "content reset during change notification");
		let was_modified = self.is_modified();
		let was_narrowed = self.accessible.is_some();

		self.lines = LineStore::new();
		self.undo.clear();
		self.bookmarks.clear();
		self.revision = 0;
		self.saved_revision = 0;
		self.forced_modified = false;
		self.accessible = None;
		self.points.reset();

		if let Some(mut p) = self.partitioner.take() {
			p.install(self);
			self.partitioner = Some(p);
			let whole = self.region();
			self.notify(|l, doc| l.partitioning_changed(doc, &whole));
		}
		if was_narrowed {
			self.notify(|l, doc| l.accessible_region_changed(doc));
		}
		if was_modified {
			self.notify_modification_sign();
		}
	}

	// --- undo/redo ---------------------------------------------------------

	/// Whether changes are being recorded for undo.
	pub fn is_recording_changes(&self) -> bool {
		self.recording
	}

	/// Enables or disables undo recording. Disabled changes are simply not
	/// recorded; existing history is kept.
	pub fn record_changes(&mut self, record: bool) {
		self.recording = record;
	}

	/// Discards all undo and redo history.
	pub fn clear_undo_buffer(&mut self) {
		self.undo.clear();
	}

	/// The number of undoable changes; boundaries do not count.
	pub fn number_of_undoable_changes(&self) -> usize {
		self.undo.undoable_changes()
	}

	/// The number of redoable changes.
	pub fn number_of_redoable_changes(&self) -> usize {
		self.undo.redoable_changes()
	}

	/// Pushes a merge-blocking boundary unless one is already on top.
	/// Ignored while a compound change is open.
	pub fn insert_undo_boundary(&mut self) {
		self.undo.insert_boundary();
	}

	/// Opens a compound frame; frames stack.
	pub fn begin_compound_change(&mut self) {
		self.undo.begin_compound();
	}

	/// Closes the innermost compound frame. Closing the outermost frame
	/// records the group as one undo unit (or, when empty, merely breaks
	/// automatic merging).
	pub fn end_compound_change(&mut self) -> Result<(), DocumentError> {
		self.undo.end_compound()
	}

	/// Whether a compound frame is open.
	pub fn is_compound_changing(&self) -> bool {
		self.undo.is_compound_changing()
	}

	/// Undoes the latest `n` changes. An open compound frame is closed
	/// first and undone as one unit.
	///
	/// # Errors
	///
	/// [`DocumentError::InvalidArgument`] when `n` is zero or exceeds
	/// [`number_of_undoable_changes`]; [`DocumentError::IllegalState`] from
	/// inside a notification. A compound whose replay fails midway is
	/// rolled back before the error propagates.
	///
	/// [`number_of_undoable_changes`]: Self::number_of_undoable_changes
	pub fn undo(&mut self, n: usize) -> Result<(), DocumentError> {
		if self.changing {
			return Err(DocumentError::IllegalState(
				"the document is already being changed",
			));
		}
		self.undo.force_close_compound();
		if n == 0 || n > self.undo.undoable_changes() {
			return Err(DocumentError::InvalidArgument(
				"undo count exceeds the undoable changes",
			));
		}
		for _ in 0..n {
			let record = self.undo.pop_undoable().expect("count checked above");
			match record {
				UndoRecord::Replace {
					atom,
					revision_before,
					revision_after,
				} => match self.fire(&atom) {
					Ok(inverse) => {
						self.undo.push_redo(UndoRecord::Replace {
							atom: inverse,
							revision_before,
							revision_after,
						});
						self.rewind_revision(revision_before);
					}
					Err(e) => {
						self.undo.push_undo(UndoRecord::Replace {
							atom,
							revision_before,
							revision_after,
						});
						return Err(e);
					}
				},
				UndoRecord::Compound {
					children,
					revision_before,
					revision_after,
				} => match self.fire_all(&children) {
					Ok(mut fired) => {
						fired.reverse();
						self.undo.push_redo(UndoRecord::Compound {
							children: fired,
							revision_before,
							revision_after,
						});
						self.rewind_revision(revision_before);
					}
					Err(e) => {
						self.undo.push_undo(UndoRecord::Compound {
							children,
							revision_before,
							revision_after,
						});
						return Err(e);
					}
				},
				UndoRecord::Boundary => unreachable!("pop_undoable discards boundaries"),
			}
		}
		debug!(revision = self.revision, "undid {n} changes");
		Ok(())
	}

	/// Redoes the latest `n` undone changes.
	///
	/// # Errors
	///
	/// As for [`undo`](Self::undo), against the redoable count.
	pub fn redo(&mut self, n: usize) -> Result<(), DocumentError> {
		if self.changing {
			return Err(DocumentError::IllegalState(
				"the document is already being changed",
			));
		}
		self.undo.force_close_compound();
		if n == 0 || n > self.undo.redoable_changes() {
			return Err(DocumentError::InvalidArgument(
				"redo count exceeds the redoable changes",
			));
		}
		for _ in 0..n {
			let record = self.undo.pop_redoable().expect("count checked above");
			match record {
				UndoRecord::Replace {
					atom,
					revision_before,
					revision_after,
				} => match self.fire(&atom) {
					Ok(inverse) => {
						self.undo.push_undo(UndoRecord::Replace {
							atom: inverse,
							revision_before,
							revision_after,
						});
						self.rewind_revision(revision_after);
					}
					Err(e) => {
						self.undo.push_redo(UndoRecord::Replace {
							atom,
							revision_before,
							revision_after,
						});
						return Err(e);
					}
				},
				UndoRecord::Compound {
					children,
					revision_before,
					revision_after,
				} => match self.fire_all(&children) {
					Ok(mut fired) => {
						fired.reverse();
						self.undo.push_undo(UndoRecord::Compound {
							children: fired,
							revision_before,
							revision_after,
						});
						self.rewind_revision(revision_after);
					}
					Err(e) => {
						self.undo.push_redo(UndoRecord::Compound {
							children,
							revision_before,
							revision_after,
						});
						return Err(e);
					}
				},
				UndoRecord::Boundary => unreachable!("pop_redoable discards boundaries"),
			}
		}
		debug!(revision = self.revision, "redid {n} changes");
		Ok(())
	}

	/// Replays one atomic replace without recording, returning its inverse.
	fn fire(&mut self, atom: &AtomicReplace) -> Result<AtomicReplace, DocumentError> {
		let (end, erased) = self.replace_and_capture(atom.region, &atom.text, false)?;
		Ok(AtomicReplace {
			region: Region::new(atom.region.first, end),
			text: erased,
		})
	}

	/// Replays `children` in order; on failure the applied prefix is rolled
	/// back and the revision restored before the error propagates.
	fn fire_all(
		&mut self,
		children: &[AtomicReplace],
	) -> Result<Vec<AtomicReplace>, DocumentError> {
		let entry_revision = self.revision;
		let mut fired: Vec<AtomicReplace> = Vec::with_capacity(children.len());
		for child in children {
			match self.fire(child) {
				Ok(inverse) => fired.push(inverse),
				Err(e) => {
					for inverse in fired.iter().rev() {
						if let Err(rollback) = self.fire(inverse) {
							error!(%rollback, "compound rollback failed");
						}
					}
					self.rewind_revision(entry_revision);
					return Err(e);
				}
			}
		}
		Ok(fired)
	}

	/// Sets the revision after an undo/redo step, flipping the modification
	/// sign if the saved revision was crossed.
	fn rewind_revision(&mut self, revision: u64) {
		let was = self.is_modified();
		self.revision = revision;
		if self.is_modified() != was {
			self.notify_modification_sign();
		}
	}

	// --- notification plumbing ---------------------------------------------

	fn notify(&mut self, mut f: impl FnMut(&mut dyn DocumentListener, &Document)) {
		let mut listeners = std::mem::take(&mut self.listeners);
		for (_, listener) in listeners.iter_mut() {
			f(listener.as_mut(), self);
		}
		debug_assert!(self.listeners.is_empty());
		self.listeners = listeners;
	}

	fn notify_about_to_change(&mut self, change: &DocumentChange) -> Result<(), DocumentError> {
		let mut listeners = std::mem::take(&mut self.listeners);
		let mut vetoed = false;
		for (_, listener) in listeners.iter_mut() {
			if listener
				.document_about_to_be_changed(self, change)
				.is_err()
			{
				vetoed = true;
				break;
			}
		}
		self.listeners = listeners;
		if vetoed {
			Err(DocumentError::ChangeRejected)
		} else {
			Ok(())
		}
	}

	fn notify_modification_sign(&mut self) {
		if let Some(mut input) = self.input.take() {
			input.modification_sign_changed(self);
			self.input = Some(input);
		}
		self.notify(|l, doc| l.modification_sign_changed(doc));
	}
}

impl Default for Document {
	fn default() -> Self {
		Self::new()
	}
}

impl std::fmt::Debug for Document {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("Document")
			.field("lines", &self.lines.len())
			.field("revision", &self.revision)
			.field("modified", &self.is_modified())
			.field("read_only", &self.read_only)
			.field("narrowed", &self.is_narrowed())
			.finish_non_exhaustive()
	}
}

/// Inserts `text` at `at`, returning the end of the inserted text.
pub fn insert(
	document: &mut Document,
	at: Position,
	text: &str,
) -> Result<Position, DocumentError> {
	document.replace(Region::make_empty(at), text)
}

/// Erases the text covered by `region`.
pub fn erase(document: &mut Document, region: Region) -> Result<(), DocumentError> {
	document.replace(region, "").map(|_| ())
}
