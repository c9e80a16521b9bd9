//! Line bookmarks.
//!
//! Bookmarks are a set of marked line indices owned by the document. They
//! survive edits: marks on lines after a change shift with the line delta,
//! marks on lines the change erased entirely are dropped. Access goes
//! through [`Document::bookmarker`] and [`Document::bookmarker_mut`], which
//! validate line indices against the live document.
//!
//! [`Document::bookmarker`]: crate::Document::bookmarker
//! [`Document::bookmarker_mut`]: crate::Document::bookmarker_mut


use vellum_primitives::{Direction, DocumentError, Position};

use crate::change::{DocumentChange, update_position};

/// The raw mark storage: sorted, deduplicated line indices.
#[derive(Debug, Default)]
pub(crate) struct BookmarkSet {
	marks: Vec<usize>,
}

impl BookmarkSet {
	pub(crate) fn clear(&mut self) {
		self.marks.clear();
	}

	fn set(&mut self, line: usize, marked: bool) {
		match self.marks.binary_search(&line) {
			Ok(at) if !marked => {
				self.marks.remove(at);
			}
			Err(at) if marked => {
				self.marks.insert(at, line);
			}
			_ => {}
		}
	}

	fn contains(&self, line: usize) -> bool {
		self.marks.binary_search(&line).is_ok()
	}

	/// Rewrites marked lines for `change`.
	///
	/// A line is dropped when the erased region covers it entirely,
	/// terminator included; this also drops a line replaced by fresh
	/// inserted lines. Survivors follow their content.
	pub(crate) fn adapt_to_change(&mut self, change: &DocumentChange) {
		let erased = change.erased_region();
		let mut next = Vec::with_capacity(self.marks.len());
		for &line in &self.marks {
			let bol = Position::bol(line);
			let next_bol = Position::bol(line + 1);
			if !erased.is_empty() && bol >= erased.first && next_bol <= erased.second {
				continue;
			}
			let moved = update_position(bol, change, Direction::Forward).line;
			if next.last() != Some(&moved) {
				next.push(moved);
			}
		}
		self.marks = next;
	}
}

/// Read access to a document's bookmarks.
///
/// Obtained from [`Document::bookmarker`]; the borrowed line count makes
/// index validation possible without reaching back into the document.
///
/// [`Document::bookmarker`]: crate::Document::bookmarker
#[derive(Debug, Clone, Copy)]
pub struct Bookmarker<'a> {
	set: &'a BookmarkSet,
	lines: usize,
}

impl<'a> Bookmarker<'a> {
	pub(crate) fn new(set: &'a BookmarkSet, lines: usize) -> Self {
		Self { set, lines }
	}

	fn check_line(&self, line: usize) -> Result<(), DocumentError> {
		if line >= self.lines {
			return Err(DocumentError::BadPosition(Position::bol(line)));
		}
		Ok(())
	}

	/// Returns whether `line` is marked.
	pub fn is_marked(&self, line: usize) -> Result<bool, DocumentError> {
		self.check_line(line)?;
		Ok(self.set.contains(line))
	}

	/// The number of marked lines.
	pub fn number_of_marks(&self) -> usize {
		self.set.marks.len()
	}

	/// Iterates over marked lines in ascending order.
	pub fn iter(&self) -> impl DoubleEndedIterator<Item = usize> + '_ {
		self.set.marks.iter().copied()
	}

	/// Finds the `step`-th marked line from `from` in `direction`.
	///
	/// `step == 0` asks about `from` itself: `Some(from)` when marked,
	/// `None` otherwise. With `wrap`, stepping continues cyclically past the
	/// document ends (and may come back around to `from`); without it, the
	/// search stops at the first or last mark.
	pub fn next(
		&self,
		from: usize,
		direction: Direction,
		wrap: bool,
		step: usize,
	) -> Result<Option<usize>, DocumentError> {
		self.check_line(from)?;
		if step == 0 {
			return Ok(self.set.contains(from).then_some(from));
		}
		let marks = &self.set.marks;
		if marks.is_empty() {
			return Ok(None);
		}

		// split at `from`, then walk the (possibly wrapped) cycle
		let split = marks.partition_point(|&m| {
			if direction == Direction::Forward {
				m <= from
			} else {
				m < from
			}
		});
		let ahead = match direction {
			Direction::Forward => marks.len() - split,
			Direction::Backward => split,
		};
		if !wrap && step > ahead {
			return Ok(None);
		}
		let index = (step - 1) % marks.len();
		Ok(Some(match direction {
			Direction::Forward => marks[(split + index) % marks.len()],
			Direction::Backward => marks[(split + marks.len() - 1 - index) % marks.len()],
		}))
	}
}

/// Mutable access to a document's bookmarks.
///
/// Obtained from [`Document::bookmarker_mut`].
///
/// [`Document::bookmarker_mut`]: crate::Document::bookmarker_mut
#[derive(Debug)]
pub struct BookmarkerMut<'a> {
	set: &'a mut BookmarkSet,
	lines: usize,
}

impl<'a> BookmarkerMut<'a> {
	pub(crate) fn new(set: &'a mut BookmarkSet, lines: usize) -> Self {
		Self { set, lines }
	}

	fn check_line(&self, line: usize) -> Result<(), DocumentError> {
		if line >= self.lines {
			return Err(DocumentError::BadPosition(Position::bol(line)));
		}
		Ok(())
	}

	/// Marks `line`.
	pub fn mark(&mut self, line: usize) -> Result<(), DocumentError> {
		self.set_mark(line, true)
	}

	/// Sets or clears the mark on `line`.
	pub fn set_mark(&mut self, line: usize, marked: bool) -> Result<(), DocumentError> {
		self.check_line(line)?;
		self.set.set(line, marked);
		Ok(())
	}

	/// Flips the mark on `line`.
	pub fn toggle(&mut self, line: usize) -> Result<(), DocumentError> {
		self.check_line(line)?;
		let marked = self.set.contains(line);
		self.set.set(line, !marked);
		Ok(())
	}

	/// Removes every mark.
	pub fn clear(&mut self) {
		self.set.clear();
	}
}
