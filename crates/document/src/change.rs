//! Change records and position adaptation.
//!
//! Every successful mutation of a [`Document`] is described by exactly one
//! [`DocumentChange`]: the region that was erased, the region now occupied by
//! the inserted text, and the inserted text itself. Points, bookmarks, the
//! narrowing bounds and the partitioner all rewrite their coordinates from
//! the same record via [`update_position`].
//!
//! [`Document`]: crate::Document

use vellum_primitives::{Direction, Position, Region};

/// An immutable description of one applied document mutation.
///
/// The erased region refers to pre-change coordinates, the inserted region
/// to post-change coordinates. Both regions start at the same position. For
/// a pure insertion the erased region is empty; for a pure erasure the
/// inserted region is empty.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentChange {
	erased_region: Region,
	inserted_region: Region,
	text: String,
}

impl DocumentChange {
	pub(crate) fn new(erased_region: Region, inserted_region: Region, text: String) -> Self {
		debug_assert_eq!(erased_region.first, inserted_region.first);
		Self {
			erased_region,
			inserted_region,
			text,
		}
	}

	/// The region erased by the change, in pre-change coordinates.
	pub fn erased_region(&self) -> Region {
		self.erased_region
	}

	/// The region the inserted text occupies, in post-change coordinates.
	pub fn inserted_region(&self) -> Region {
		self.inserted_region
	}

	/// The inserted text.
	pub fn text(&self) -> &str {
		&self.text
	}
}

/// Rewrites a pre-change position into post-change coordinates.
///
/// `gravity` resolves the ambiguous case of a position exactly at the change
/// start: [`Direction::Forward`] follows the inserted text, a backward
/// position stays put. Positions strictly inside the erased region clamp to
/// its beginning; positions at or past the erased end translate past the
/// inserted text.
pub fn update_position(p: Position, change: &DocumentChange, gravity: Direction) -> Position {
	let e1 = change.erased_region().first;
	let e2 = change.erased_region().second;
	let i = change.inserted_region().second;

	if p < e1 {
		return p;
	}
	if p == e1 {
		return match gravity {
			Direction::Forward => i,
			Direction::Backward => e1,
		};
	}
	if p < e2 {
		// strictly inside the erased region
		return e1;
	}
	if p == e2 {
		// the trailing boundary of the erasure collapses onto the insert end
		return i;
	}

	// past the change: translate by the net line/offset delta
	let line = p.line + i.line - e2.line;
	let offset_in_line = if p.line == e2.line {
		p.offset_in_line + i.offset_in_line - e2.offset_in_line
	} else {
		p.offset_in_line
	};
	Position::new(line, offset_in_line)
}
