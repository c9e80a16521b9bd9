//! Adaptive positions.
//!
//! A point is a position that rewrites itself on every document change
//! according to its gravity. Point state lives in the document's point arena;
//! callers hold copyable [`PointId`] handles and go through the `Document`
//! point methods ([`create_point`], [`point_position`], [`move_point_to`],
//! …). Releasing a handle frees its slot.
//!
//! [`create_point`]: crate::Document::create_point
//! [`point_position`]: crate::Document::point_position
//! [`move_point_to`]: crate::Document::move_point_to

#[cfg(test)]
mod tests;

use slab::Slab;
use vellum_primitives::{Direction, Position};

use crate::change::{DocumentChange, update_position};

/// Handle to a point registered with a document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PointId(pub(crate) usize);

/// The state of one point.
#[derive(Debug, Clone)]
pub(crate) struct PointState {
	pub(crate) position: Position,
	pub(crate) gravity: Direction,
	pub(crate) adapts: bool,
}

/// Arena of point states owned by a document.
#[derive(Debug, Default)]
pub(crate) struct PointArena {
	points: Slab<PointState>,
}

impl PointArena {
	pub(crate) fn insert(&mut self, position: Position) -> PointId {
		PointId(self.points.insert(PointState {
			position,
			gravity: Direction::Forward,
			adapts: true,
		}))
	}

	pub(crate) fn remove(&mut self, id: PointId) {
		self.points.remove(id.0);
	}

	pub(crate) fn get(&self, id: PointId) -> &PointState {
		&self.points[id.0]
	}

	pub(crate) fn get_mut(&mut self, id: PointId) -> &mut PointState {
		&mut self.points[id.0]
	}

	/// Rewrites every adapting point for `change`.
	///
	/// Each point sees the same change; the update is computed from the
	/// pre-change value and committed in one step.
	pub(crate) fn adapt_to_change(&mut self, change: &DocumentChange) {
		for (_, point) in self.points.iter_mut() {
			if point.adapts {
				point.position = update_position(point.position, change, point.gravity);
			}
		}
	}

	/// Sends adapting points to the document beginning (content reset).
	pub(crate) fn reset(&mut self) {
		for (_, point) in self.points.iter_mut() {
			if point.adapts {
				point.position = Position::zero();
			}
		}
	}
}
