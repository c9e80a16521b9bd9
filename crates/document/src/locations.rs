//! Position arithmetic over a document.
//!
//! These helpers answer "where is…" questions — beginning and end of line
//! or document, character-wise and line-wise motion, the next bookmarked
//! line — always within the document's *accessible* region, so a narrowed
//! document keeps callers inside the narrow. Positions outside the document
//! itself are rejected with `BadPosition`; positions merely outside the
//! accessible region are clamped or left in place.

use unicode_segmentation::UnicodeSegmentation;
use vellum_primitives::{Direction, DocumentError, Position};

use crate::document::Document;

/// The unit of character-wise motion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CharacterUnit {
	/// One Unicode scalar value.
	CodePoint,
	/// One extended grapheme cluster.
	GraphemeCluster,
}

/// Whether `p` is the beginning of the accessible region.
pub fn is_beginning_of_document(document: &Document, p: Position) -> Result<bool, DocumentError> {
	document.check_position(p)?;
	Ok(p == document.accessible_region().first)
}

/// Whether `p` is the end of the accessible region.
pub fn is_end_of_document(document: &Document, p: Position) -> Result<bool, DocumentError> {
	document.check_position(p)?;
	Ok(p == document.accessible_region().second)
}

/// Whether `p` is at the (accessible) beginning of its line.
pub fn is_beginning_of_line(document: &Document, p: Position) -> Result<bool, DocumentError> {
	document.check_position(p)?;
	Ok(p == line_beginning(document, p))
}

/// Whether `p` is at the (accessible) end of its line.
pub fn is_end_of_line(document: &Document, p: Position) -> Result<bool, DocumentError> {
	document.check_position(p)?;
	Ok(p == line_end(document, p))
}

/// The beginning of the accessible region.
pub fn beginning_of_document(document: &Document) -> Position {
	document.accessible_region().first
}

/// The end of the accessible region.
pub fn end_of_document(document: &Document) -> Position {
	document.accessible_region().second
}

/// The accessible beginning of the line `p` is on.
pub fn beginning_of_line(document: &Document, p: Position) -> Result<Position, DocumentError> {
	document.check_position(p)?;
	Ok(line_beginning(document, p))
}

/// The accessible end of the line `p` is on.
pub fn end_of_line(document: &Document, p: Position) -> Result<Position, DocumentError> {
	document.check_position(p)?;
	Ok(line_end(document, p))
}

fn line_beginning(document: &Document, p: Position) -> Position {
	Position::bol(p.line).max(document.accessible_region().first)
}

fn line_end(document: &Document, p: Position) -> Position {
	let length = document
		.line_length(p.line)
		.expect("the line was validated by the caller");
	Position::new(p.line, length).min(document.accessible_region().second)
}

/// Moves `n` lines in `direction`, keeping the offset.
///
/// The line index saturates at the accessible lines; when the resulting
/// position would leave the accessible region, `p` is returned unchanged.
pub fn next_line(
	document: &Document,
	p: Position,
	direction: Direction,
	n: usize,
) -> Result<Position, DocumentError> {
	document.check_position(p)?;
	let accessible = document.accessible_region();
	let line = match direction {
		Direction::Forward => (p.line + n).min(accessible.second.line),
		Direction::Backward => p.line.saturating_sub(n).max(accessible.first.line),
	};
	let length = document.line_length(line)?;
	let candidate = Position::new(line, p.offset_in_line.min(length));
	if accessible.includes(candidate) {
		Ok(candidate)
	} else {
		Ok(p)
	}
}

/// Moves `n` characters in `direction`, stopping at the accessible bounds.
pub fn next_character(
	document: &Document,
	p: Position,
	direction: Direction,
	unit: CharacterUnit,
	n: usize,
) -> Result<Position, DocumentError> {
	document.check_position(p)?;
	let accessible = document.accessible_region();
	let mut at = p.clamp(accessible.first, accessible.second);
	for _ in 0..n {
		let stepped = match direction {
			Direction::Forward => step_forward(document, at, unit),
			Direction::Backward => step_backward(document, at, unit),
		};
		match stepped {
			Some(next) if accessible.includes(next) => at = next,
			_ => break,
		}
	}
	Ok(at)
}

fn step_forward(document: &Document, at: Position, unit: CharacterUnit) -> Option<Position> {
	let line = document.line_text(at.line).ok()?;
	if at.offset_in_line >= line.len() {
		if at.line + 1 < document.number_of_lines() {
			return Some(Position::bol(at.line + 1));
		}
		return None;
	}
	let rest = &line[at.offset_in_line..];
	let width = match unit {
		CharacterUnit::CodePoint => rest.chars().next()?.len_utf8(),
		CharacterUnit::GraphemeCluster => rest.graphemes(true).next()?.len(),
	};
	Some(Position::new(at.line, at.offset_in_line + width))
}

fn step_backward(document: &Document, at: Position, unit: CharacterUnit) -> Option<Position> {
	if at.offset_in_line == 0 {
		if at.line == 0 {
			return None;
		}
		let line = at.line - 1;
		return Some(Position::new(line, document.line_length(line).ok()?));
	}
	let line = document.line_text(at.line).ok()?;
	let head = &line[..at.offset_in_line];
	let width = match unit {
		CharacterUnit::CodePoint => head.chars().next_back()?.len_utf8(),
		CharacterUnit::GraphemeCluster => head.graphemes(true).next_back()?.len(),
	};
	Some(Position::new(at.line, at.offset_in_line - width))
}

/// The position of the `n`-th bookmarked line from `p` in `direction`,
/// wrapping around the document, clamped into the accessible region.
pub fn next_bookmark(
	document: &Document,
	p: Position,
	direction: Direction,
	n: usize,
) -> Result<Option<Position>, DocumentError> {
	document.check_position(p)?;
	let accessible = document.accessible_region();
	Ok(document
		.bookmarker()
		.next(p.line, direction, true, n)?
		.map(|line| Position::bol(line).clamp(accessible.first, accessible.second)))
}
