//! The lexical partitioner.
//!
//! Keeps a sorted array of partitions covering the whole document and
//! resynchronizes it on every change in three phases: shift existing
//! partition starts past the change, rescan characters from the first
//! affected line until the scan state re-agrees with the previous
//! partitioning, and splice the freshly scanned partitions over the stale
//! ones.


use tracing::trace;
use vellum_document::{
	Document, DocumentChange, DocumentPartition, DocumentPartitioner, update_position,
};
use vellum_primitives::{ContentType, Direction, Position, Region};

use crate::rule::TransitionRule;

/// One partition: a content type taking effect at `start`.
///
/// `token_start`/`token_length` record the trigger token that opened the
/// partition. A transition into a deeper content type starts the partition
/// at the token itself (the opening trigger belongs to the new partition); a
/// transition back starts it after the token (the closing trigger belongs to
/// the old one).
#[derive(Debug, Clone)]
struct Partition {
	content_type: ContentType,
	start: Position,
	token_start: Position,
	token_length: usize,
}

impl Partition {
	fn anchor(content_type: ContentType, at: Position) -> Self {
		Self {
			content_type,
			start: at,
			token_start: at,
			token_length: 0,
		}
	}

	fn token_end(&self) -> Position {
		Position::new(
			self.token_start.line,
			self.token_start.offset_in_line + self.token_length,
		)
	}
}

/// A [`DocumentPartitioner`] driven by [`TransitionRule`]s.
///
/// Rules are owned by the partitioner and consulted in registration order;
/// the first rule whose source matches the scan state and whose trigger
/// matches wins.
pub struct LexicalPartitioner {
	rules: Vec<Box<dyn TransitionRule>>,
	partitions: Vec<Partition>,
}

impl LexicalPartitioner {
	/// Creates a partitioner over `rules`.
	pub fn new(rules: Vec<Box<dyn TransitionRule>>) -> Self {
		Self {
			rules,
			partitions: vec![Partition::anchor(ContentType::DEFAULT, Position::zero())],
		}
	}

	/// The first rule matching at `offset` from state `content_type`.
	fn try_transition(
		&self,
		line: &str,
		offset_in_line: usize,
		content_type: ContentType,
	) -> (usize, ContentType) {
		for rule in &self.rules {
			if rule.source() == content_type {
				let length = rule.matches(line, offset_in_line);
				if length > 0 {
					return (length, rule.destination());
				}
			}
		}
		(0, ContentType::UNDETERMINED)
	}

	/// Index of the partition containing `at`.
	fn partition_index(&self, document: &Document, at: Position) -> usize {
		let upper = self.partitions.partition_point(|p| p.start <= at);
		let mut index = upper.saturating_sub(1);
		// a zero-length end-of-line trigger: the query at the line end still
		// belongs to the partition the trigger closed
		if index > 0
			&& self.partitions[index].token_start == at
			&& document
				.line_length(at.line)
				.is_ok_and(|len| len == at.offset_in_line)
		{
			index -= 1;
		}
		while index + 1 < self.partitions.len()
			&& self.partitions[index + 1].start == self.partitions[index].start
		{
			index += 1;
		}
		index
	}

	/// The content type in effect just before `at`.
	fn transition_state_at(&self, document: &Document, at: Position) -> ContentType {
		if at == Position::zero() {
			return ContentType::DEFAULT;
		}
		let mut index = self.partition_index(document, at);
		if self.partitions[index].start == at && index > 0 {
			index -= 1;
		}
		self.partitions[index].content_type
	}

	/// Scan phase: recomputes partitions from the beginning of
	/// `start_line`, scanning at least to `minimal`, and splices them in.
	/// Returns the repartitioned region.
	fn rescan(&mut self, document: &Document, start_line: usize, minimal: Position) -> Region {
		let document_end = document.region().second;
		let scan_start = Position::bol(start_line);
		let mut state = if start_line == 0 {
			ContentType::DEFAULT
		} else {
			let previous_eol = Position::new(
				start_line - 1,
				document.line_length(start_line - 1).unwrap_or(0),
			);
			self.partitions[self.partition_index(document, previous_eol)].content_type
		};

		let mut fresh: Vec<Partition> = Vec::new();
		let mut pos = scan_start;
		loop {
			let line = document
				.line_text(pos.line)
				.expect("scan stays inside the document");
			let at_eol = pos.offset_in_line == line.len();
			let (mut token_length, destination) =
				self.try_transition(line, pos.offset_in_line, state);
			if token_length != 0 {
				if at_eol {
					// a line terminator trigger is zero-length
					token_length = 0;
				}
				let token_end = Position::new(pos.line, pos.offset_in_line + token_length);
				debug_assert_ne!(destination, state);
				fresh.push(Partition {
					content_type: destination,
					start: if destination > state { pos } else { token_end },
					token_start: pos,
					token_length,
				});
				state = destination;
				if !at_eol {
					pos = token_end;
				}
			}
			if at_eol {
				if pos >= document_end {
					break;
				}
				if pos >= minimal && self.transition_state_at(document, pos) == state {
					break;
				}
			}
			if token_length == 0 {
				pos = if at_eol {
					Position::bol(pos.line + 1)
				} else {
					let width = line[pos.offset_in_line..]
						.chars()
						.next()
						.map_or(1, char::len_utf8);
					Position::new(pos.line, pos.offset_in_line + width)
				};
			}
		}

		self.splice(document, scan_start, pos, fresh);
		self.verify(document);
		Region::new(scan_start, pos)
	}

	/// Splice phase: replaces the partitions covering `[first, last]` with
	/// `fresh`, re-anchoring the default partition at the document start and
	/// dropping redundant boundaries.
	fn splice(&mut self, document: &Document, first: Position, last: Position, fresh: Vec<Partition>) {
		let document_end = document.region().second;

		// locate the stale range
		let mut erase_first = self.partition_index(document, first);
		if first >= self.partitions[erase_first].token_end() {
			erase_first += 1;
		}
		let mut erase_last = self.partition_index(document, last) + 1; // exclusive
		if erase_last < self.partitions.len() && self.partitions[erase_last].token_start < last {
			erase_last += 1;
		}
		if erase_last > erase_first {
			if erase_first > 0
				&& erase_last < self.partitions.len()
				&& self.partitions[erase_first - 1].content_type
					== self.partitions[erase_last].content_type
			{
				erase_last += 1; // combine across the rescanned range
			}
			let erase_last = erase_last.min(self.partitions.len());
			self.partitions.drain(erase_first..erase_last);
		}

		// the document beginning must always be covered
		if self
			.partitions
			.first()
			.is_none_or(|p| p.start != Position::zero())
		{
			if self
				.partitions
				.first()
				.is_none_or(|p| p.content_type != ContentType::DEFAULT)
			{
				self.partitions
					.insert(0, Partition::anchor(ContentType::DEFAULT, Position::zero()));
			} else {
				let head = &mut self.partitions[0];
				head.start = Position::zero();
				head.token_start = Position::zero();
				head.token_length = 0;
			}
		}

		// drop a stale partition starting at the document end
		if self.partitions.len() > 1
			&& self.partitions.last().is_some_and(|p| p.start == document_end)
		{
			self.partitions.pop();
		}

		// insert the fresh partitions behind the partition containing `first`
		let anchor = self.partition_index(document, first);
		self.partitions.splice(anchor + 1..anchor + 1, fresh);

		// drop redundant boundaries between same-typed neighbors
		let mut index = 1;
		while index < self.partitions.len() {
			if self.partitions[index].content_type == self.partitions[index - 1].content_type {
				self.partitions.remove(index);
			} else {
				index += 1;
			}
		}
	}

	/// Debug-only consistency check over the partition array.
	fn verify(&self, _document: &Document) {
		if cfg!(debug_assertions) {
			assert!(!self.partitions.is_empty());
			assert_eq!(self.partitions[0].start, Position::zero());
			let mut previous_was_empty = false;
			for pair in self.partitions.windows(2) {
				assert_ne!(pair[0].content_type, pair[1].content_type);
				if pair[0].start == pair[1].start {
					assert!(!previous_was_empty, "three partitions share a start");
					previous_was_empty = true;
				} else {
					assert!(pair[0].start < pair[1].start);
					previous_was_empty = false;
				}
			}
		}
	}
}

impl DocumentPartitioner for LexicalPartitioner {
	fn install(&mut self, document: &Document) {
		self.partitions = vec![Partition::anchor(ContentType::DEFAULT, Position::zero())];
		let end = document.region().second;
		self.rescan(document, 0, end);
	}

	fn uninstall(&mut self) {
		self.partitions = vec![Partition::anchor(ContentType::DEFAULT, Position::zero())];
	}

	fn document_changed(
		&mut self,
		document: &Document,
		change: &DocumentChange,
	) -> Option<Region> {
		let erased = change.erased_region();
		let inserted = change.inserted_region();

		// shift phase: move partition starts past the change, collapse the
		// ones inside the erased region, drop the ones it swallowed
		if !erased.is_empty() || !inserted.is_empty() {
			let document_end = document.region().second;
			let mut index = 1;
			while index < self.partitions.len() {
				let start = self.partitions[index].start;
				if start < erased.first {
					index += 1;
				} else if erased.is_empty() || start > erased.second {
					let p = &mut self.partitions[index];
					p.start = update_position(p.start, change, Direction::Forward);
					p.token_start = update_position(p.token_start, change, Direction::Forward);
					index += 1;
				} else {
					let next_start = self
						.partitions
						.get(index + 1)
						.map_or(document_end, |p| p.start);
					if next_start <= erased.second {
						// swallowed by the erasure
						self.partitions.remove(index);
						if index < self.partitions.len()
							&& self.partitions[index].content_type
								== self.partitions[index - 1].content_type
						{
							self.partitions.remove(index);
						}
						if self.partitions.len() == 1 {
							break;
						}
					} else {
						// partially covered: park it at the change start;
						// the splice phase replaces it
						let p = &mut self.partitions[index];
						p.start = erased.first;
						p.token_start = erased.first;
						index += 1;
					}
				}
			}
		}

		let start_line = erased.first.line.min(inserted.first.line);
		let minimal = erased.second.max(inserted.second);
		let repartitioned = self.rescan(document, start_line, minimal);
		trace!(%repartitioned, "partitions resynchronized");
		Some(repartitioned)
	}

	fn partition_at(&self, document: &Document, at: Position) -> DocumentPartition {
		let index = self.partition_index(document, at);
		let p = &self.partitions[index];
		let end = self
			.partitions
			.get(index + 1)
			.map_or(document.region().second, |next| next.start);
		DocumentPartition {
			content_type: p.content_type,
			region: Region::new(p.start, end),
		}
	}
}
