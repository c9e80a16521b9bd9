//! Line-oriented content storage.
//!
//! A [`LineStore`] is an ordered sequence of [`Line`] records. There is
//! always at least one line; an empty store holds exactly one empty line.
//! Each line remembers the revision at which its text last changed and the
//! kind of the newline that follows it (meaningless for the final line).


use smallvec::SmallVec;
use vellum_primitives::{DocumentError, LineSegments, NewlineKind, Position, Region};

/// One stored line: its text, revision, and following terminator kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Line {
	text: String,
	revision: u64,
	newline: NewlineKind,
}

impl Line {
	fn new(text: String, revision: u64, newline: NewlineKind) -> Self {
		Self {
			text,
			revision,
			newline,
		}
	}

	/// The line text, without any terminator.
	pub fn text(&self) -> &str {
		&self.text
	}

	/// The document revision at which this line's text last changed.
	pub fn revision(&self) -> u64 {
		self.revision
	}

	/// The kind of the newline following this line.
	///
	/// Always a literal kind. For the final line of a store the value is
	/// the kind the line carried when it was created and has no effect on
	/// the stored text.
	pub fn newline(&self) -> NewlineKind {
		self.newline
	}
}

/// The sequence of lines backing a document.
#[derive(Debug, Clone)]
pub struct LineStore {
	lines: Vec<Line>,
}

impl LineStore {
	/// Creates a store holding a single empty line.
	pub fn new() -> Self {
		Self {
			lines: vec![Line::new(String::new(), 0, NewlineKind::default())],
		}
	}

	/// The number of lines; always at least one.
	pub fn len(&self) -> usize {
		self.lines.len()
	}

	/// Never true: even an empty document has one line.
	pub fn is_empty(&self) -> bool {
		false
	}

	/// Returns the line at `index`, or `BadPosition` if out of range.
	pub fn line(&self, index: usize) -> Result<&Line, DocumentError> {
		self.lines
			.get(index)
			.ok_or(DocumentError::BadPosition(Position::bol(index)))
	}

	/// Iterates over the stored lines in order.
	pub fn iter(&self) -> impl Iterator<Item = &Line> {
		self.lines.iter()
	}

	/// The position one past the last character of the store.
	pub fn end_position(&self) -> Position {
		let last = self.lines.len() - 1;
		Position::new(last, self.lines[last].text.len())
	}

	/// Total content length in bytes, counting each newline as one.
	pub fn characters(&self) -> usize {
		self.lines.iter().map(|l| l.text.len()).sum::<usize>() + self.lines.len() - 1
	}

	/// Validates that `p` names an existing line, an offset within it, and a
	/// character boundary.
	pub fn check_position(&self, p: Position) -> Result<(), DocumentError> {
		let line = self
			.lines
			.get(p.line)
			.ok_or(DocumentError::BadPosition(p))?;
		if p.offset_in_line > line.text.len() || !line.text.is_char_boundary(p.offset_in_line) {
			return Err(DocumentError::BadPosition(p));
		}
		Ok(())
	}

	/// Validates both ends of `r` and their ordering.
	pub fn check_region(&self, r: Region) -> Result<(), DocumentError> {
		if r.first > r.second {
			return Err(DocumentError::BadRegion(r));
		}
		self.check_position(r.first)
			.and(self.check_position(r.second))
			.map_err(|_| DocumentError::BadRegion(r))
	}

	/// The text covered by `r`, with erased newlines rendered as each line's
	/// stored literal.
	pub fn region_text(&self, r: Region) -> Result<String, DocumentError> {
		self.check_region(r)?;
		let mut out = String::new();
		for index in r.first.line..=r.second.line {
			let line = &self.lines[index];
			let from = if index == r.first.line {
				r.first.offset_in_line
			} else {
				0
			};
			let to = if index == r.second.line {
				r.second.offset_in_line
			} else {
				line.text.len()
			};
			out.push_str(&line.text[from..to]);
			if index < r.second.line {
				out.push_str(line.newline.literal().unwrap_or("\n"));
			}
		}
		Ok(out)
	}

	/// Computes where inserted text would end without applying anything.
	///
	/// `at` must be valid. Used to build the change record before mutation.
	pub fn end_of_insertion(&self, at: Position, text: &str) -> Position {
		let segments: SmallVec<[_; 4]> = LineSegments::new(text).collect();
		let (last, _) = segments[segments.len() - 1];
		if segments.len() == 1 {
			Position::new(at.line, at.offset_in_line + last.len())
		} else {
			Position::new(at.line + segments.len() - 1, last.len())
		}
	}

	/// Erases `region` and inserts `text` at its beginning.
	///
	/// The caller has already validated `region`. Mixed newlines inside
	/// `text` become line boundaries, each new line keeping the kind that
	/// terminated its segment. Touched lines take `revision`. Returns the
	/// end of the inserted text and the erased text.
	pub fn replace(&mut self, region: Region, text: &str, revision: u64) -> (Position, String) {
		let erased = self
			.region_text(region)
			.expect("region validated by caller");

		let first = region.first;
		let last = region.second;
		let head = self.lines[first.line].text[..first.offset_in_line].to_string();
		let tail = self.lines[last.line].text[last.offset_in_line..].to_string();
		let trailing_newline = self.lines[last.line].newline;

		let segments: SmallVec<[_; 4]> = LineSegments::new(text).collect();
		let mut replacement: SmallVec<[Line; 4]> = SmallVec::with_capacity(segments.len());
		let count = segments.len();
		for (index, (segment, newline)) in segments.into_iter().enumerate() {
			let mut built = String::with_capacity(segment.len());
			if index == 0 {
				built.push_str(&head);
			}
			built.push_str(segment);
			if index == count - 1 {
				built.push_str(&tail);
			}
			let kind = newline.unwrap_or(trailing_newline);
			replacement.push(Line::new(built, revision, kind));
		}

		let end = if count == 1 {
			Position::new(first.line, head.len() + text.len())
		} else {
			let last_segment = replacement[count - 1].text.len() - tail.len();
			Position::new(first.line + count - 1, last_segment)
		};

		self.lines
			.splice(first.line..=last.line, replacement.into_iter());
		debug_assert!(!self.lines.is_empty());
		(end, erased)
	}
}

impl Default for LineStore {
	fn default() -> Self {
		Self::new()
	}
}
