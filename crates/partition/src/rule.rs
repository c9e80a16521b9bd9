//! Transition rules.
//!
//! A transition rule is a pure matching predicate: given a line and an
//! offset, it reports how many bytes of trigger text it matches there. When
//! a rule whose source content type equals the partitioner's scan state
//! fires, the state switches to the rule's destination type.

use vellum_primitives::ContentType;

/// A predicate that switches the partitioner's content-type state.
///
/// `matches` must not consult the partitioning itself; it sees only the line
/// text. A return of `0` means no match; a zero-width trigger (such as an
/// end-of-line marker) reports `1`.
pub trait TransitionRule {
	/// The content type this rule fires from.
	fn source(&self) -> ContentType;

	/// The content type this rule switches to.
	fn destination(&self) -> ContentType;

	/// The byte length of the trigger matched at `offset_in_line`, or `0`.
	fn matches(&self, line: &str, offset_in_line: usize) -> usize;
}

/// Matches a fixed trigger string.
///
/// An empty pattern matches the end-of-line position only (a zero-width
/// marker). An optional escape character suppresses the match when it
/// immediately precedes the trigger; the escape comparison is always
/// case-sensitive.
pub struct LiteralTransitionRule {
	source: ContentType,
	destination: ContentType,
	pattern: String,
	escape_character: Option<char>,
	case_sensitive: bool,
}

impl LiteralTransitionRule {
	/// Creates a case-sensitive rule without an escape character.
	pub fn new(source: ContentType, destination: ContentType, pattern: impl Into<String>) -> Self {
		Self {
			source,
			destination,
			pattern: pattern.into(),
			escape_character: None,
			case_sensitive: true,
		}
	}

	/// Sets the escape character.
	pub fn with_escape_character(mut self, escape: char) -> Self {
		self.escape_character = Some(escape);
		self
	}

	/// Enables caseless matching of the trigger.
	pub fn case_insensitive(mut self) -> Self {
		self.case_sensitive = false;
		self
	}

	/// Caseless prefix match; returns the matched byte length of `rest`.
	fn caseless_prefix(pattern: &str, rest: &str) -> Option<usize> {
		let mut rest_chars = rest.char_indices();
		let mut consumed = 0;
		for expected in pattern.chars() {
			let (at, actual) = rest_chars.next()?;
			if !actual.to_lowercase().eq(expected.to_lowercase()) {
				return None;
			}
			consumed = at + actual.len_utf8();
		}
		Some(consumed)
	}
}

impl TransitionRule for LiteralTransitionRule {
	fn source(&self) -> ContentType {
		self.source
	}

	fn destination(&self) -> ContentType {
		self.destination
	}

	fn matches(&self, line: &str, offset_in_line: usize) -> usize {
		if let Some(escape) = self.escape_character
			&& line[..offset_in_line].chars().next_back() == Some(escape)
		{
			return 0;
		}
		if self.pattern.is_empty() {
			// an empty pattern is an end-of-line marker
			return usize::from(offset_in_line == line.len());
		}
		let rest = &line[offset_in_line..];
		if rest.len() < self.pattern.len() {
			return 0;
		}
		if self.case_sensitive {
			if rest.starts_with(&self.pattern) {
				self.pattern.len()
			} else {
				0
			}
		} else {
			Self::caseless_prefix(&self.pattern, rest).unwrap_or(0)
		}
	}
}

/// Matches a regular expression anchored at the scan offset.
///
/// A zero-width regex match counts as a match of length one, so a firing
/// rule always makes progress.
pub struct RegexTransitionRule {
	source: ContentType,
	destination: ContentType,
	pattern: regex::Regex,
}

impl RegexTransitionRule {
	/// Compiles `pattern` into a rule.
	pub fn new(
		source: ContentType,
		destination: ContentType,
		pattern: &str,
	) -> Result<Self, regex::Error> {
		Ok(Self {
			source,
			destination,
			pattern: regex::Regex::new(pattern)?,
		})
	}
}

impl TransitionRule for RegexTransitionRule {
	fn source(&self) -> ContentType {
		self.source
	}

	fn destination(&self) -> ContentType {
		self.destination
	}

	fn matches(&self, line: &str, offset_in_line: usize) -> usize {
		match self.pattern.find(&line[offset_in_line..]) {
			Some(m) if m.start() == 0 => m.len().max(1),
			_ => 0,
		}
	}
}
