//! Newline classification and scanning.
//!
//! Six literal newline kinds are recognized on input: LF, CR, CR+LF, NEL
//! (U+0085), LS (U+2028) and PS (U+2029). Two non-literal kinds exist for
//! write-time resolution: [`NewlineKind::UseIntrinsic`] emits whatever kind a
//! line carries, [`NewlineKind::UseDocumentInput`] defers to the document's
//! bound input.

use memchr::{memchr, memchr3};

/// The kind of terminator following a line.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum NewlineKind {
	/// U+000A.
	#[default]
	LineFeed,
	/// U+000D.
	CarriageReturn,
	/// U+000D followed by U+000A, a single newline.
	CarriageReturnLineFeed,
	/// U+0085.
	NextLine,
	/// U+2028.
	LineSeparator,
	/// U+2029.
	ParagraphSeparator,
	/// Resolved at write time to the line's stored kind.
	UseIntrinsic,
	/// Resolved at write time to the document input's default kind.
	UseDocumentInput,
}

impl NewlineKind {
	/// Returns whether this kind has a concrete code-point representation.
	pub const fn is_literal(self) -> bool {
		!matches!(self, Self::UseIntrinsic | Self::UseDocumentInput)
	}

	/// The literal string of this kind, or `None` for the non-literal kinds.
	pub const fn literal(self) -> Option<&'static str> {
		match self {
			Self::LineFeed => Some("\n"),
			Self::CarriageReturn => Some("\r"),
			Self::CarriageReturnLineFeed => Some("\r\n"),
			Self::NextLine => Some("\u{0085}"),
			Self::LineSeparator => Some("\u{2028}"),
			Self::ParagraphSeparator => Some("\u{2029}"),
			Self::UseIntrinsic | Self::UseDocumentInput => None,
		}
	}
}

/// Classifies the newline at the beginning of `text`.
///
/// `"\r\n"` yields [`NewlineKind::CarriageReturnLineFeed`]; `"\n\r"` yields
/// [`NewlineKind::LineFeed`] (two distinct newlines).
pub fn eat_newline(text: &str) -> Option<NewlineKind> {
	let bytes = text.as_bytes();
	match bytes.first()? {
		b'\n' => Some(NewlineKind::LineFeed),
		b'\r' => {
			if bytes.get(1) == Some(&b'\n') {
				Some(NewlineKind::CarriageReturnLineFeed)
			} else {
				Some(NewlineKind::CarriageReturn)
			}
		}
		0xc2 if bytes.get(1) == Some(&0x85) => Some(NewlineKind::NextLine),
		0xe2 if bytes.len() >= 3 && bytes[1] == 0x80 && (bytes[2] == 0xa8 || bytes[2] == 0xa9) => {
			Some(if bytes[2] == 0xa8 {
				NewlineKind::LineSeparator
			} else {
				NewlineKind::ParagraphSeparator
			})
		}
		_ => None,
	}
}

/// Finds the first newline in `text`.
///
/// Returns the byte offset of the newline, its kind, and its encoded byte
/// length.
pub fn find_newline(text: &str) -> Option<(usize, NewlineKind, usize)> {
	let bytes = text.as_bytes();
	let mut from = 0;
	while from < bytes.len() {
		// candidate starts: LF, CR, or the lead bytes of NEL/LS/PS
		let ascii = memchr3(b'\n', b'\r', 0xc2, &bytes[from..]).map(|i| i + from);
		let wide = memchr(0xe2, &bytes[from..]).map(|i| i + from);
		let at = match (ascii, wide) {
			(Some(a), Some(w)) => a.min(w),
			(Some(a), None) => a,
			(None, Some(w)) => w,
			(None, None) => return None,
		};
		if let Some(kind) = eat_newline(&text[at..]) {
			return Some((at, kind, kind.literal().map_or(0, str::len)));
		}
		// a 0xc2/0xe2 lead byte that did not begin a newline
		from = at + 1;
	}
	None
}

/// Counts the logical lines of `text`: one more than the number of newlines.
///
/// The empty string has one (empty) line.
pub fn count_lines(text: &str) -> usize {
	LineSegments::new(text).count()
}

/// Iterator over the line segments of a string.
///
/// Yields `(segment, newline)` pairs where `newline` is the terminator
/// following the segment, or `None` for the final segment. Always yields at
/// least one item; the empty string yields one empty segment.
#[derive(Debug, Clone)]
pub struct LineSegments<'a> {
	rest: Option<&'a str>,
}

impl<'a> LineSegments<'a> {
	/// Creates an iterator over the segments of `text`.
	pub fn new(text: &'a str) -> Self {
		Self { rest: Some(text) }
	}
}

impl<'a> Iterator for LineSegments<'a> {
	type Item = (&'a str, Option<NewlineKind>);

	fn next(&mut self) -> Option<Self::Item> {
		let rest = self.rest?;
		match find_newline(rest) {
			Some((at, kind, len)) => {
				self.rest = Some(&rest[at + len..]);
				Some((&rest[..at], Some(kind)))
			}
			None => {
				self.rest = None;
				Some((rest, None))
			}
		}
	}
}
