//! Token rules and the lexical token scanner.
//!
//! Where transition rules decide *partitions*, token rules pick out the
//! tokens inside one partition's content type: numeric literals, delimited
//! regions, members of a keyword set, regex matches. A
//! [`LexicalTokenScanner`] walks a document region with these rules and
//! yields [`Token`]s for downstream styling.
//!
//! Word recognition is delegated to an [`IdentifierSyntax`]; the engine
//! only ships a plain default implementation.

#[cfg(test)]
mod tests;

use std::collections::HashSet;

use vellum_document::{CharacterIterator, Document, LINE_BOUNDARY_CHARACTER};
use vellum_primitives::{DocumentError, Position, Region};

/// Identifier of a token kind, interpreted by the consumer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TokenId(pub u32);

/// One recognized token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
	/// The token kind.
	pub id: TokenId,
	/// The token extent; tokens never cross line boundaries.
	pub region: Region,
}

/// Classifies characters for word recognition.
pub trait IdentifierSyntax {
	/// Whether `c` may start an identifier.
	fn is_identifier_start(&self, c: char) -> bool;

	/// Whether `c` may continue an identifier.
	fn is_identifier_continue(&self, c: char) -> bool;

	/// The byte length of the identifier starting at `offset_in_line`,
	/// or zero.
	fn eat_identifier(&self, line: &str, offset_in_line: usize) -> usize {
		let mut chars = line[offset_in_line..].char_indices();
		match chars.next() {
			Some((_, c)) if self.is_identifier_start(c) => {}
			_ => return 0,
		}
		for (at, c) in chars {
			if !self.is_identifier_continue(c) {
				return at;
			}
		}
		line.len() - offset_in_line
	}
}

/// Unicode-alphanumeric identifiers with `_`.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultIdentifierSyntax;

impl IdentifierSyntax for DefaultIdentifierSyntax {
	fn is_identifier_start(&self, c: char) -> bool {
		c.is_alphabetic() || c == '_'
	}

	fn is_identifier_continue(&self, c: char) -> bool {
		c.is_alphanumeric() || c == '_'
	}
}

/// Recognizes one kind of token at a line offset.
pub trait TokenRule {
	/// The identifier reported for recognized tokens.
	fn id(&self) -> TokenId;

	/// The byte length of the token at `offset_in_line`, or `None`.
	fn parse(
		&self,
		line: &str,
		offset_in_line: usize,
		syntax: &dyn IdentifierSyntax,
	) -> Option<usize>;
}

/// Recognizes numeric literals (ECMAScript shape).
///
/// Accepts decimal literals with optional fraction and signed exponent, and
/// `0x` hexadecimal integers. A literal is rejected when it directly
/// follows a digit-like character or is directly followed by a digit or an
/// identifier start, so `a.0` and `.693147i` contain no number.
pub struct NumberTokenRule {
	id: TokenId,
}

impl NumberTokenRule {
	/// Creates the rule.
	pub fn new(id: TokenId) -> Self {
		Self { id }
	}

	fn parse_hex(rest: &[u8]) -> Option<usize> {
		if rest.len() < 3 || rest[0] != b'0' || (rest[1] != b'x' && rest[1] != b'X') {
			return None;
		}
		let digits = rest[2..]
			.iter()
			.take_while(|b| b.is_ascii_hexdigit())
			.count();
		(digits > 0).then_some(2 + digits)
	}

	fn parse_decimal(rest: &[u8]) -> Option<usize> {
		let mut e = 0;
		let mut found_integer = false;
		if rest[0].is_ascii_digit() {
			found_integer = true;
			e = if rest[0] == b'0' {
				1
			} else {
				count_digits(rest, 0)
			};
		}
		let mut found_dot = false;
		if rest.get(e) == Some(&b'.') {
			let fraction = count_digits(rest, e + 1);
			if fraction == e + 1 {
				// a dot with no digits is not a fraction
				return None;
			}
			found_dot = true;
			e = fraction;
		}
		if !found_integer && !found_dot {
			return None;
		}
		if matches!(rest.get(e), Some(b'e' | b'E')) {
			let mut exponent = e + 1;
			if matches!(rest.get(exponent), Some(b'+' | b'-')) {
				exponent += 1;
			}
			let end = count_digits(rest, exponent);
			if end == exponent {
				// an exponent marker with no digits spoils the literal
				return None;
			}
			e = end;
		}
		Some(e)
	}
}

fn count_digits(bytes: &[u8], from: usize) -> usize {
	let mut at = from;
	while at < bytes.len() && bytes[at].is_ascii_digit() {
		at += 1;
	}
	at
}

impl TokenRule for NumberTokenRule {
	fn id(&self) -> TokenId {
		self.id
	}

	fn parse(
		&self,
		line: &str,
		offset_in_line: usize,
		syntax: &dyn IdentifierSyntax,
	) -> Option<usize> {
		let rest = line[offset_in_line..].as_bytes();
		if rest.is_empty() {
			return None;
		}
		// not a literal when glued to a preceding digit-like character
		if line[..offset_in_line]
			.bytes()
			.next_back()
			.is_some_and(|b| b.is_ascii_hexdigit())
		{
			return None;
		}

		let length = Self::parse_hex(rest).or_else(|| Self::parse_decimal(rest))?;

		// the following character must not extend the literal
		let next = line[offset_in_line + length..].chars().next();
		if next.is_some_and(|c| c.is_ascii_digit() || syntax.is_identifier_start(c)) {
			return None;
		}
		Some(length)
	}
}

/// Recognizes a region delimited by fixed start and end sequences.
///
/// The token extends to the end of its end sequence; without an end
/// sequence it runs to the end of the line. An unclosed region with an end
/// sequence is not a token. The escape character suppresses both the start
/// sequence and a would-be end sequence.
pub struct RegionTokenRule {
	id: TokenId,
	start: String,
	end: String,
	escape_character: Option<char>,
	case_sensitive: bool,
}

impl RegionTokenRule {
	/// Creates a case-sensitive rule without an escape character.
	///
	/// An empty `end` means the token runs to the end of the line.
	pub fn new(id: TokenId, start: impl Into<String>, end: impl Into<String>) -> Self {
		let start = start.into();
		debug_assert!(!start.is_empty());
		Self {
			id,
			start,
			end: end.into(),
			escape_character: None,
			case_sensitive: true,
		}
	}

	/// Sets the escape character.
	pub fn with_escape_character(mut self, escape: char) -> Self {
		self.escape_character = Some(escape);
		self
	}

	/// Enables caseless matching of the sequences and the escape character.
	pub fn case_insensitive(mut self) -> Self {
		self.case_sensitive = false;
		self
	}

	fn chars_equal(&self, a: char, b: char) -> bool {
		if self.case_sensitive {
			a == b
		} else {
			a.to_lowercase().eq(b.to_lowercase())
		}
	}

	/// Matches `pattern` at the start of `rest`; returns the matched byte
	/// length.
	fn prefix(&self, pattern: &str, rest: &str) -> Option<usize> {
		if self.case_sensitive {
			return rest.starts_with(pattern).then(|| pattern.len());
		}
		let mut rest_chars = rest.char_indices();
		let mut consumed = 0;
		for expected in pattern.chars() {
			let (at, actual) = rest_chars.next()?;
			if !self.chars_equal(actual, expected) {
				return None;
			}
			consumed = at + actual.len_utf8();
		}
		Some(consumed)
	}

	fn is_escape(&self, c: char) -> bool {
		self.escape_character
			.is_some_and(|escape| self.chars_equal(c, escape))
	}
}

impl TokenRule for RegionTokenRule {
	fn id(&self) -> TokenId {
		self.id
	}

	fn parse(
		&self,
		line: &str,
		offset_in_line: usize,
		_syntax: &dyn IdentifierSyntax,
	) -> Option<usize> {
		// an escaped start sequence is no start sequence
		if line[..offset_in_line]
			.chars()
			.next_back()
			.is_some_and(|c| self.is_escape(c))
		{
			return None;
		}
		let started = self.prefix(&self.start, &line[offset_in_line..])?;
		if self.end.is_empty() {
			return Some(line.len() - offset_in_line);
		}

		let search_from = offset_in_line + started;
		let mut chars = line[search_from..].char_indices();
		while let Some((offset, c)) = chars.next() {
			if self.is_escape(c) {
				chars.next();
				continue;
			}
			if let Some(closed) = self.prefix(&self.end, &line[search_from + offset..]) {
				return Some(search_from + offset + closed - offset_in_line);
			}
		}
		None
	}
}

/// Recognizes identifiers belonging to a fixed word set.
///
/// Consulted by the scanner only for complete identifier spans, so `begin`
/// matches in `begin----end` but `begin-` never reaches the rule.
pub struct WordSetTokenRule {
	id: TokenId,
	words: HashSet<String>,
	case_sensitive: bool,
}

impl WordSetTokenRule {
	/// Creates the rule over `words`.
	pub fn new<I, S>(id: TokenId, words: I, case_sensitive: bool) -> Self
	where
		I: IntoIterator<Item = S>,
		S: Into<String>,
	{
		let words = words
			.into_iter()
			.map(|w| {
				let w = w.into();
				if case_sensitive { w } else { w.to_lowercase() }
			})
			.collect();
		Self {
			id,
			words,
			case_sensitive,
		}
	}

	/// The reported token identifier.
	pub fn id(&self) -> TokenId {
		self.id
	}

	/// Whether `word` belongs to the set.
	pub fn matches(&self, word: &str) -> bool {
		if word.is_empty() {
			return false;
		}
		if self.case_sensitive {
			self.words.contains(word)
		} else {
			self.words.contains(&word.to_lowercase())
		}
	}
}

/// Recognizes a regex match anchored at the offset.
pub struct RegexTokenRule {
	id: TokenId,
	pattern: regex::Regex,
}

impl RegexTokenRule {
	/// Compiles `pattern` into a rule.
	pub fn new(id: TokenId, pattern: &str) -> Result<Self, regex::Error> {
		Ok(Self {
			id,
			pattern: regex::Regex::new(pattern)?,
		})
	}
}

impl TokenRule for RegexTokenRule {
	fn id(&self) -> TokenId {
		self.id
	}

	fn parse(
		&self,
		line: &str,
		offset_in_line: usize,
		_syntax: &dyn IdentifierSyntax,
	) -> Option<usize> {
		match self.pattern.find(&line[offset_in_line..]) {
			Some(m) if m.start() == 0 && !m.is_empty() => Some(m.len()),
			_ => None,
		}
	}
}

/// Tokenizes a document region with registered rules.
///
/// Rules are consulted in registration order at every position; word rules
/// are consulted with complete identifier spans. Unrecognized characters
/// are skipped.
pub struct LexicalTokenScanner<S = DefaultIdentifierSyntax> {
	rules: Vec<Box<dyn TokenRule>>,
	word_rules: Vec<WordSetTokenRule>,
	syntax: S,
}

impl LexicalTokenScanner<DefaultIdentifierSyntax> {
	/// Creates a scanner with the default identifier syntax.
	pub fn new() -> Self {
		Self::with_syntax(DefaultIdentifierSyntax)
	}
}

impl Default for LexicalTokenScanner<DefaultIdentifierSyntax> {
	fn default() -> Self {
		Self::new()
	}
}

impl<S: IdentifierSyntax> LexicalTokenScanner<S> {
	/// Creates a scanner over a custom identifier syntax.
	pub fn with_syntax(syntax: S) -> Self {
		Self {
			rules: Vec::new(),
			word_rules: Vec::new(),
			syntax,
		}
	}

	/// Registers a token rule.
	pub fn add_rule(&mut self, rule: Box<dyn TokenRule>) {
		self.rules.push(rule);
	}

	/// Registers a word rule.
	pub fn add_word_rule(&mut self, rule: WordSetTokenRule) {
		self.word_rules.push(rule);
	}

	/// Tokenizes `region` of `document`.
	pub fn scan<'a>(
		&'a self,
		document: &'a Document,
		region: Region,
	) -> Result<TokenStream<'a, S>, DocumentError> {
		Ok(TokenStream {
			scanner: self,
			characters: CharacterIterator::over(document, region)?,
		})
	}
}

/// Iterator over the tokens of a scanned region.
pub struct TokenStream<'a, S: IdentifierSyntax> {
	scanner: &'a LexicalTokenScanner<S>,
	characters: CharacterIterator<'a>,
}

impl<S: IdentifierSyntax> TokenStream<'_, S> {
	/// The scanner's position: the end of the last token, or wherever the
	/// skip of unrecognized input has reached.
	pub fn position(&self) -> Position {
		self.characters.tell()
	}

	fn next_token(&mut self) -> Option<Token> {
		let document = self.characters.document();
		while self.characters.has_next() {
			if self.characters.current() == Some(LINE_BOUNDARY_CHARACTER) {
				if self.characters.advance().is_err() {
					break;
				}
				continue;
			}
			let at = self.characters.tell();
			let line = document
				.line_text(at.line)
				.expect("the scan position stays valid while the document is borrowed");

			let scanner = self.scanner;
			for rule in &scanner.rules {
				if let Some(length) = rule.parse(line, at.offset_in_line, &scanner.syntax) {
					let end = Position::new(at.line, at.offset_in_line + length);
					let end = end.min(self.characters.region().second);
					self.characters.seek(end).ok()?;
					return Some(Token {
						id: rule.id(),
						region: Region::new(at, end),
					});
				}
			}

			let word_length = scanner.syntax.eat_identifier(line, at.offset_in_line);
			if word_length > 0 {
				let end = Position::new(at.line, at.offset_in_line + word_length);
				let end = end.min(self.characters.region().second);
				let word = &line[at.offset_in_line..end.offset_in_line];
				for rule in &scanner.word_rules {
					if rule.matches(word) {
						self.characters.seek(end).ok()?;
						return Some(Token {
							id: rule.id(),
							region: Region::new(at, end),
						});
					}
				}
				self.characters.seek(end).ok()?;
			} else if self.characters.advance().is_err() {
				break;
			}
		}
		None
	}
}

impl<S: IdentifierSyntax> Iterator for TokenStream<'_, S> {
	type Item = Token;

	fn next(&mut self) -> Option<Token> {
		self.next_token()
	}
}
