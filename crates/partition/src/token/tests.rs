use vellum_document::{Document, insert};
use vellum_primitives::{Position, Region};

use super::{
	DefaultIdentifierSyntax, IdentifierSyntax, LexicalTokenScanner, NumberTokenRule,
	RegexTokenRule, RegionTokenRule, Token, TokenId, TokenRule, WordSetTokenRule,
};

const DUMMY: TokenId = TokenId(100);

fn number(text: &str, offset: usize) -> Option<usize> {
	NumberTokenRule::new(DUMMY)
		.parse(text, offset, &DefaultIdentifierSyntax)
		.map(|length| offset + length)
}

#[test]
fn decimal_literals() {
	assert_eq!(number("0", 0), Some(1));
	assert_eq!(number(".", 0), None);
	assert_eq!(number(".o", 0), None);
	assert_eq!(number(".693147", 0), Some(7));
	assert_eq!(number(".693147i", 0), None);
	assert_eq!(number(".e+1", 0), None);
	assert_eq!(number(".ea", 0), None);
	assert_eq!(number(".314e1", 0), Some(6));
	assert_eq!(number(".314e+1", 0), Some(7));
	assert_eq!(number(".314e-1", 0), Some(7));
	assert_eq!(number(".314e+-0", 0), None);
	assert_eq!(number(".602E+24", 0), Some(8));
	assert_eq!(number("0.0", 1), None);
	assert_eq!(number("a.0", 1), None);
	assert_eq!(number("@.0", 1), Some(3));
}

#[test]
fn hex_integer_literals() {
	assert_eq!(number("0x", 0), None);
	assert_eq!(number("0x0", 0), Some(3));
	assert_eq!(number("0XA", 0), Some(3));
	assert_eq!(number("0xDEADBEEF", 0), Some(10));
	assert_eq!(number("0xDEADCODE", 0), None);
	assert_eq!(number("0x00e+0", 0), Some(5));
	assert_eq!(number("0x00.0", 0), Some(4));
	assert_eq!(number("00x0", 1), None);
}

fn region_rule(
	text: &str,
	offset: usize,
	escape: Option<char>,
	case_insensitive: bool,
) -> Option<usize> {
	let mut rule = RegionTokenRule::new(DUMMY, "begin", "end");
	if let Some(escape) = escape {
		rule = rule.with_escape_character(escape);
	}
	if case_insensitive {
		rule = rule.case_insensitive();
	}
	rule.parse(text, offset, &DefaultIdentifierSyntax)
		.map(|length| offset + length)
}

#[test]
fn region_rule_matches_delimited_runs() {
	assert_eq!(region_rule("----begin++++end", 0, None, false), None);
	assert_eq!(region_rule("----begin++++end", 4, None, false), Some(16));
}

#[test]
fn region_rule_honors_escapes() {
	// an escaped end never closes, and an unclosed region is no token
	assert_eq!(region_rule("begin++++\\end", 0, Some('\\'), false), None);
	// an escaped (or absent) start is no start
	assert_eq!(region_rule("\\begin++++end", 0, Some('\\'), false), None);
	assert_eq!(region_rule("\\begin++++end", 1, Some('\\'), false), None);
}

#[test]
fn region_rule_caseless_matching() {
	assert_eq!(region_rule("----bEGIn++++End", 4, None, true), Some(16));

	// the escape character folds with the rule
	assert_eq!(region_rule("begin++++Xend", 0, Some('x'), true), None);
	assert_eq!(region_rule("Xbegin++++end", 0, Some('x'), true), None);
	assert_eq!(region_rule("xbegin++++end", 1, Some('X'), true), None);
}

#[test]
fn region_rule_without_end_runs_to_end_of_line() {
	let rule = RegionTokenRule::new(DUMMY, "#", "");
	assert_eq!(rule.parse("ab# comment", 2, &DefaultIdentifierSyntax), Some(9));
	assert_eq!(rule.parse("ab# comment", 0, &DefaultIdentifierSyntax), None);
}

#[test]
fn word_set_rule_matches_whole_words_only() {
	let rule = WordSetTokenRule::new(DUMMY, ["begin", "end"], true);

	assert!(!rule.matches(""));
	assert!(!rule.matches("xxxx"));
	assert!(rule.matches("begin"));
	assert!(rule.matches("end"));
	assert!(!rule.matches("begin-"));

	let caseless = WordSetTokenRule::new(DUMMY, ["Begin"], false);
	assert!(caseless.matches("bEgIn"));
}

#[test]
fn regex_rule_is_anchored_and_non_empty() {
	let rule = RegexTokenRule::new(DUMMY, "[0-9]+").unwrap();
	assert_eq!(rule.parse("ab12cd", 2, &DefaultIdentifierSyntax), Some(2));
	assert_eq!(rule.parse("ab12cd", 0, &DefaultIdentifierSyntax), None);

	let empty = RegexTokenRule::new(DUMMY, "x*").unwrap();
	assert_eq!(empty.parse("abc", 0, &DefaultIdentifierSyntax), None);
}

#[test]
fn default_identifier_syntax_eats_identifiers() {
	let syntax = DefaultIdentifierSyntax;
	assert_eq!(syntax.eat_identifier("foo_1 bar", 0), 5);
	assert_eq!(syntax.eat_identifier("foo_1 bar", 6), 3);
	assert_eq!(syntax.eat_identifier("1foo", 0), 0);
	assert_eq!(syntax.eat_identifier("", 0), 0);
}

const NUMBER: TokenId = TokenId(1);
const KEYWORD: TokenId = TokenId(2);
const COMMENT: TokenId = TokenId(3);

fn scanner() -> LexicalTokenScanner {
	let mut scanner = LexicalTokenScanner::new();
	scanner.add_rule(Box::new(RegionTokenRule::new(COMMENT, "#", "")));
	scanner.add_rule(Box::new(NumberTokenRule::new(NUMBER)));
	scanner.add_word_rule(WordSetTokenRule::new(KEYWORD, ["let", "return"], true));
	scanner
}

fn tokens_of(text: &str) -> Vec<Token> {
	let mut document = Document::new();
	insert(&mut document, Position::zero(), text).unwrap();
	let scanner = scanner();
	let stream = scanner.scan(&document, document.region()).unwrap();
	stream.collect()
}

#[test]
fn scanner_tokenizes_across_lines() {
	let tokens = tokens_of("let x = 42 # answer\nreturn x0");
	assert_eq!(
		tokens,
		vec![
			Token {
				id: KEYWORD,
				region: Region::make_single_line(0, 0..3),
			},
			Token {
				id: NUMBER,
				region: Region::make_single_line(0, 8..10),
			},
			Token {
				id: COMMENT,
				region: Region::make_single_line(0, 11..19),
			},
			Token {
				id: KEYWORD,
				region: Region::make_single_line(1, 0..6),
			},
		]
	);
}

#[test]
fn scanner_skips_unknown_words_and_symbols() {
	let tokens = tokens_of("x + y");
	assert!(tokens.is_empty());
}

#[test]
fn scanner_respects_the_region() {
	let mut document = Document::new();
	insert(&mut document, Position::zero(), "11 22 33").unwrap();
	let scanner = scanner();
	let tokens: Vec<Token> = scanner
		.scan(&document, Region::make_single_line(0, 3..5))
		.unwrap()
		.collect();
	assert_eq!(
		tokens,
		vec![Token {
			id: NUMBER,
			region: Region::make_single_line(0, 3..5),
		}]
	);
}

#[test]
fn scanner_reports_its_position() {
	let mut document = Document::new();
	insert(&mut document, Position::zero(), "ab 12").unwrap();
	let scanner = scanner();
	let mut stream = scanner.scan(&document, document.region()).unwrap();
	assert_eq!(stream.position(), Position::zero());
	let token = stream.next().unwrap();
	assert_eq!(token.id, NUMBER);
	assert_eq!(stream.position(), Position::new(0, 5));
}
