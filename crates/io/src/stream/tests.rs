use std::fs;

use vellum_document::Document;
use vellum_primitives::{NewlineKind, Position, Region};

use super::{OpenMode, TextFileStreamBuffer, WritingFormat, insert_file_contents, write_region};
use crate::encoding::SubstitutionPolicy;
use crate::error::FileIoError;

fn open(
	path: &std::path::Path,
	mode: OpenMode,
	encoding: &str,
	bom: bool,
) -> TextFileStreamBuffer {
	TextFileStreamBuffer::open(path, mode, encoding, SubstitutionPolicy::DontSubstitute, bom)
		.unwrap()
}

fn read_all(buffer: &mut TextFileStreamBuffer) -> String {
	let mut text = String::new();
	while let Some(chunk) = buffer.read_chunk().unwrap() {
		text.push_str(&chunk);
	}
	text
}

#[test]
fn reading_decodes_in_chunks() {
	let dir = tempfile::tempdir().unwrap();
	let path = dir.path().join("big.txt");
	let content = "0123456789abcdef".repeat(2048); // 32 KiB, several chunks
	fs::write(&path, &content).unwrap();

	let mut buffer = open(&path, OpenMode::Read, "utf-8", false);
	assert!(buffer.is_open());
	assert_eq!(buffer.encoding(), "UTF-8");
	assert_eq!(read_all(&mut buffer), content);
	buffer.close().unwrap();
}

#[test]
fn reading_an_empty_file_yields_nothing() {
	let dir = tempfile::tempdir().unwrap();
	let path = dir.path().join("empty.txt");
	fs::write(&path, b"").unwrap();

	let mut buffer = open(&path, OpenMode::Read, "utf-8", false);
	assert_eq!(buffer.read_chunk().unwrap(), None);
	buffer.close().unwrap();
}

#[test]
fn reading_skips_a_byte_order_mark() {
	let dir = tempfile::tempdir().unwrap();
	let path = dir.path().join("bom.txt");
	fs::write(&path, b"\xef\xbb\xbfhello").unwrap();

	let mut buffer = open(&path, OpenMode::Read, "utf-8", false);
	assert!(buffer.unicode_byte_order_mark());
	assert_eq!(read_all(&mut buffer), "hello");
	buffer.close().unwrap();
}

#[test]
fn malformed_bytes_are_an_error() {
	let dir = tempfile::tempdir().unwrap();
	let path = dir.path().join("bad.txt");
	fs::write(&path, b"ok\xffbad").unwrap();

	let mut buffer = open(&path, OpenMode::Read, "utf-8", false);
	let error = loop {
		match buffer.read_chunk() {
			Ok(Some(_)) => continue,
			Ok(None) => panic!("malformed input went unnoticed"),
			Err(e) => break e,
		}
	};
	assert!(matches!(error, FileIoError::MalformedInput));
}

#[test]
fn writing_truncates_and_emits_the_mark_once() {
	let dir = tempfile::tempdir().unwrap();
	let path = dir.path().join("out.txt");
	fs::write(&path, b"previous content that is longer").unwrap();

	let mut buffer = open(&path, OpenMode::WriteTruncate, "utf-8", true);
	buffer.write_str("héllo ").unwrap();
	buffer.write_str("wörld").unwrap();
	buffer.close().unwrap();

	let bytes = fs::read(&path).unwrap();
	assert_eq!(bytes, "\u{feff}héllo wörld".as_bytes());
}

#[test]
fn append_mode_continues_the_file_and_never_marks() {
	let dir = tempfile::tempdir().unwrap();
	let path = dir.path().join("log.txt");
	fs::write(&path, b"first|").unwrap();

	let mut buffer = open(&path, OpenMode::WriteAppend, "utf-8", true);
	assert_eq!(buffer.mode(), OpenMode::WriteAppend);
	buffer.write_str("second").unwrap();
	buffer.close().unwrap();
	assert_eq!(fs::read(&path).unwrap(), b"first|second");
}

#[test]
fn append_to_a_missing_file_degrades_to_write() {
	let dir = tempfile::tempdir().unwrap();
	let path = dir.path().join("fresh.txt");

	let mut buffer = open(&path, OpenMode::WriteAppend, "utf-8", false);
	assert_eq!(buffer.mode(), OpenMode::Write);
	buffer.write_str("content").unwrap();
	buffer.close().unwrap();
	assert_eq!(fs::read(&path).unwrap(), b"content");
}

#[test]
fn discarding_a_write_removes_the_file() {
	let dir = tempfile::tempdir().unwrap();
	let path = dir.path().join("doomed.txt");

	let mut buffer = open(&path, OpenMode::WriteTruncate, "utf-8", false);
	buffer.write_str("half-").unwrap();
	buffer.flush().unwrap();
	buffer.close_and_discard().unwrap();
	assert!(!path.exists());
}

#[test]
fn discarding_an_append_truncates_back() {
	let dir = tempfile::tempdir().unwrap();
	let path = dir.path().join("log.txt");
	fs::write(&path, b"keep me|").unwrap();

	let mut buffer = open(&path, OpenMode::WriteAppend, "utf-8", false);
	buffer.write_str("discard me").unwrap();
	buffer.flush().unwrap();
	buffer.close_and_discard().unwrap();
	assert_eq!(fs::read(&path).unwrap(), b"keep me|");
}

#[test]
fn unsupported_encodings_are_rejected() {
	let dir = tempfile::tempdir().unwrap();
	let path = dir.path().join("x.txt");
	fs::write(&path, b"x").unwrap();

	let error = TextFileStreamBuffer::open(
		&path,
		OpenMode::Read,
		"no-such-charset",
		SubstitutionPolicy::DontSubstitute,
		false,
	)
	.unwrap_err();
	assert!(matches!(error, FileIoError::UnsupportedEncoding(_)));
}

#[test]
fn file_contents_insert_as_one_change() {
	let dir = tempfile::tempdir().unwrap();
	let path = dir.path().join("x.txt");
	fs::write(&path, b"alpha\nbeta").unwrap();

	let mut document = Document::new();
	vellum_document::insert(&mut document, Position::zero(), "()").unwrap();
	let revision = document.revision_number();

	let (encoding, bom) = insert_file_contents(
		&mut document,
		Position::new(0, 1),
		&path,
		"utf-8",
		SubstitutionPolicy::DontSubstitute,
	)
	.unwrap();
	assert_eq!(encoding, "UTF-8");
	assert!(!bom);
	assert_eq!(document.text(), "(alpha\nbeta)");
	assert_eq!(document.revision_number(), revision + 1);
}

#[test]
fn regions_write_with_per_line_newlines() {
	let dir = tempfile::tempdir().unwrap();
	let path = dir.path().join("x.txt");

	let mut document = Document::new();
	vellum_document::insert(&mut document, Position::zero(), "one\r\ntwo\u{2028}three").unwrap();

	let format = WritingFormat {
		encoding: "utf-8".into(),
		newline: NewlineKind::UseIntrinsic,
		substitution_policy: SubstitutionPolicy::DontSubstitute,
		unicode_byte_order_mark: false,
	};
	write_region(&document, document.region(), &path, &format, false).unwrap();
	assert_eq!(
		fs::read(&path).unwrap(),
		"one\r\ntwo\u{2028}three".as_bytes()
	);

	// a partial region
	write_region(
		&document,
		Region::new(Position::new(0, 1), Position::new(1, 2)),
		&path,
		&format,
		false,
	)
	.unwrap();
	assert_eq!(fs::read(&path).unwrap(), "ne\r\ntw".as_bytes());
}
