//! Encoded text streams over files.
//!
//! [`TextFileStreamBuffer`] adapts between Unicode text and a byte file
//! through a pluggable [`Encoder`]. The read side decodes chunks out of a
//! read-only memory mapping; the write side buffers text and drains it
//! through the encoder on flush. The free functions at the bottom stream
//! whole documents in and out.

#[cfg(test)]
mod tests;

use std::fs::{File, OpenOptions};
use std::io::{Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use encoding_rs::Encoding;
use tracing::debug;
use vellum_document::Document;
use vellum_primitives::{NewlineKind, Position, Region};

use crate::encoding::{
	CodingResult, Encoder, EncoderFlags, StandardEncoder, SubstitutionPolicy, detect_encoding,
	is_detection_name,
};
use crate::error::{FileIoError, at_path};

/// Size of the Unicode-side conversion buffer, in bytes.
const UCS_BUFFER_SIZE: usize = 8192;

/// Size of the byte-side conversion buffer.
const NATIVE_BUFFER_SIZE: usize = 8192;

/// How many leading bytes the encoding detector may probe.
const DETECTION_PROBE: usize = 10 * 1024;

/// File open modes of the stream buffer. Only these four exist.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpenMode {
	/// Open an existing file for reading.
	Read,
	/// Create or overwrite-in-place for writing.
	Write,
	/// Truncate an existing file, or create one, for writing.
	WriteTruncate,
	/// Append to an existing file (plain write when it does not exist).
	WriteAppend,
}

impl OpenMode {
	fn writes(self) -> bool {
		!matches!(self, Self::Read)
	}
}

/// A text stream over one file, parameterized by an [`Encoder`].
///
/// Dropping an open buffer closes the file without flushing; call
/// [`close`](Self::close) to flush pending text.
pub struct TextFileStreamBuffer {
	path: PathBuf,
	mode: OpenMode,
	file: Option<File>,
	mapping: Option<memmap2::Mmap>,
	read_offset: usize,
	encoder: Box<dyn Encoder>,
	/// Pending not-yet-encoded text (write side).
	pending: String,
	/// Whether the byte order mark still needs to be written.
	bom_pending: bool,
	/// End of the pre-existing content (append mode).
	original_end: u64,
}

impl std::fmt::Debug for TextFileStreamBuffer {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("TextFileStreamBuffer")
			.field("path", &self.path)
			.field("mode", &self.mode)
			.field("file", &self.file)
			.field("mapping", &self.mapping)
			.field("read_offset", &self.read_offset)
			.field("pending", &self.pending)
			.field("bom_pending", &self.bom_pending)
			.field("original_end", &self.original_end)
			.finish()
	}
}

impl TextFileStreamBuffer {
	/// Opens `path` in `mode` with the named encoding.
	///
	/// For [`OpenMode::Read`] (and append over existing content) a detection
	/// name probes the first bytes of the file before the encoder is built.
	/// `write_byte_order_mark` is honored for the write modes except append
	/// over an existing file, which never emits a mark.
	pub fn open(
		path: impl Into<PathBuf>,
		mode: OpenMode,
		encoding: &str,
		substitution_policy: SubstitutionPolicy,
		write_byte_order_mark: bool,
	) -> Result<Self, FileIoError> {
		let path = path.into();
		match mode {
			OpenMode::Read => Self::open_for_reading(path, encoding, substitution_policy),
			OpenMode::Write | OpenMode::WriteTruncate | OpenMode::WriteAppend => {
				Self::open_for_writing(
					path,
					mode,
					encoding,
					substitution_policy,
					write_byte_order_mark,
				)
			}
		}
	}

	fn open_for_reading(
		path: PathBuf,
		encoding: &str,
		substitution_policy: SubstitutionPolicy,
	) -> Result<Self, FileIoError> {
		let file = at_path(&path, File::open(&path))?;
		let mapping = map_readable(&path, &file)?;
		let bytes = mapping.as_deref().unwrap_or(&[]);
		let mut encoder = build_encoder(encoding, bytes)?;
		encoder.set_substitution_policy(substitution_policy);
		if has_byte_order_mark(bytes, encoder.properties().name) {
			encoder.set_flags(encoder.flags() | EncoderFlags::UNICODE_BYTE_ORDER_MARK);
		}
		Ok(Self {
			path,
			mode: OpenMode::Read,
			file: Some(file),
			mapping,
			read_offset: 0,
			encoder,
			pending: String::new(),
			bom_pending: false,
			original_end: 0,
		})
	}

	fn open_for_writing(
		path: PathBuf,
		mode: OpenMode,
		encoding: &str,
		substitution_policy: SubstitutionPolicy,
		mut write_byte_order_mark: bool,
	) -> Result<Self, FileIoError> {
		let mut effective_mode = mode;
		let mut file = None;
		if mode == OpenMode::WriteAppend {
			match OpenOptions::new().read(true).write(true).open(&path) {
				Ok(mut f) => {
					at_path(&path, f.seek(SeekFrom::End(0)))?;
					// never mark an existing stream midway
					write_byte_order_mark = false;
					file = Some(f);
				}
				Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
					effective_mode = OpenMode::Write;
				}
				Err(e) => return Err(FileIoError::io(&path, e)),
			}
		}
		if file.is_none() {
			let mut options = OpenOptions::new();
			options.write(true).create(true);
			if effective_mode == OpenMode::WriteTruncate {
				options.truncate(true);
			}
			file = Some(at_path(&path, options.open(&path))?);
		}
		let file = file.expect("opened by one of the branches above");

		// append mode maps the existing content so detection still works
		let mapping = if effective_mode == OpenMode::WriteAppend {
			map_readable(&path, &file)?
		} else {
			None
		};
		let probe = mapping.as_deref().unwrap_or(&[]);
		let original_end = at_path(&path, file.metadata())?.len();
		let mut encoder = build_encoder(encoding, probe)?;
		encoder.set_substitution_policy(substitution_policy);
		if write_byte_order_mark {
			encoder.set_flags(encoder.flags() | EncoderFlags::UNICODE_BYTE_ORDER_MARK);
		}
		drop(mapping);
		Ok(Self {
			path,
			mode: effective_mode,
			file: Some(file),
			mapping: None,
			read_offset: 0,
			encoder,
			pending: String::with_capacity(UCS_BUFFER_SIZE),
			bom_pending: write_byte_order_mark,
			original_end,
		})
	}

	/// The path the buffer was opened on.
	pub fn path(&self) -> &Path {
		&self.path
	}

	/// The effective open mode (append degrades to write when the file was
	/// missing).
	pub fn mode(&self) -> OpenMode {
		self.mode
	}

	/// Whether the file is open.
	pub fn is_open(&self) -> bool {
		self.file.is_some()
	}

	/// The concrete encoding in use; after detection this is the detected
	/// name, not the tag passed to [`open`](Self::open).
	pub fn encoding(&self) -> &'static str {
		self.encoder.properties().name
	}

	/// Whether the stream carries a Unicode byte order mark.
	pub fn unicode_byte_order_mark(&self) -> bool {
		self.encoder
			.flags()
			.contains(EncoderFlags::UNICODE_BYTE_ORDER_MARK)
	}

	/// Decodes the next chunk of the mapped file (read mode).
	///
	/// Returns `None` at end of file.
	pub fn read_chunk(&mut self) -> Result<Option<String>, FileIoError> {
		let Some(mapping) = self.mapping.as_ref() else {
			return Ok(None);
		};
		if self.read_offset >= mapping.len() {
			return Ok(None);
		}
		let input = &mapping[self.read_offset..];
		let mut chunk = String::with_capacity(UCS_BUFFER_SIZE);
		self.encoder.set_flags(
			self.encoder.flags() | EncoderFlags::BEGINNING_OF_BUFFER | EncoderFlags::END_OF_BUFFER,
		);
		let (result, consumed) = self.encoder.to_unicode(&mut chunk, input);
		match result {
			CodingResult::Completed | CodingResult::InsufficientBuffer => {
				self.read_offset += consumed;
				if consumed == 0 && chunk.is_empty() {
					// a pathological zero-progress conversion would loop
					return Err(FileIoError::MalformedInput);
				}
				Ok(Some(chunk))
			}
			CodingResult::UnmappableCharacter => Err(FileIoError::UnmappableCharacter),
			CodingResult::MalformedInput => Err(FileIoError::MalformedInput),
		}
	}

	/// Buffers `text` for writing, draining the buffer as it fills.
	pub fn write_str(&mut self, text: &str) -> Result<(), FileIoError> {
		debug_assert!(self.mode.writes());
		self.pending.push_str(text);
		if self.pending.len() >= UCS_BUFFER_SIZE {
			self.flush()?;
		}
		Ok(())
	}

	/// Encodes and writes all pending text.
	///
	/// Conversion loops on [`CodingResult::InsufficientBuffer`], writing
	/// each drained block with a single write call. A partial OS write is
	/// an I/O error.
	pub fn flush(&mut self) -> Result<(), FileIoError> {
		if !self.mode.writes() || self.pending.is_empty() {
			return self.write_pending_mark();
		}
		self.write_pending_mark()?;
		let Some(file) = self.file.as_mut() else {
			return Ok(());
		};
		let mut native = [0u8; NATIVE_BUFFER_SIZE];
		let mut input = self.pending.as_str();
		self.encoder.set_flags(
			self.encoder.flags() | EncoderFlags::BEGINNING_OF_BUFFER | EncoderFlags::END_OF_BUFFER,
		);
		loop {
			let (result, written, consumed) = self.encoder.from_unicode(&mut native, input);
			match result {
				CodingResult::UnmappableCharacter => {
					return Err(FileIoError::UnmappableCharacter);
				}
				CodingResult::MalformedInput => return Err(FileIoError::MalformedInput),
				CodingResult::Completed | CodingResult::InsufficientBuffer => {
					at_path(&self.path, file.write_all(&native[..written]))?;
					input = &input[consumed..];
					if result == CodingResult::Completed {
						break;
					}
				}
			}
		}
		self.pending.clear();
		Ok(())
	}

	fn write_pending_mark(&mut self) -> Result<(), FileIoError> {
		if self.bom_pending
			&& self
				.encoder
				.flags()
				.contains(EncoderFlags::UNICODE_BYTE_ORDER_MARK)
			&& let Some(file) = self.file.as_mut()
		{
			let mark = byte_order_mark(self.encoder.properties().name);
			at_path(&self.path, file.write_all(mark))?;
			self.bom_pending = false;
		}
		Ok(())
	}

	/// Flushes and releases the file.
	pub fn close(mut self) -> Result<(), FileIoError> {
		self.flush()?;
		self.close_file();
		Ok(())
	}

	/// Releases the file, discarding what this buffer wrote.
	///
	/// In read mode this equals [`close`](Self::close). A written file is
	/// deleted; an appended file is truncated back to its pre-open end.
	pub fn close_and_discard(mut self) -> Result<(), FileIoError> {
		match self.mode {
			OpenMode::Read => {
				self.close_file();
				Ok(())
			}
			OpenMode::Write | OpenMode::WriteTruncate => {
				self.close_file();
				at_path(&self.path, std::fs::remove_file(&self.path))?;
				Ok(())
			}
			OpenMode::WriteAppend => {
				if let Some(file) = self.file.as_mut() {
					at_path(&self.path, file.set_len(self.original_end))?;
				}
				self.close_file();
				Ok(())
			}
		}
	}

	/// Returns whether a release actually occurred.
	fn close_file(&mut self) -> bool {
		self.mapping = None;
		if let Some(file) = self.file.take() {
			drop(file);
			self.encoder.reset_encoding_state();
			self.encoder.reset_decoding_state();
			true
		} else {
			false
		}
	}
}

impl Drop for TextFileStreamBuffer {
	fn drop(&mut self) {
		self.close_file();
	}
}

/// Maps `file` read-only; empty files map to `None`.
fn map_readable(path: &Path, file: &File) -> Result<Option<memmap2::Mmap>, FileIoError> {
	if at_path(path, file.metadata())?.len() == 0 {
		return Ok(None);
	}
	// SAFETY: the mapping is read-only and lives no longer than the file
	// handle owned by the same buffer.
	let mapping = unsafe { memmap2::Mmap::map(file) };
	at_path(path, mapping).map(Some)
}

/// Builds the encoder for `encoding`, probing `bytes` when it is a
/// detection name.
fn build_encoder(encoding: &str, bytes: &[u8]) -> Result<Box<dyn Encoder>, FileIoError> {
	if let Some(encoder) = StandardEncoder::for_label(encoding) {
		return Ok(Box::new(encoder));
	}
	if is_detection_name(encoding) {
		let probe = &bytes[..bytes.len().min(DETECTION_PROBE)];
		let detected = detect_encoding(probe);
		debug!(encoding = detected.name(), "detected file encoding");
		return Ok(Box::new(StandardEncoder::new(detected)));
	}
	Err(FileIoError::UnsupportedEncoding(encoding.to_string()))
}

fn byte_order_mark(encoding_name: &str) -> &'static [u8] {
	match encoding_name {
		"UTF-16LE" => b"\xff\xfe",
		"UTF-16BE" => b"\xfe\xff",
		_ => b"\xef\xbb\xbf",
	}
}

fn has_byte_order_mark(bytes: &[u8], encoding_name: &str) -> bool {
	Encoding::for_bom(bytes).is_some_and(|(encoding, _)| encoding.name() == encoding_name)
}

/// The encoding, newlines and mark policy of one write.
#[derive(Debug, Clone)]
pub struct WritingFormat {
	/// Target encoding name.
	pub encoding: String,
	/// Newline policy: a literal kind forces it on every line,
	/// [`NewlineKind::UseIntrinsic`] keeps each line's stored kind, and
	/// [`NewlineKind::UseDocumentInput`] uses the bound input's default.
	pub newline: NewlineKind,
	/// Policy for characters the encoding cannot represent.
	pub substitution_policy: SubstitutionPolicy,
	/// Whether to emit a Unicode byte order mark.
	pub unicode_byte_order_mark: bool,
}

/// Streams the contents of `path` into `document` at `at`.
///
/// Returns the concrete encoding used and whether the file carried a byte
/// order mark. The insertion is a single document change.
pub fn insert_file_contents(
	document: &mut Document,
	at: Position,
	path: &Path,
	encoding: &str,
	substitution_policy: SubstitutionPolicy,
) -> Result<(String, bool), FileIoError> {
	let mut buffer = TextFileStreamBuffer::open(
		path,
		OpenMode::Read,
		encoding,
		substitution_policy,
		false,
	)?;
	let mut text = String::new();
	while let Some(chunk) = buffer.read_chunk()? {
		text.push_str(&chunk);
	}
	let result = (buffer.encoding().to_string(), buffer.unicode_byte_order_mark());
	buffer.close()?;
	vellum_document::insert(document, at, &text)?;
	Ok(result)
}

/// Writes `region` of `document` through a fresh stream buffer onto `path`.
///
/// On any conversion or I/O failure the partially written file is
/// discarded (deleted, or truncated back in append mode).
pub fn write_region(
	document: &Document,
	region: Region,
	path: &Path,
	format: &WritingFormat,
	append: bool,
) -> Result<(), FileIoError> {
	let mode = if append {
		OpenMode::WriteAppend
	} else {
		OpenMode::WriteTruncate
	};
	let buffer = TextFileStreamBuffer::open(
		path,
		mode,
		&format.encoding,
		format.substitution_policy,
		format.unicode_byte_order_mark,
	)?;
	match write_document_region(buffer, document, region, format.newline) {
		Ok(mut buffer) => {
			if let Err(error) = buffer.flush() {
				let _ = buffer.close_and_discard();
				return Err(error);
			}
			buffer.close()
		}
		Err((buffer, error)) => {
			let _ = buffer.close_and_discard();
			Err(error)
		}
	}
}

fn write_document_region(
	mut buffer: TextFileStreamBuffer,
	document: &Document,
	region: Region,
	newline: NewlineKind,
) -> Result<TextFileStreamBuffer, (TextFileStreamBuffer, FileIoError)> {
	let mut write = |buffer: &mut TextFileStreamBuffer| -> Result<(), FileIoError> {
		for line in region.first.line..=region.second.line {
			let content = document.line_content(line)?;
			let text = content.text();
			let from = if line == region.first.line {
				region.first.offset_in_line
			} else {
				0
			};
			let to = if line == region.second.line {
				region.second.offset_in_line
			} else {
				text.len()
			};
			buffer.write_str(&text[from..to])?;
			if line < region.second.line {
				let kind = match newline {
					NewlineKind::UseIntrinsic => content.newline(),
					NewlineKind::UseDocumentInput => document
						.input()
						.map_or(NewlineKind::default(), |input| input.default_newline()),
					literal => literal,
				};
				let Some(literal) = kind.literal() else {
					return Err(FileIoError::NonLiteralNewline);
				};
				buffer.write_str(literal)?;
			}
		}
		Ok(())
	};
	match write(&mut buffer) {
		Ok(()) => Ok(buffer),
		Err(error) => Err((buffer, error)),
	}
}
