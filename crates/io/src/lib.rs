//! File binding for the document model.
//!
//! This crate connects a [`Document`](vellum_document::Document) to the
//! file system: encoded text streams over a pluggable [`Encoder`]
//! (implemented with `encoding_rs`, with BOM and `chardetng` detection),
//! advisory file locking, last-write-time surveillance, and the
//! transactional [`TextFileDocumentInput::write`] that leaves the bound
//! path holding either the old or the new content, never a torn
//! intermediate.

mod encoding;
mod error;
mod input;
mod lock;
mod stream;

pub use encoding::{
	CodingResult, Encoder, EncoderFlags, EncodingProperties, StandardEncoder, SubstitutionPolicy,
	default_encoding_name, detect_encoding, encoding_for_label, is_detection_name,
};
pub use error::FileIoError;
pub use input::{
	FileListenerId, FilePropertyListener, TextFileDocumentInput, TimeStampTrigger,
	UnexpectedFileTimeStampDirector,
};
pub use lock::{LockMode, LockType};
pub use stream::{
	OpenMode, TextFileStreamBuffer, WritingFormat, insert_file_contents, write_region,
};
