//! File binding for documents.
//!
//! A [`TextFileDocumentInput`] binds one document to one on-disk file. It
//! owns the file name, the encoding and newline used for I/O, the advisory
//! lock, and two last-write time stamps (one refreshed by explicit user
//! checks, one tracking the engine's own writes). It installs a gate object
//! as the document's [`DocumentInput`], sharing its state with it, so the
//! document can consult lock and time-stamp policy before the first
//! modification of a session.


use std::cell::RefCell;
use std::fs;
use std::path::{Path, PathBuf};
use std::rc::{Rc, Weak};
use std::time::SystemTime;

use tracing::{debug, warn};
use vellum_document::{Document, DocumentInput};
use vellum_primitives::{NewlineKind, Position};

use crate::encoding::{SubstitutionPolicy, default_encoding_name, encoding_for_label};
use crate::error::FileIoError;
use crate::lock::{FileLocker, LockMode, LockType};
use crate::stream::{WritingFormat, insert_file_contents, write_region};

/// Why the engine is asking about a surprising file time stamp.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeStampTrigger {
	/// The document is about to be modified for the first time.
	FirstModification,
	/// The bound file is about to be overwritten.
	OverwriteFile,
	/// An explicit [`TextFileDocumentInput::check_time_stamp`] call.
	ClientInvocation,
}

/// Decides whether to proceed when the bound file changed on disk behind
/// the engine's back. Returning `true` means proceed.
pub trait UnexpectedFileTimeStampDirector {
	fn query_about_unexpected_document_file_time_stamp(
		&mut self,
		document: &Document,
		trigger: TimeStampTrigger,
	) -> bool;
}

/// Observer of the bound file's name and encoding.
#[allow(unused_variables)]
pub trait FilePropertyListener {
	/// The bound file name changed (bind, unbind, or rebind).
	fn file_name_changed(&mut self, input: &TextFileDocumentInput) {}

	/// The encoding or newline configuration changed.
	fn file_encoding_changed(&mut self, input: &TextFileDocumentInput) {}
}

/// Handle identifying a registered file-property listener.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileListenerId(u64);

struct InputState {
	file_name: Option<PathBuf>,
	encoding: String,
	newline: NewlineKind,
	unicode_byte_order_mark: bool,
	locker: FileLocker,
	desired_lock_mode: LockMode,
	saved_document_revision: u64,
	user_last_write_time: Option<SystemTime>,
	internal_last_write_time: Option<SystemTime>,
	director: Option<Box<dyn UnexpectedFileTimeStampDirector>>,
	listeners: Vec<(FileListenerId, Box<dyn FilePropertyListener>)>,
	next_listener: u64,
}

impl InputState {
	fn is_bound(&self) -> bool {
		self.file_name.is_some()
	}
}

/// Binds a [`Document`] to a text file on disk.
pub struct TextFileDocumentInput {
	state: Rc<RefCell<InputState>>,
}

/// The object installed as the document's input; shares the binding state.
struct InputGate {
	state: Weak<RefCell<InputState>>,
}

impl TextFileDocumentInput {
	/// Creates an unbound input for `document`.
	pub fn new(document: &mut Document) -> Self {
		document.set_property(Document::TITLE_PROPERTY, "");
		Self {
			state: Rc::new(RefCell::new(InputState {
				file_name: None,
				encoding: default_encoding_name().to_string(),
				newline: NewlineKind::default(),
				unicode_byte_order_mark: false,
				locker: FileLocker::default(),
				desired_lock_mode: LockMode::default(),
				saved_document_revision: 0,
				user_last_write_time: None,
				internal_last_write_time: None,
				director: None,
				listeners: Vec::new(),
				next_listener: 0,
			})),
		}
	}

	// --- attributes --------------------------------------------------------

	/// Whether the input is bound to a file.
	pub fn is_bound(&self) -> bool {
		self.state.borrow().is_bound()
	}

	/// The bound (canonical) file name.
	pub fn file_name(&self) -> Option<PathBuf> {
		self.state.borrow().file_name.clone()
	}

	/// The encoding used for reading and writing.
	pub fn encoding(&self) -> String {
		self.state.borrow().encoding.clone()
	}

	/// The default newline of the bound file.
	pub fn newline(&self) -> NewlineKind {
		self.state.borrow().newline
	}

	/// Whether the bound file carried a Unicode byte order mark.
	pub fn unicode_byte_order_mark(&self) -> bool {
		self.state.borrow().unicode_byte_order_mark
	}

	/// The currently held lock type (not the desired mode).
	pub fn lock_type(&self) -> LockType {
		self.state.borrow().locker.lock_type()
	}

	/// The document revision captured at the last revert or successful
	/// write.
	pub fn saved_document_revision(&self) -> u64 {
		self.state.borrow().saved_document_revision
	}

	/// Sets the encoding for subsequent I/O.
	///
	/// # Errors
	///
	/// [`FileIoError::UnsupportedEncoding`] when no encoder answers to
	/// `encoding`.
	pub fn set_encoding(&mut self, encoding: &str) -> Result<(), FileIoError> {
		let Some(resolved) = encoding_for_label(encoding) else {
			return Err(FileIoError::UnsupportedEncoding(encoding.to_string()));
		};
		self.state.borrow_mut().encoding = resolved.name().to_string();
		self.notify(|l, d| FilePropertyListener::file_encoding_changed(l, d));
		Ok(())
	}

	/// Sets the default newline for subsequent writes.
	///
	/// # Errors
	///
	/// [`FileIoError::NonLiteralNewline`] unless `newline` is literal.
	pub fn set_newline(&mut self, newline: NewlineKind) -> Result<(), FileIoError> {
		if !newline.is_literal() {
			return Err(FileIoError::NonLiteralNewline);
		}
		let changed = {
			let mut state = self.state.borrow_mut();
			let changed = state.newline != newline;
			state.newline = newline;
			changed
		};
		if changed {
			self.notify(|l, d| FilePropertyListener::file_encoding_changed(l, d));
		}
		Ok(())
	}

	// --- listeners ---------------------------------------------------------

	/// Registers a file-property listener.
	pub fn add_listener(&mut self, listener: Box<dyn FilePropertyListener>) -> FileListenerId {
		let mut state = self.state.borrow_mut();
		let id = FileListenerId(state.next_listener);
		state.next_listener += 1;
		state.listeners.push((id, listener));
		id
	}

	/// Removes a listener; returns whether it was registered.
	pub fn remove_listener(&mut self, id: FileListenerId) -> bool {
		let mut state = self.state.borrow_mut();
		let before = state.listeners.len();
		state.listeners.retain(|(lid, _)| *lid != id);
		state.listeners.len() != before
	}

	fn notify(&self, f: fn(&mut dyn FilePropertyListener, &TextFileDocumentInput)) {
		let mut listeners = std::mem::take(&mut self.state.borrow_mut().listeners);
		for (_, listener) in listeners.iter_mut() {
			f(listener.as_mut(), self);
		}
		let mut state = self.state.borrow_mut();
		debug_assert!(state.listeners.is_empty());
		state.listeners = listeners;
	}

	// --- binding -----------------------------------------------------------

	/// Binds the input (and the document) to `file_name`.
	///
	/// The path is canonicalized and must exist. A held lock is re-acquired
	/// on the new path with the same type. The document is marked modified:
	/// its content does not correspond to the newly bound file until a
	/// revert or save.
	pub fn bind(
		&mut self,
		document: &mut Document,
		file_name: impl AsRef<Path>,
	) -> Result<(), FileIoError> {
		let file_name = file_name.as_ref();
		let real = fs::canonicalize(file_name).map_err(|e| FileIoError::io(file_name, e))?;

		{
			let mut state = self.state.borrow_mut();
			if state.locker.has_lock() {
				let shared = state.locker.lock_type() == LockType::Shared;
				state.locker.lock(&real, shared)?;
			}
			state.file_name = Some(real);
		}
		document.set_input(Some(Box::new(InputGate {
			state: Rc::downgrade(&self.state),
		})));
		self.notify(|l, d| FilePropertyListener::file_name_changed(l, d));
		document.set_modified();
		Ok(())
	}

	/// Releases the binding. The document content is left alone.
	pub fn unbind(&mut self, document: &mut Document) {
		if !self.is_bound() {
			return;
		}
		{
			let mut state = self.state.borrow_mut();
			state.locker.unlock();
			state.file_name = None;
			state.encoding = default_encoding_name().to_string();
			state.user_last_write_time = None;
			state.internal_last_write_time = None;
		}
		document.set_input(None);
		self.notify(|l, d| FilePropertyListener::file_name_changed(l, d));
		self.notify(|l, d| FilePropertyListener::file_encoding_changed(l, d));
	}

	// --- locking -----------------------------------------------------------

	/// Locks the bound file per `mode` (or unlocks for
	/// [`LockType::None`]). With `only_as_editing` the lock waits for the
	/// first modification.
	pub fn lock_file(
		&mut self,
		document: &Document,
		mode: LockMode,
	) -> Result<(), FileIoError> {
		let mut state = self.state.borrow_mut();
		let Some(path) = state.file_name.clone() else {
			return Err(FileIoError::NotBound);
		};
		if mode.lock_type == LockType::None {
			state.locker.unlock();
		} else if !mode.only_as_editing || !document.is_modified() {
			state.locker.lock(&path, mode.lock_type == LockType::Shared)?;
		}
		state.desired_lock_mode = mode;
		Ok(())
	}

	/// Releases the held lock, keeping the desired mode.
	pub fn unlock_file(&mut self) {
		self.state.borrow_mut().locker.unlock();
	}

	// --- content -----------------------------------------------------------

	/// Replaces the document content with the bound file's.
	///
	/// Streams the file through a fresh stream buffer (detecting the
	/// encoding when `encoding` is a detection name), records the detected
	/// encoding, the newline of the first line and the byte-order-mark
	/// flag, sets the document title, clears undo history, marks the
	/// document unmodified, and takes both time stamps. On a read failure
	/// the document content is lost (reset).
	pub fn revert(
		&mut self,
		document: &mut Document,
		encoding: &str,
		substitution_policy: SubstitutionPolicy,
		director: Option<Box<dyn UnexpectedFileTimeStampDirector>>,
	) -> Result<(), FileIoError> {
		let Some(path) = self.file_name() else {
			return Err(FileIoError::NotBound);
		};
		document.reset_content();
		self.state.borrow_mut().director = None;

		let recorded = document.is_recording_changes();
		document.record_changes(false);
		let result = insert_file_contents(
			document,
			Position::zero(),
			&path,
			encoding,
			substitution_policy,
		);
		document.record_changes(recorded);
		let (resolved_encoding, byte_order_mark) = match result {
			Ok(r) => r,
			Err(e) => {
				document.reset_content();
				return Err(e);
			}
		};

		let first_line_newline = document
			.line_content(0)
			.map(|l| l.newline())
			.unwrap_or_default();
		{
			let mut state = self.state.borrow_mut();
			state.unicode_byte_order_mark = byte_order_mark;
			state.saved_document_revision = document.revision_number();
			state.director = director;
			state.encoding = resolved_encoding;
			state.newline = first_line_newline;
		}
		document.set_property(Document::TITLE_PROPERTY, path.display().to_string());
		self.notify(|l, d| FilePropertyListener::file_encoding_changed(l, d));
		self.notify(|l, d| FilePropertyListener::file_name_changed(l, d));

		document.clear_undo_buffer();
		document.mark_unmodified();

		let stamp = file_last_write_time(&path);
		let mut state = self.state.borrow_mut();
		state.internal_last_write_time = stamp;
		state.user_last_write_time = stamp;
		debug!(path = %path.display(), encoding = %state.encoding, "document reverted");
		Ok(())
	}

	/// Writes the document into the bound file, transactionally.
	///
	/// The content is written to a sibling temporary file which then
	/// replaces the original, so the bound path always holds either the old
	/// or the new content. Returns `false` without touching the disk when
	/// the document is unmodified or the time-stamp director refuses the
	/// overwrite.
	pub fn write(
		&mut self,
		document: &mut Document,
		format: &WritingFormat,
	) -> Result<bool, FileIoError> {
		if !document.is_modified() {
			return Ok(false);
		}
		let Some(path) = self.file_name() else {
			return Err(FileIoError::NotBound);
		};

		// refuse devices and FIFOs
		let original_metadata = match fs::metadata(&path) {
			Ok(m) => {
				if !m.is_file() {
					return Err(FileIoError::SpecialFile(path));
				}
				if m.permissions().readonly() {
					return Err(FileIoError::io(
						&path,
						std::io::Error::from(std::io::ErrorKind::PermissionDenied),
					));
				}
				Some(m)
			}
			Err(_) => None,
		};

		// the disk file may have changed behind our back
		if !self.verify_time_stamp(true).0
			&& !self.query_director(document, TimeStampTrigger::OverwriteFile)
		{
			return Ok(false);
		}

		// write the new content next to the original
		let parent = path.parent().unwrap_or(Path::new("."));
		let temp = tempfile::Builder::new()
			.suffix(".tmp")
			.tempfile_in(parent)
			.map_err(|e| FileIoError::io(parent, e))?;
		let temp_path = temp
			.into_temp_path()
			.keep()
			.map_err(|e| FileIoError::io(parent, e.error))?;
		if let Err(e) = write_region(document, document.region(), &temp_path, format, false) {
			let _ = fs::remove_file(&temp_path);
			return Err(e);
		}

		let replace_result = (|| -> Result<(), FileIoError> {
			self.unlock_file();
			let mut original_removed = false;
			if let Some(metadata) = &original_metadata {
				let _ = fs::set_permissions(&temp_path, metadata.permissions());
				match fs::remove_file(&path) {
					Ok(()) => original_removed = true,
					Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
					Err(e) => {
						let _ = fs::remove_file(&temp_path);
						return Err(FileIoError::io(&path, e));
					}
				}
			}
			if let Err(e) = fs::rename(&temp_path, &path) {
				let _ = fs::remove_file(&temp_path);
				if original_removed {
					return Err(FileIoError::LostDiskFile(path.clone()));
				}
				return Err(FileIoError::io(&path, e));
			}
			Ok(())
		})();

		// re-acquire the previous lock whether or not the swap worked
		let relock = {
			let state = self.state.borrow();
			(state.desired_lock_mode, state.file_name.clone())
		};
		if let (mode, Some(path)) = relock
			&& mode.lock_type != LockType::None
			&& (!mode.only_as_editing || document.is_modified())
		{
			let shared = mode.lock_type == LockType::Shared;
			if let Err(e) = self.state.borrow_mut().locker.lock(&path, shared) {
				warn!(path = %path.display(), error = %e, "failed to re-acquire the file lock");
			}
		}
		replace_result?;

		{
			let mut state = self.state.borrow_mut();
			state.saved_document_revision = document.revision_number();
		}
		document.mark_unmodified();
		document.set_read_only(false);
		let stamp = file_last_write_time(&path);
		{
			let mut state = self.state.borrow_mut();
			state.internal_last_write_time = stamp;
			state.user_last_write_time = stamp;
		}
		debug!(path = %path.display(), "document written");
		Ok(true)
	}

	// --- time stamps -------------------------------------------------------

	/// Re-reads the bound file's time stamp on the user's behalf.
	///
	/// On a surprise (the file changed since the last check) the director
	/// is consulted; when it refuses, the previously known stamp is kept
	/// and `false` is returned.
	pub fn check_time_stamp(&mut self, document: &Document) -> bool {
		let (matches, actual) = self.verify_time_stamp(false);
		if matches {
			return true;
		}
		let original = self.state.borrow().user_last_write_time;
		self.state.borrow_mut().user_last_write_time = None;
		if self.query_director(document, TimeStampTrigger::ClientInvocation) {
			self.state.borrow_mut().user_last_write_time = actual;
			true
		} else {
			self.state.borrow_mut().user_last_write_time = original;
			false
		}
	}

	/// Compares a stored stamp against the disk. Returns whether they
	/// match (or the stamp is unmanaged) and the actual disk stamp.
	fn verify_time_stamp(&self, internal: bool) -> (bool, Option<SystemTime>) {
		let state = self.state.borrow();
		verify_time_stamp(&state, internal)
	}

	fn query_director(&self, document: &Document, trigger: TimeStampTrigger) -> bool {
		let director = self.state.borrow_mut().director.take();
		let Some(mut director) = director else {
			return true;
		};
		let answer = director.query_about_unexpected_document_file_time_stamp(document, trigger);
		self.state.borrow_mut().director = Some(director);
		answer
	}
}

fn verify_time_stamp(state: &InputState, internal: bool) -> (bool, Option<SystemTime>) {
	let about = if internal {
		state.internal_last_write_time
	} else {
		state.user_last_write_time
	};
	let (Some(path), Some(about)) = (&state.file_name, about) else {
		return (true, None);
	};
	if state.locker.has_lock() {
		return (true, None);
	}
	match file_last_write_time(path) {
		Some(actual) => (about >= actual, Some(actual)),
		None => (true, None),
	}
}

fn file_last_write_time(path: &Path) -> Option<SystemTime> {
	fs::metadata(path).and_then(|m| m.modified()).ok()
}

impl DocumentInput for InputGate {
	fn location(&self) -> Option<PathBuf> {
		self.state
			.upgrade()
			.and_then(|state| state.borrow().file_name.clone())
	}

	fn default_newline(&self) -> NewlineKind {
		self.state
			.upgrade()
			.map_or(NewlineKind::default(), |state| state.borrow().newline)
	}

	fn is_changeable(&self, document: &Document) -> bool {
		let Some(state) = self.state.upgrade() else {
			return true;
		};
		if !state.borrow().is_bound() {
			return true;
		}

		// check the time stamp on the first modification of a session
		let has_director = state.borrow().director.is_some();
		if has_director && !document.is_modified() {
			let (matches, actual) = verify_time_stamp(&state.borrow(), true);
			if !matches {
				let director = state.borrow_mut().director.take();
				let proceed = director.map(|mut d| {
					let answer = d.query_about_unexpected_document_file_time_stamp(
						document,
						TimeStampTrigger::FirstModification,
					);
					state.borrow_mut().director = Some(d);
					answer
				});
				if proceed == Some(false) {
					return false;
				}
				let mut s = state.borrow_mut();
				s.internal_last_write_time = actual;
				s.user_last_write_time = actual;
			}
		}

		// a deferred lock is taken when editing actually starts
		let mut s = state.borrow_mut();
		if s.desired_lock_mode.only_as_editing && s.desired_lock_mode.lock_type != LockType::None {
			let shared = s.desired_lock_mode.lock_type == LockType::Shared;
			if let Some(path) = s.file_name.clone()
				&& let Err(e) = s.locker.lock(&path, shared)
			{
				warn!(path = %path.display(), error = %e, "deferred lock failed");
				return false;
			}
		}
		true
	}

	fn modification_sign_changed(&mut self, document: &Document) {
		let Some(state) = self.state.upgrade() else {
			return;
		};
		let mut s = state.borrow_mut();
		if !s.is_bound() || !s.desired_lock_mode.only_as_editing {
			return;
		}
		if !document.is_modified() {
			s.locker.unlock();
		} else if s.desired_lock_mode.lock_type != LockType::None
			&& let Some(path) = s.file_name.clone()
		{
			let shared = s.desired_lock_mode.lock_type == LockType::Shared;
			if let Err(e) = s.locker.lock(&path, shared) {
				warn!(path = %path.display(), error = %e, "editing lock failed");
			}
		}
	}
}
