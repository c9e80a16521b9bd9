//! The encoder bridge.
//!
//! The engine consumes a pluggable [`Encoder`] interface; this module
//! provides the standard implementation over `encoding_rs`, plus byte-order
//! detection for the auto-detect tags (`chardetng` and BOM sniffing).
//! UTF-16LE/BE are decode-only in `encoding_rs`, so their encode direction
//! is implemented here directly.

use bitflags::bitflags;
use encoding_rs::{DecoderResult, Encoding, UTF_8, UTF_16BE, UTF_16LE};

bitflags! {
	/// Conversion-state flags of an [`Encoder`].
	#[derive(Debug, Clone, Copy, PartialEq, Eq)]
	pub struct EncoderFlags: u32 {
		/// The stream carries (or should carry) a Unicode byte order mark.
		const UNICODE_BYTE_ORDER_MARK = 1;
		/// The next conversion call starts a buffer.
		const BEGINNING_OF_BUFFER = 1 << 1;
		/// The next conversion call ends a buffer.
		const END_OF_BUFFER = 1 << 2;
	}
}

/// What to do with characters the target encoding cannot represent.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SubstitutionPolicy {
	/// Fail the conversion.
	#[default]
	DontSubstitute,
	/// Replace with the encoding's substitution character.
	ReplaceUnmappableCharacters,
	/// Drop the offending character.
	IgnoreUnmappableCharacters,
}

/// Outcome of one conversion call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CodingResult {
	/// All input was consumed.
	Completed,
	/// The output buffer filled before the input was consumed.
	InsufficientBuffer,
	/// A character has no representation in the target encoding.
	UnmappableCharacter,
	/// The input is not valid in the source encoding.
	MalformedInput,
}

/// Name and IANA MIBenum of an encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EncodingProperties {
	/// The canonical WHATWG name.
	pub name: &'static str,
	/// The IANA MIBenum, or zero when not registered here.
	pub mib: u16,
}

/// Converter between Unicode text and encoded bytes.
///
/// The buffer flags mirror stream state: callers set
/// [`EncoderFlags::BEGINNING_OF_BUFFER`] / [`EncoderFlags::END_OF_BUFFER`]
/// around each drained conversion, and
/// [`EncoderFlags::UNICODE_BYTE_ORDER_MARK`] carries the BOM state of the
/// stream in both directions.
pub trait Encoder {
	/// Name and MIBenum of the concrete encoding.
	fn properties(&self) -> EncodingProperties;

	/// The active substitution policy.
	fn substitution_policy(&self) -> SubstitutionPolicy;

	/// Sets the substitution policy.
	fn set_substitution_policy(&mut self, policy: SubstitutionPolicy);

	/// The conversion-state flags.
	fn flags(&self) -> EncoderFlags;

	/// Replaces the conversion-state flags.
	fn set_flags(&mut self, flags: EncoderFlags);

	/// Encodes `input` into `output`.
	///
	/// Returns the result, the bytes written to `output`, and the bytes of
	/// `input` consumed. On [`CodingResult::InsufficientBuffer`] the caller
	/// drains `output` and calls again with the unconsumed remainder.
	fn from_unicode(&mut self, output: &mut [u8], input: &str) -> (CodingResult, usize, usize);

	/// Decodes `input`, appending to `output` within its spare capacity.
	///
	/// Returns the result and the bytes of `input` consumed.
	fn to_unicode(&mut self, output: &mut String, input: &[u8]) -> (CodingResult, usize);

	/// Resets the encode-direction state.
	fn reset_encoding_state(&mut self);

	/// Resets the decode-direction state.
	fn reset_decoding_state(&mut self);
}

/// MIBenum values for the encodings commonly seen here.
fn mib_of(encoding: &'static Encoding) -> u16 {
	match encoding.name() {
		"UTF-8" => 106,
		"UTF-16LE" => 1014,
		"UTF-16BE" => 1013,
		"windows-1252" => 2252,
		"ISO-8859-1" => 4,
		"Shift_JIS" => 17,
		"EUC-JP" => 18,
		"ISO-2022-JP" => 39,
		"EUC-KR" => 38,
		"GBK" => 113,
		"Big5" => 2026,
		"KOI8-R" => 2084,
		_ => 0,
	}
}

/// The platform-default encoding name.
pub fn default_encoding_name() -> &'static str {
	UTF_8.name()
}

/// Whether `name` names a detector rather than a concrete encoding.
pub fn is_detection_name(name: &str) -> bool {
	matches!(
		name.to_ascii_lowercase().as_str(),
		"auto" | "auto-detect" | "autodetect" | "universal"
	)
}

/// Resolves an encoding label to a concrete encoding, if supported.
pub fn encoding_for_label(label: &str) -> Option<&'static Encoding> {
	Encoding::for_label(label.trim().as_bytes())
}

/// Guesses the encoding of `bytes`.
///
/// A BOM wins; otherwise valid UTF-8 (allowing a multi-byte character cut
/// off at the probe end) is taken at face value, and `chardetng` decides
/// the rest.
pub fn detect_encoding(bytes: &[u8]) -> &'static Encoding {
	if let Some((encoding, _)) = Encoding::for_bom(bytes) {
		return encoding;
	}
	match std::str::from_utf8(bytes) {
		Ok(_) => return UTF_8,
		Err(e) if e.error_len().is_none() => return UTF_8,
		Err(_) => {}
	}
	let mut detector = chardetng::EncodingDetector::new();
	detector.feed(bytes, true);
	detector.guess(None, true)
}

/// The standard [`Encoder`] over an `encoding_rs` encoding.
pub struct StandardEncoder {
	encoding: &'static Encoding,
	decoder: encoding_rs::Decoder,
	encoder: Option<encoding_rs::Encoder>,
	flags: EncoderFlags,
	policy: SubstitutionPolicy,
}

impl StandardEncoder {
	/// Creates an encoder for a concrete encoding.
	pub fn new(encoding: &'static Encoding) -> Self {
		Self {
			encoding,
			decoder: encoding.new_decoder(),
			encoder: encodes_via_encoding_rs(encoding).then(|| encoding.new_encoder()),
			flags: EncoderFlags::empty(),
			policy: SubstitutionPolicy::default(),
		}
	}

	/// Resolves `label` and creates an encoder for it.
	pub fn for_label(label: &str) -> Option<Self> {
		encoding_for_label(label).map(Self::new)
	}

	/// Hand-rolled UTF-16 encode (decode-only in `encoding_rs`).
	fn utf16_from_unicode(
		&self,
		output: &mut [u8],
		input: &str,
	) -> (CodingResult, usize, usize) {
		let little_endian = self.encoding == UTF_16LE;
		let mut written = 0;
		let mut consumed = 0;
		for ch in input.chars() {
			let mut units = [0u16; 2];
			let units = ch.encode_utf16(&mut units);
			if written + units.len() * 2 > output.len() {
				return (CodingResult::InsufficientBuffer, written, consumed);
			}
			for unit in units {
				let bytes = if little_endian {
					unit.to_le_bytes()
				} else {
					unit.to_be_bytes()
				};
				output[written..written + 2].copy_from_slice(&bytes);
				written += 2;
			}
			consumed += ch.len_utf8();
		}
		(CodingResult::Completed, written, consumed)
	}
}

/// Whether `encoding_rs` supports the encode direction for `encoding`.
fn encodes_via_encoding_rs(encoding: &'static Encoding) -> bool {
	encoding != UTF_16LE && encoding != UTF_16BE
}

impl Encoder for StandardEncoder {
	fn properties(&self) -> EncodingProperties {
		EncodingProperties {
			name: self.encoding.name(),
			mib: mib_of(self.encoding),
		}
	}

	fn substitution_policy(&self) -> SubstitutionPolicy {
		self.policy
	}

	fn set_substitution_policy(&mut self, policy: SubstitutionPolicy) {
		self.policy = policy;
	}

	fn flags(&self) -> EncoderFlags {
		self.flags
	}

	fn set_flags(&mut self, flags: EncoderFlags) {
		self.flags = flags;
	}

	fn from_unicode(&mut self, output: &mut [u8], input: &str) -> (CodingResult, usize, usize) {
		let last = self.flags.contains(EncoderFlags::END_OF_BUFFER);
		let Some(encoder) = self.encoder.as_mut() else {
			return self.utf16_from_unicode(output, input);
		};
		match self.policy {
			SubstitutionPolicy::DontSubstitute => {
				let (result, consumed, written) =
					encoder.encode_from_utf8_without_replacement(input, output, last);
				let coding = match result {
					encoding_rs::EncoderResult::InputEmpty => CodingResult::Completed,
					encoding_rs::EncoderResult::OutputFull => CodingResult::InsufficientBuffer,
					encoding_rs::EncoderResult::Unmappable(_) => CodingResult::UnmappableCharacter,
				};
				(coding, written, consumed)
			}
			SubstitutionPolicy::ReplaceUnmappableCharacters
			| SubstitutionPolicy::IgnoreUnmappableCharacters => {
				let (result, consumed, written, _had_unmappable) =
					encoder.encode_from_utf8(input, output, last);
				let coding = match result {
					encoding_rs::CoderResult::InputEmpty => CodingResult::Completed,
					encoding_rs::CoderResult::OutputFull => CodingResult::InsufficientBuffer,
				};
				(coding, written, consumed)
			}
		}
	}

	fn to_unicode(&mut self, output: &mut String, input: &[u8]) -> (CodingResult, usize) {
		let last = self.flags.contains(EncoderFlags::END_OF_BUFFER);
		match self.policy {
			SubstitutionPolicy::DontSubstitute => {
				let (result, consumed) =
					self.decoder
						.decode_to_string_without_replacement(input, output, last);
				let coding = match result {
					DecoderResult::InputEmpty => CodingResult::Completed,
					DecoderResult::OutputFull => CodingResult::InsufficientBuffer,
					DecoderResult::Malformed(..) => CodingResult::MalformedInput,
				};
				(coding, consumed)
			}
			SubstitutionPolicy::ReplaceUnmappableCharacters
			| SubstitutionPolicy::IgnoreUnmappableCharacters => {
				let (result, consumed, _had_errors) =
					self.decoder.decode_to_string(input, output, last);
				let coding = match result {
					encoding_rs::CoderResult::InputEmpty => CodingResult::Completed,
					encoding_rs::CoderResult::OutputFull => CodingResult::InsufficientBuffer,
				};
				(coding, consumed)
			}
		}
	}

	fn reset_encoding_state(&mut self) {
		self.encoder = encodes_via_encoding_rs(self.encoding).then(|| self.encoding.new_encoder());
	}

	fn reset_decoding_state(&mut self) {
		self.decoder = self.encoding.new_decoder();
	}
}
