//! CCZ container: a 12-byte little-endian header naming the inner codec and
//! the uncompressed length, followed by the compressed payload.
//!
//! ```text
//! offset  size  field
//! 0       4     magic "CCZ!"
//! 4       2     format version
//! 6       2     codec id (see StreamCodec::ccz_id)
//! 8       4     uncompressed length
//! 12      ..    payload
//! ```

use deku::prelude::*;
use static_assertions::const_assert_eq;

use crate::{CodecResult, OffsetData, StreamCodec};
use crate::CodecError::*;
use crate::macros;


/// Version written by [`ccz_deflate`].
pub const CCZ_VERSION: u16 = 2;

/// Size of [`CczHeader`] on disk.
pub const CCZ_HEADER_SIZE: usize = 12;

const CCZ_MIN_VERSION: u16 = 1;


/// Fixed-size header at the start of every CCZ container
#[derive(Debug, Clone, Copy, PartialEq, Eq, DekuRead, DekuWrite)]
#[deku(magic = b"CCZ!", endian = "little")]
pub struct CczHeader {
	/// Container format version.
	pub version: u16,
	/// Inner codec, see [`StreamCodec::ccz_id`].
	pub codec_id: u16,
	/// Length of the payload once decompressed.
	pub uncompressed_len: u32,
}


impl CczHeader {
	/// Parse the header at the start of `input`, returning it together with
	/// the payload that follows.
	///
	/// # Errors
	/// - [`FormatError`]: The header is truncated, has the wrong magic, or an
	///   unsupported version.
	pub fn parse(input: &[u8]) -> CodecResult<(Self, &[u8])> {
		if input.len() < CCZ_HEADER_SIZE {
			return Err(FormatError(format!("truncated CCZ header ({} of {} bytes)", input.len(), CCZ_HEADER_SIZE)));
		};

		let (_, header) = CczHeader::from_bytes((input, 0))
			.map_err(|e| FormatError(format!("invalid CCZ header: {}", e)))?;

		if !(CCZ_MIN_VERSION..=CCZ_VERSION).contains(&header.version) {
			return Err(FormatError(format!("unsupported CCZ version {}", header.version)));
		};

		Ok((header, &input[CCZ_HEADER_SIZE..]))
	}


	/// The inner codec named by [`codec_id`][Self::codec_id].
	///
	/// # Errors
	/// - [`FormatError`]: The id names no known codec.
	pub fn codec(&self) -> CodecResult<StreamCodec> {
		StreamCodec::from_ccz_id(self.codec_id)
			.ok_or_else(|| FormatError(format!("unknown CCZ codec id {}", self.codec_id)))
	}
}


/// Decompress a CCZ container.
///
/// # Errors
/// - [`FormatError`]: Truncated header, bad magic or version, unknown codec
///   id, or a payload that does not decode to the declared length.
/// - [`CorruptData`]: The payload is not a valid stream for its codec.
///
/// # Example
/// ```
/// # use frame_codec::{ccz_deflate, ccz_inflate, StreamCodec};
/// let data = vec![7u8; 1000];
/// let container = ccz_deflate(&data, StreamCodec::Zlib).unwrap();
/// assert_eq!(&container[..4], b"CCZ!");
/// assert_eq!(ccz_inflate(&container).unwrap(), data);
/// ```
pub fn ccz_inflate(input: &[u8]) -> CodecResult<Vec<u8>> {
	let (header, payload) = CczHeader::parse(input)?;
	let codec = header.codec()?;
	let declared = usize::try_from(header.uncompressed_len).map_err(|_| AllocationFailure(usize::MAX))?;

	macros::log!(trace, "ccz_inflate: {} payload, {} -> {} bytes", codec.name(), payload.len(), declared);

	codec.decompress_slice(payload, declared)
		.map_err(|e| match e {
			FormatError(msg) => FormatError(format!("CCZ payload disagrees with its header: {}", msg)),
			e => e,
		})
}


/// Wrap `input` compressed with `codec` in a CCZ container.
///
/// # Errors
/// - [`InvalidArgument`]: `input` is longer than [`u32::MAX`] bytes.
/// - [`AllocationFailure`]: The compressor could not produce its output.
pub fn ccz_deflate(input: &[u8], codec: StreamCodec) -> CodecResult<Vec<u8>> {
	let uncompressed_len = u32::try_from(input.len())
		.map_err(|_| InvalidArgument("CCZ input is longer than u32::MAX bytes"))?;
	let header = CczHeader { version: CCZ_VERSION, codec_id: codec.ccz_id(), uncompressed_len };
	let header_bytes = header.to_bytes().map_err(|e| FormatError(format!("could not serialize CCZ header: {}", e)))?;
	const_assert_eq!(CCZ_HEADER_SIZE, 4 + 2 + 2 + 4);

	let payload = codec.compress_slice(input)?;
	let mut output = Vec::with_capacity(CCZ_HEADER_SIZE + payload.len());
	output.extend(header_bytes);
	output.extend(payload);

	Ok(output)
}


impl OffsetData<'_> {
	/// Replace the open window, which must hold a CCZ container, with its
	/// decompressed contents.  On failure the buffer and window are left
	/// untouched.
	///
	/// # Errors
	/// - [`InvalidState`]: No window is open, or a replacement is pending.
	/// - Any error of [`ccz_inflate`].
	pub fn ccz_inflate(&mut self) -> CodecResult<()> {
		let inflated = ccz_inflate(self.window_bytes()?)?;
		self.begin_replacement(inflated.len())?.copy_from_slice(&inflated);
		self.commit_replacement()
	}
}


#[cfg(test)]
fn container(codec_id: u16, declared: u32, payload: &[u8]) -> Vec<u8> {
	use crate::ExtendExt;
	use byteorder::LittleEndian;

	let mut data = b"CCZ!".to_vec();
	data.extend_with_uint::<LittleEndian, _, 2>(CCZ_VERSION);
	data.extend_with_uint::<LittleEndian, _, 2>(codec_id);
	data.extend_with_uint::<LittleEndian, _, 4>(declared);
	data.extend(payload);
	data
}


#[test]
fn header_layout() {
	let data = ccz_deflate(b"abc", StreamCodec::Stored).unwrap();
	assert_eq!(data, container(3, 3, b"abc"));
	assert_eq!(&data[..12], &[b'C', b'C', b'Z', b'!', 2, 0, 3, 0, 3, 0, 0, 0]);
}


#[test]
fn roundtrip_every_codec() {
	let data: Vec<u8> = b"planetscape ".repeat(50);

	for codec in StreamCodec::ALL {
		let packed = ccz_deflate(&data, codec).unwrap();
		let (header, _) = CczHeader::parse(&packed).unwrap();
		assert_eq!(header.codec().unwrap(), codec);
		assert_eq!(header.uncompressed_len as usize, data.len());
		assert_eq!(ccz_inflate(&packed).unwrap(), data);
	};
}


#[test]
fn declared_length_mismatch() {
	let data = vec![5u8; 400];

	for codec in StreamCodec::ALL {
		let mut packed = ccz_deflate(&data, codec).unwrap();
		packed[8] = 0x91;
		assert!(matches!(ccz_inflate(&packed), Err(FormatError(_))), "{:?}", codec);

		packed[8] = 0x8F;
		assert!(ccz_inflate(&packed).is_err(), "{:?}", codec);
	};
}


#[test]
fn bad_headers() {
	assert!(matches!(ccz_inflate(b"CCZ!"), Err(FormatError(_))));
	assert!(matches!(ccz_inflate(&[]), Err(FormatError(_))));
	assert!(matches!(ccz_inflate(&container(42, 3, b"abc")), Err(FormatError(_))));

	let mut wrong_magic = container(3, 3, b"abc");
	wrong_magic[3] = b'?';
	assert!(matches!(ccz_inflate(&wrong_magic), Err(FormatError(_))));

	let mut wrong_version = container(3, 3, b"abc");
	wrong_version[4] = 9;
	assert!(matches!(ccz_inflate(&wrong_version), Err(FormatError(_))));

	assert!(matches!(ccz_inflate(&container(0, 3, b"abc")), Err(CorruptData(_))));
}


#[test]
fn inflate_window_in_place() {
	let payload = ccz_deflate(&[9u8; 64], StreamCodec::Lz4).unwrap();
	let mut framed = b"head".to_vec();
	framed.extend(&payload);
	framed.extend(b"tail");

	let mut buffer = OffsetData::with_bytes_no_copy(&framed);
	buffer.set_window(4, payload.len()).unwrap();
	buffer.ccz_inflate().unwrap();

	let mut expected = b"head".to_vec();
	expected.extend([9u8; 64]);
	expected.extend(b"tail");
	assert_eq!(buffer.data(), expected);
	assert!(matches!(buffer.ccz_inflate(), Err(InvalidState(_))));
}


#[test]
fn huge_declared_length() {
	assert_eq!(container(1, u32::MAX, &[0]), [b'C', b'C', b'Z', b'!', 2, 0, 1, 0, 0xFF, 0xFF, 0xFF, 0xFF, 0]);
	assert!(matches!(ccz_inflate(&container(1, u32::MAX, &[0])), Err(CorruptData(_))));
	assert!(matches!(ccz_inflate(&container(2, u32::MAX, &[0])), Err(CorruptData(_))));

	let data = vec![3u8; 256];
	for codec in StreamCodec::ALL {
		let mut packed = ccz_deflate(&data, codec).unwrap();
		packed[8..12].copy_from_slice(&u32::MAX.to_le_bytes());
		assert!(matches!(ccz_inflate(&packed), Err(CorruptData(_) | FormatError(_) | AllocationFailure(_))), "{:?}", codec);
	};
}
