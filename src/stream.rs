//! Whole-buffer adapters over the general purpose stream compressors.
//!
//! Compressed output is only required to round-trip; decompression of any
//! valid input is exact.  Empty input always maps to empty output.  A
//! structurally invalid stream is [`CorruptData`]; a stream that decodes
//! cleanly but to a different size than the caller declared is
//! [`FormatError`].

use std::io::Write;

use byteorder::{ByteOrder, LittleEndian};
use enum_utils::FromStr;
use flate2::{Decompress, FlushDecompress, Status};

use crate::CodecResult;
use crate::CodecError::*;
use crate::OffsetData;
use crate::ExtendExt;
use crate::try_alloc;
use crate::macros;


/// Size of the scratch block the inflate loop decodes into before appending
/// it to the output.
const INFLATE_CHUNK: usize = 64 * 1024;

/// Largest expansion an LZ4 block can encode per input byte.
const LZ4_MAX_RATIO: usize = 255;

/// Upper bound on FastLZ expansion per input byte.  A level 2 long match
/// adds 255 bytes of output per length byte; a level 1 long match is 264
/// bytes from 3.
const FASTLZ_MAX_RATIO: usize = 256;


/// Compress `input` as a zlib stream.
///
/// # Errors
/// - [`AllocationFailure`]: The output could not be allocated.
///
/// # Example
/// ```
/// # use frame_codec::{zlib_deflate, zlib_inflate};
/// let data = b"abababababababababababab".repeat(16);
/// let compressed = zlib_deflate(&data).unwrap();
/// assert!(compressed.len() < data.len());
/// assert_eq!(zlib_inflate(&compressed).unwrap(), data);
/// ```
pub fn zlib_deflate(input: &[u8]) -> CodecResult<Vec<u8>> {
	if input.is_empty() {
		return Ok(vec![]);
	};

	let mut encoder = flate2::write::ZlibEncoder::new(Vec::with_capacity(input.len() / 2), flate2::Compression::default());
	encoder.write_all(input).map_err(|_| AllocationFailure(input.len()))?;
	let output = encoder.finish().map_err(|_| AllocationFailure(input.len()))?;

	macros::log!(trace, "zlib_deflate: {} -> {} bytes", input.len(), output.len());

	Ok(output)
}


/// Decompress a complete zlib stream.  The adler32 trailer is verified.
/// Bytes following the end of the stream are ignored.
///
/// # Errors
/// - [`CorruptData`]: The stream is invalid, truncated, or fails its
///   checksum.
/// - [`AllocationFailure`]: The output could not grow.
pub fn zlib_inflate(input: &[u8]) -> CodecResult<Vec<u8>> {
	if input.is_empty() {
		return Ok(vec![]);
	};

	let mut output = OffsetData::with_vec(Vec::with_capacity(input.len().saturating_mul(2)));
	let mut decoder = Decompress::new(true);
	let mut chunk = vec![0u8; INFLATE_CHUNK];

	loop {
		let consumed = usize::try_from(decoder.total_in()).map_err(|_| CorruptData("zlib stream position overflows a usize"))?;
		let produced_before = decoder.total_out();
		let remaining = input.get(consumed..).ok_or(CorruptData("zlib decoder consumed past the end of input"))?;

		let status = decoder
			.decompress(remaining, &mut chunk, FlushDecompress::None)
			.map_err(|_| CorruptData("invalid zlib stream"))?;

		#[allow(clippy::cast_possible_truncation)]
		let produced = (decoder.total_out() - produced_before) as usize;

		if produced > 0 {
			output.append_patch(&chunk[..produced])?;
		};

		let made_progress = produced > 0 || decoder.total_in() as usize != consumed;

		match status {
			Status::StreamEnd => break,
			Status::Ok if made_progress => continue,
			Status::Ok | Status::BufError => return Err(CorruptData("truncated zlib stream")),
		};
	};

	macros::log!(trace, "zlib_inflate: {} -> {} bytes", input.len(), output.len());

	Ok(output.into_vec())
}


/// Compress `input` as a raw FastLZ block.
///
/// # Errors
/// - [`AllocationFailure`]: The compressor could not produce its output.
pub fn fastlz_compress(input: &[u8]) -> CodecResult<Vec<u8>> {
	if input.is_empty() {
		return Ok(vec![]);
	};

	let mut state = fastlz_rs::CompressState::new();
	state
		.compress_to_vec(input, fastlz_rs::CompressionLevel::Default)
		.map_err(|_| AllocationFailure(input.len()))
}


/// Decompress a raw FastLZ block whose output is known to be at most
/// `expected_max_size` bytes.
///
/// The output buffer is sized to the smaller of `expected_max_size` and the
/// most the block could possibly expand to.
///
/// # Errors
/// - [`CorruptData`]: The block is invalid.
/// - [`FormatError`]: The block decodes to more than `expected_max_size`
///   bytes.
/// - [`AllocationFailure`]: The output buffer could not be allocated.
pub fn fastlz_decompress(input: &[u8], expected_max_size: usize) -> CodecResult<Vec<u8>> {
	use fastlz_rs::DecompressError;

	if input.is_empty() {
		return Ok(vec![]);
	};

	let mut output = try_alloc(expected_max_size.min(fastlz_max_output(input)))?;

	let written = fastlz_rs::decompress_to_buf(input, &mut output)
		.map_err(|e| match e {
			DecompressError::OutputTooSmall =>
				FormatError(format!("FastLZ block decodes to more than the expected {} bytes", expected_max_size)),
			_ => CorruptData("invalid FastLZ block"),
		})?;

	output.truncate(written);

	Ok(output)
}


/// [`fastlz_decompress`] for a block that must decode to exactly
/// `expected_size` bytes.
fn fastlz_decompress_exact(input: &[u8], expected_size: usize) -> CodecResult<Vec<u8>> {
	if expected_size > fastlz_max_output(input) {
		return Err(CorruptData("FastLZ block is too short for its declared size"));
	};

	let output = fastlz_decompress(input, expected_size)?;
	expect_len(output, expected_size, "FastLZ")
}


fn fastlz_max_output(input: &[u8]) -> usize {
	input.len().saturating_mul(FASTLZ_MAX_RATIO)
}


/// [`fastlz_compress`] prefixed with the uncompressed length as a
/// little-endian `u32`.
///
/// # Errors
/// - [`InvalidArgument`]: `input` is longer than [`u32::MAX`] bytes.
/// - [`AllocationFailure`]: The compressor could not produce its output.
pub fn fastlz_deflate(input: &[u8]) -> CodecResult<Vec<u8>> {
	size_prepended(input, fastlz_compress)
}


/// Inverse of [`fastlz_deflate`].
///
/// # Errors
/// - [`CorruptData`]: The length prefix is truncated, the block is invalid,
///   or the block is too short to expand to the prefixed length.
/// - [`FormatError`]: The block does not decode to the prefixed length.
pub fn fastlz_inflate(input: &[u8]) -> CodecResult<Vec<u8>> {
	let (size, payload) = match split_size_prefix(input)? {
		Some(parts) => parts,
		None => return Ok(vec![]),
	};

	fastlz_decompress_exact(payload, size)
}


/// Compress `input` as a raw LZ4 block.
///
/// # Errors
/// Infallible for inputs that fit in memory; returns a [`CodecResult`] for
/// symmetry with the other codecs.
pub fn lz4_compress(input: &[u8]) -> CodecResult<Vec<u8>> {
	if input.is_empty() {
		return Ok(vec![]);
	};

	Ok(lz4_flex::block::compress(input))
}


/// Decompress a raw LZ4 block that encodes exactly `expected_size` bytes.
///
/// # Errors
/// - [`CorruptData`]: The block is invalid, or cannot possibly expand to
///   `expected_size` bytes.
/// - [`FormatError`]: The block decodes to a different length.
pub fn lz4_decompress(input: &[u8], expected_size: usize) -> CodecResult<Vec<u8>> {
	use lz4_flex::block::DecompressError;

	if input.is_empty() {
		return expect_len(vec![], expected_size, "LZ4");
	};

	if expected_size > input.len().saturating_mul(LZ4_MAX_RATIO) {
		return Err(CorruptData("LZ4 block is too short for its declared size"));
	};

	let output = lz4_flex::block::decompress(input, expected_size)
		.map_err(|e| match e {
			DecompressError::OutputTooSmall { .. } =>
				FormatError(format!("LZ4 block decodes to more than the expected {} bytes", expected_size)),
			_ => CorruptData("invalid LZ4 block"),
		})?;

	expect_len(output, expected_size, "LZ4")
}


/// [`lz4_compress`] prefixed with the uncompressed length as a
/// little-endian `u32`.
///
/// # Errors
/// - [`InvalidArgument`]: `input` is longer than [`u32::MAX`] bytes.
pub fn lz4_deflate(input: &[u8]) -> CodecResult<Vec<u8>> {
	size_prepended(input, lz4_compress)
}


/// Inverse of [`lz4_deflate`].
///
/// # Errors
/// - [`CorruptData`]: The length prefix is truncated or the block is invalid.
/// - [`FormatError`]: The block does not decode to the prefixed length.
pub fn lz4_inflate(input: &[u8]) -> CodecResult<Vec<u8>> {
	match split_size_prefix(input)? {
		Some((size, payload)) => lz4_decompress(payload, size),
		None => Ok(vec![]),
	}
}


fn size_prepended(input: &[u8], compress: fn(&[u8]) -> CodecResult<Vec<u8>>) -> CodecResult<Vec<u8>> {
	if input.is_empty() {
		return Ok(vec![]);
	};

	let size = u32::try_from(input.len()).map_err(|_| InvalidArgument("input is longer than u32::MAX bytes"))?;
	let payload = compress(input)?;

	let mut output = Vec::with_capacity(payload.len() + 4);
	output.extend_with_uint::<LittleEndian, _, 4>(size);
	output.extend(payload);

	Ok(output)
}


fn split_size_prefix(input: &[u8]) -> CodecResult<Option<(usize, &[u8])>> {
	if input.is_empty() {
		return Ok(None);
	};

	if input.len() < 4 {
		return Err(CorruptData("truncated length prefix"));
	};

	let (prefix, payload) = input.split_at(4);
	let size = usize::try_from(LittleEndian::read_u32(prefix)).map_err(|_| AllocationFailure(usize::MAX))?;

	Ok(Some((size, payload)))
}


fn expect_len(output: Vec<u8>, expected: usize, codec: &str) -> CodecResult<Vec<u8>> {
	if output.len() != expected {
		return Err(FormatError(format!("{} stream decodes to {} bytes, expected {}", codec, output.len(), expected)));
	};

	Ok(output)
}


/// The general purpose compressor applied to a byte stream
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, FromStr)]
#[cfg_attr(feature = "arbitrary", derive(arbitrary::Arbitrary))]
#[enumeration(case_insensitive)]
pub enum StreamCodec {
	/// Data is stored as-is.
	Stored,
	/// zlib (deflate with zlib header and adler32 trailer).
	Zlib,
	/// Raw FastLZ block.
	FastLz,
	/// Raw LZ4 block.
	Lz4,
}


impl StreamCodec {
	/// All codecs, in CCZ id order.
	pub const ALL: [StreamCodec; 4] = [StreamCodec::Zlib, StreamCodec::FastLz, StreamCodec::Lz4, StreamCodec::Stored];


	/// # Errors
	/// See [`zlib_deflate`], [`fastlz_compress`] and [`lz4_compress`].
	pub fn compress_slice(self, input: &[u8]) -> CodecResult<Vec<u8>> {
		use StreamCodec::*;

		match self {
			Stored => Ok(input.to_vec()),
			Zlib => zlib_deflate(input),
			FastLz => fastlz_compress(input),
			Lz4 => lz4_compress(input),
		}
	}


	/// Decompress `input`, which must expand to exactly `dst_len` bytes.
	///
	/// # Errors
	/// - [`CorruptData`]: `input` is not a valid stream for this codec.
	/// - [`FormatError`]: `input` decodes to a length other than `dst_len`.
	pub fn decompress_slice(self, input: &[u8], dst_len: usize) -> CodecResult<Vec<u8>> {
		use StreamCodec::*;

		let output = match self {
			Stored => input.to_vec(),
			Zlib => zlib_inflate(input)?,
			FastLz => fastlz_decompress_exact(input, dst_len)?,
			Lz4 => lz4_decompress(input, dst_len)?,
		};

		expect_len(output, dst_len, self.name())
	}


	/// The codec identifier stored in a CCZ header.
	pub const fn ccz_id(self) -> u16 {
		use StreamCodec::*;

		match self {
			Zlib => 0,
			FastLz => 1,
			Lz4 => 2,
			Stored => 3,
		}
	}


	/// Look up a codec by its CCZ header identifier.
	pub fn from_ccz_id(id: u16) -> Option<Self> {
		Self::ALL.into_iter().find(|c| c.ccz_id() == id)
	}


	/// Human-readable codec name.
	pub const fn name(self) -> &'static str {
		use StreamCodec::*;

		match self {
			Stored => "stored",
			Zlib => "zlib",
			FastLz => "FastLZ",
			Lz4 => "LZ4",
		}
	}
}


#[cfg(test)]
fn sample_payload() -> Vec<u8> {
	let mut data = b"FrameCleaner frame ".repeat(40);
	data.extend((0u16..700).map(|i| (i * 7 % 251) as u8));
	data.extend([0u8; 300]);
	data
}


#[test]
fn empty_input() {
	assert!(zlib_deflate(&[]).unwrap().is_empty());
	assert!(zlib_inflate(&[]).unwrap().is_empty());
	assert!(fastlz_compress(&[]).unwrap().is_empty());
	assert!(fastlz_decompress(&[], 10).unwrap().is_empty());
	assert!(lz4_compress(&[]).unwrap().is_empty());
	assert!(lz4_decompress(&[], 0).unwrap().is_empty());
	assert!(lz4_deflate(&[]).unwrap().is_empty());
	assert!(lz4_inflate(&[]).unwrap().is_empty());
}


#[test]
fn zlib_roundtrip() {
	let data = sample_payload();
	let compressed = zlib_deflate(&data).unwrap();
	assert_eq!(&compressed[..1], &[0x78]);
	assert_eq!(zlib_inflate(&compressed).unwrap(), data);
}


#[test]
fn zlib_large_output_spans_chunks() {
	let data: Vec<u8> = (0..(INFLATE_CHUNK * 3 + 17)).map(|i| (i % 13) as u8).collect();
	assert_eq!(zlib_inflate(&zlib_deflate(&data).unwrap()).unwrap(), data);
}


#[test]
fn zlib_corrupt() {
	let data = sample_payload();
	let compressed = zlib_deflate(&data).unwrap();

	let truncated = &compressed[..compressed.len() / 2];
	assert!(matches!(zlib_inflate(truncated), Err(CorruptData(_))));

	let mut bad_checksum = compressed.clone();
	let last = bad_checksum.len() - 1;
	bad_checksum[last] ^= 0xFF;
	assert!(matches!(zlib_inflate(&bad_checksum), Err(CorruptData(_))));

	assert!(matches!(zlib_inflate(b"not a zlib stream"), Err(CorruptData(_))));
}


#[test]
fn fastlz_roundtrip() {
	let data = sample_payload();
	let compressed = fastlz_compress(&data).unwrap();
	assert!(compressed.len() < data.len());
	assert_eq!(fastlz_decompress(&compressed, data.len()).unwrap(), data);
	assert_eq!(fastlz_inflate(&fastlz_deflate(&data).unwrap()).unwrap(), data);
}


#[test]
fn fastlz_limit() {
	let data = sample_payload();
	let compressed = fastlz_compress(&data).unwrap();
	assert!(fastlz_decompress(&compressed, data.len() - 1).is_err());
}


#[test]
fn fastlz_oversized_declaration() {
	assert!(matches!(fastlz_inflate(&[0xFF, 0xFF, 0xFF, 0xFF, 0x00]), Err(CorruptData(_))));
	assert!(matches!(StreamCodec::FastLz.decompress_slice(&[0x00], usize::MAX), Err(CorruptData(_))));
	assert_eq!(fastlz_decompress(&[0x00, b'x'], usize::MAX).unwrap(), b"x");

	let data = sample_payload();
	let compressed = fastlz_compress(&data).unwrap();
	let mut framed = fastlz_deflate(&data).unwrap();
	LittleEndian::write_u32(&mut framed[..4], (compressed.len() * FASTLZ_MAX_RATIO) as u32);
	assert!(matches!(fastlz_inflate(&framed), Err(FormatError(_))));
}


#[test]
fn oversized_declarations_on_prefixed_paths() {
	let huge = [0xFF, 0xFF, 0xFF, 0xFF];
	let data = sample_payload();

	let paths: [(&str, Vec<u8>, fn(&[u8]) -> CodecResult<Vec<u8>>); 2] = [
		("fastlz", fastlz_deflate(&data).unwrap(), fastlz_inflate),
		("lz4", lz4_deflate(&data).unwrap(), lz4_inflate),
	];

	for (name, framed, inflate) in paths {
		let mut lying = framed;
		lying[..4].copy_from_slice(&huge);
		assert!(matches!(inflate(&lying), Err(CorruptData(_) | FormatError(_) | AllocationFailure(_))), "{}", name);
		assert!(matches!(inflate(&[huge.as_slice(), &[0x00]].concat()), Err(CorruptData(_))), "{}", name);
	};

	for codec in StreamCodec::ALL {
		let compressed = codec.compress_slice(&data).unwrap();
		assert!(matches!(codec.decompress_slice(&compressed, u32::MAX as usize), Err(CorruptData(_) | FormatError(_) | AllocationFailure(_))), "{:?}", codec);
	};
}


#[test]
fn lz4_roundtrip() {
	let data = sample_payload();
	let compressed = lz4_compress(&data).unwrap();
	assert!(compressed.len() < data.len());
	assert_eq!(lz4_decompress(&compressed, data.len()).unwrap(), data);

	let framed = lz4_deflate(&data).unwrap();
	assert_eq!(LittleEndian::read_u32(&framed[..4]) as usize, data.len());
	assert_eq!(lz4_inflate(&framed).unwrap(), data);
}


#[test]
fn lz4_size_mismatch() {
	let data = sample_payload();
	let compressed = lz4_compress(&data).unwrap();
	assert!(matches!(lz4_decompress(&compressed, data.len() + 5), Err(FormatError(_))));
	assert!(matches!(lz4_decompress(&compressed, data.len() - 5), Err(FormatError(_))));
	assert!(matches!(lz4_decompress(&[0x10], 1_000_000), Err(CorruptData(_))));
	assert!(matches!(lz4_inflate(&[1, 2]), Err(CorruptData(_))));
}


#[test]
fn stream_codec_dispatch() {
	let data = sample_payload();

	for codec in StreamCodec::ALL {
		let compressed = codec.compress_slice(&data).unwrap();
		assert_eq!(codec.decompress_slice(&compressed, data.len()).unwrap(), data, "{:?}", codec);
		assert_eq!(StreamCodec::from_ccz_id(codec.ccz_id()), Some(codec));
	};

	assert_eq!(StreamCodec::from_ccz_id(9), None);
	assert_eq!("lz4".parse::<StreamCodec>(), Ok(StreamCodec::Lz4));
	assert_eq!("FASTLZ".parse::<StreamCodec>(), Ok(StreamCodec::FastLz));
	assert!(matches!(StreamCodec::Stored.decompress_slice(&data, 3), Err(FormatError(_))));
}
