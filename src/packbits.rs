//! PackBits byte run-length coding, plain and channel-planar RGBA.

use std::ops::Range;

use byteorder::{ByteOrder, LittleEndian};

use crate::{CodecResult, RunLengthScheme, Packet, rle_pack, rle_unpack};
use crate::CodecError::*;
use crate::ExtendExt;
use crate::macros;


/// Classic PackBits: one-byte units and a signed header byte
///
/// | header `n` (as `i8`) | packet                                   |
/// |----------------------|------------------------------------------|
/// | `0..=127`            | copy the next `n + 1` bytes              |
/// | `-127..=-1`          | repeat the next byte `1 - n` times       |
/// | `-128`               | no-op                                    |
#[derive(Debug, Clone, Copy, Default)]
pub struct PackBits;


#[allow(clippy::cast_possible_truncation, clippy::cast_possible_wrap, clippy::cast_sign_loss)]
impl RunLengthScheme for PackBits {
	const UNIT_SIZE: usize = 1;
	const MAX_LITERAL: usize = 128;
	const MAX_RUN: usize = 128;
	const MIN_RUN: usize = 3;

	fn literal_header(count: usize) -> u8 {
		(count - 1) as u8
	}


	fn run_header(count: usize) -> u8 {
		(1 - count as i16) as i8 as u8
	}


	fn parse_header(header: u8) -> Packet {
		match header as i8 {
			-128 => Packet::Noop,
			n @ 0..=127 => Packet::Literal(n as usize + 1),
			n => Packet::Run((1 - i16::from(n)) as usize),
		}
	}
}


/// Decode a PackBits stream.
///
/// # Errors
/// - [`CorruptData`]: A packet reads past the end of `input`.
/// - [`AllocationFailure`]: The output could not grow.
///
/// # Example
/// ```
/// # use frame_codec::unpack_bits;
/// let packed = [0xFE, 0xAA, 0x02, 0x80, 0x00, 0x2A, 0x80];
/// assert_eq!(unpack_bits(&packed).unwrap(), [0xAA, 0xAA, 0xAA, 0x80, 0x00, 0x2A]);
/// ```
pub fn unpack_bits(input: &[u8]) -> CodecResult<Vec<u8>> {
	let mut output = Vec::new();
	rle_unpack::<PackBits>(input, &mut output, None)?;

	macros::log!(trace, "unpack_bits: {} -> {} bytes", input.len(), output.len());

	Ok(output)
}


/// Encode `input` as a PackBits stream.
///
/// # Errors
/// - [`AllocationFailure`]: The output could not be allocated.
///
/// # Example
/// ```
/// # use frame_codec::{pack_bits, unpack_bits};
/// let run = [0x42; 300];
/// let packed = pack_bits(&run).unwrap();
/// assert!(packed.len() < 300);
/// assert_eq!(unpack_bits(&packed).unwrap(), run);
/// ```
pub fn pack_bits(input: &[u8]) -> CodecResult<Vec<u8>> {
	let mut output = Vec::new();
	rle_pack::<PackBits>(input, &mut output)?;

	macros::log!(trace, "pack_bits: {} -> {} bytes", input.len(), output.len());

	Ok(output)
}


/// Encode every `skip`-th byte of `input[range]`, starting at `range.start`,
/// as one PackBits stream.  A `skip` of 4 over an RGBA buffer packs a single
/// channel.
///
/// # Errors
/// - [`InvalidArgument`]: `skip` is zero.
/// - [`OutOfRange`]: `range` is not within `input`.
/// - [`AllocationFailure`]: The output could not be allocated.
pub fn pack_bits_range(input: &[u8], range: Range<usize>, skip: usize) -> CodecResult<Vec<u8>> {
	if skip == 0 {
		return Err(InvalidArgument("PackBits skip stride must be at least 1"));
	};

	let selected = input.get(range.clone())
		.ok_or(OutOfRange { start: range.start, end: range.end, len: input.len() })?;

	if skip == 1 {
		return pack_bits(selected);
	};

	let strided: Vec<u8> = selected.iter().step_by(skip).copied().collect();
	pack_bits(&strided)
}


/// Pack an RGBA buffer one channel at a time.  The output holds, for each of
/// R, G, B and A, the packed channel length as a little-endian `u32`
/// followed by the packed channel.
///
/// # Errors
/// - [`InvalidArgument`]: `input` is not a whole number of pixels, or a
///   packed channel is longer than [`u32::MAX`] bytes.
/// - [`AllocationFailure`]: The output could not be allocated.
///
/// # Example
/// ```
/// # use frame_codec::{pack_image_rgba, unpack_image_rgba};
/// let red = [0xFFu8, 0x00, 0x00, 0xFF].repeat(16);
/// let packed = pack_image_rgba(&red).unwrap();
/// assert_eq!(unpack_image_rgba(&packed).unwrap(), red);
/// ```
pub fn pack_image_rgba(input: &[u8]) -> CodecResult<Vec<u8>> {
	if input.len() % 4 != 0 {
		return Err(InvalidArgument("RGBA buffer length is not a multiple of 4"));
	};

	if input.is_empty() {
		return Ok(vec![]);
	};

	let mut output = Vec::new();

	for channel in 0..4 {
		let packed = pack_bits_range(input, channel..input.len(), 4)?;
		let packed_len = u32::try_from(packed.len()).map_err(|_| InvalidArgument("packed channel is longer than u32::MAX bytes"))?;

		output.try_reserve(packed.len() + 4).map_err(|_| AllocationFailure(output.len().saturating_add(packed.len())))?;
		output.extend_with_uint::<LittleEndian, _, 4>(packed_len);
		output.extend(packed);
	};

	macros::log!(debug, "pack_image_rgba: {} pixels, {} -> {} bytes", input.len() / 4, input.len(), output.len());

	Ok(output)
}


/// Inverse of [`pack_image_rgba`].
///
/// # Errors
/// - [`CorruptData`]: A channel is missing, truncated or fails to decode,
///   the channels decode to different lengths, or bytes trail the alpha
///   channel.
/// - [`AllocationFailure`]: The output could not be allocated.
pub fn unpack_image_rgba(input: &[u8]) -> CodecResult<Vec<u8>> {
	if input.is_empty() {
		return Ok(vec![]);
	};

	let mut rest = input;
	let mut channels: Vec<Vec<u8>> = Vec::with_capacity(4);

	for _ in 0..4 {
		if rest.len() < 4 {
			return Err(CorruptData("RGBA stream is missing a channel"));
		};

		let (prefix, tail) = rest.split_at(4);
		let len = usize::try_from(LittleEndian::read_u32(prefix)).map_err(|_| CorruptData("channel length overflows a usize"))?;
		let packed = tail.get(..len).ok_or(CorruptData("RGBA channel is truncated"))?;
		channels.push(unpack_bits(packed)?);
		rest = &tail[len..];
	};

	if !rest.is_empty() {
		return Err(CorruptData("trailing bytes after the alpha channel"));
	};

	let pixel_count = channels[0].len();

	if channels.iter().any(|c| c.len() != pixel_count) {
		return Err(CorruptData("RGBA channels decode to different lengths"));
	};

	let output_len = pixel_count.checked_mul(4).ok_or(AllocationFailure(usize::MAX))?;
	let mut output = crate::try_with_capacity(output_len)?;

	for i in 0..pixel_count {
		output.extend(channels.iter().map(|c| c[i]));
	};

	Ok(output)
}


#[test]
fn header_encoding() {
	assert_eq!(PackBits::literal_header(1), 0x00);
	assert_eq!(PackBits::literal_header(128), 0x7F);
	assert_eq!(PackBits::run_header(3), 0xFE);
	assert_eq!(PackBits::run_header(128), 0x81);

	assert_eq!(PackBits::parse_header(0x00), Packet::Literal(1));
	assert_eq!(PackBits::parse_header(0x7F), Packet::Literal(128));
	assert_eq!(PackBits::parse_header(0xFF), Packet::Run(2));
	assert_eq!(PackBits::parse_header(0x81), Packet::Run(128));
	assert_eq!(PackBits::parse_header(0x80), Packet::Noop);
}


#[test]
fn long_run() {
	let run = vec![0x11u8; 300];
	let packed = pack_bits(&run).unwrap();
	assert_eq!(packed, vec![0x81, 0x11, 0x81, 0x11, 0xD5, 0x11]);
	assert_eq!(unpack_bits(&packed).unwrap(), run);
}


#[test]
fn short_runs_stay_literal() {
	let data = [1, 1, 2, 3, 3, 3, 4];
	let packed = pack_bits(&data).unwrap();
	assert_eq!(packed, vec![0x02, 1, 1, 2, 0xFE, 3, 0x00, 4]);
	assert_eq!(unpack_bits(&packed).unwrap(), data);
}


#[test]
fn long_literal() {
	let data: Vec<u8> = (0..=255).chain(0..=43).collect();
	let packed = pack_bits(&data).unwrap();
	assert_eq!(packed.len(), data.len() + 3);
	assert_eq!(packed[0], 0x7F);
	assert_eq!(packed[129], 0x7F);
	assert_eq!(packed[258], 43);
	assert_eq!(unpack_bits(&packed).unwrap(), data);
}


#[test]
fn empty_and_noop() {
	assert!(pack_bits(&[]).unwrap().is_empty());
	assert!(unpack_bits(&[]).unwrap().is_empty());
	assert!(unpack_bits(&[0x80, 0x80]).unwrap().is_empty());
	assert_eq!(unpack_bits(&[0x80, 0x00, 0x07, 0x80]).unwrap(), vec![0x07]);
}


#[test]
fn truncated() {
	assert!(matches!(unpack_bits(&[0x02, 1, 2]), Err(CorruptData(_))));
	assert!(matches!(unpack_bits(&[0xFD]), Err(CorruptData(_))));
	assert!(matches!(unpack_bits(&[0x00, 9, 0x05]), Err(CorruptData(_))));
}


#[test]
fn strided_range() {
	let rgba = [1, 2, 3, 4, 1, 5, 6, 7, 1, 8, 9, 10, 9, 11, 12, 13];
	assert_eq!(pack_bits_range(&rgba, 0..16, 4).unwrap(), vec![0xFE, 1, 0x00, 9]);
	assert_eq!(pack_bits_range(&rgba, 3..16, 4).unwrap(), vec![0x03, 4, 7, 10, 13]);
	assert_eq!(pack_bits_range(&rgba, 4..8, 1).unwrap(), vec![0x03, 1, 5, 6, 7]);
	assert!(matches!(pack_bits_range(&rgba, 0..16, 0), Err(InvalidArgument(_))));
	assert_eq!(pack_bits_range(&rgba, 8..20, 4), Err(OutOfRange { start: 8, end: 20, len: 16 }));
}


#[test]
fn rgba_all_red() {
	let red = [0xFFu8, 0x00, 0x00, 0xFF].repeat(16);
	let packed = pack_image_rgba(&red).unwrap();
	assert_eq!(packed, vec![
		2, 0, 0, 0, 0xF1, 0xFF,
		2, 0, 0, 0, 0xF1, 0x00,
		2, 0, 0, 0, 0xF1, 0x00,
		2, 0, 0, 0, 0xF1, 0xFF,
	]);
	assert_eq!(unpack_image_rgba(&packed).unwrap(), red);
}


#[test]
fn rgba_gradient() {
	let image: Vec<u8> = (0..64u8).flat_map(|i| [i, i / 8, 0x80, 0xFF]).collect();
	assert_eq!(unpack_image_rgba(&pack_image_rgba(&image).unwrap()).unwrap(), image);
}


#[test]
fn rgba_errors() {
	assert!(matches!(pack_image_rgba(&[1, 2, 3]), Err(InvalidArgument(_))));
	assert!(pack_image_rgba(&[]).unwrap().is_empty());
	assert!(unpack_image_rgba(&[]).unwrap().is_empty());

	let packed = pack_image_rgba(&[1, 2, 3, 4, 5, 6, 7, 8]).unwrap();
	assert!(matches!(unpack_image_rgba(&packed[..packed.len() - 1]), Err(CorruptData(_))));
	assert!(matches!(unpack_image_rgba(&packed[..6]), Err(CorruptData(_))));

	let mut trailing = packed.clone();
	trailing.push(0);
	assert!(matches!(unpack_image_rgba(&trailing), Err(CorruptData(_))));

	let uneven = [
		2, 0, 0, 0, 0xFF, 1,
		2, 0, 0, 0, 0xFF, 2,
		2, 0, 0, 0, 0xFF, 3,
		2, 0, 0, 0, 0xFE, 4,
	];
	assert!(matches!(unpack_image_rgba(&uneven), Err(CorruptData(_))));
}
