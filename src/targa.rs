//! Targa run-length coding of 32-bit pixels, one packet run per scanline.

use crate::{CodecResult, RunLengthScheme, Packet, rle_pack, rle_unpack};
use crate::CodecError::*;
use crate::macros;


/// Targa (TGA image type 10) run-length packets over 32-bit pixels
///
/// The high bit of the header flags a run of `(header & 0x7F) + 1` copies of
/// the following pixel; with it clear, `header + 1` raw pixels follow.
/// Pixels are copied verbatim, so the channel order is the caller's.
#[derive(Debug, Clone, Copy, Default)]
pub struct TargaRle;


#[allow(clippy::cast_possible_truncation)]
impl RunLengthScheme for TargaRle {
	const UNIT_SIZE: usize = 4;
	const MAX_LITERAL: usize = 128;
	const MAX_RUN: usize = 128;
	const MIN_RUN: usize = 2;

	fn literal_header(count: usize) -> u8 {
		(count - 1) as u8
	}


	fn run_header(count: usize) -> u8 {
		0x80 | (count - 1) as u8
	}


	fn parse_header(header: u8) -> Packet {
		let count = usize::from(header & 0x7F) + 1;

		if header & 0x80 == 0 {
			Packet::Literal(count)
		} else {
			Packet::Run(count)
		}
	}
}


/// Run-length encode 32-bit pixels scanline by scanline; no packet crosses
/// the end of a row of `width` pixels.
///
/// # Errors
/// - [`InvalidArgument`]: `width` is zero, or `input` is not a whole number
///   of rows.
/// - [`AllocationFailure`]: The output could not be allocated.
///
/// # Example
/// ```
/// # use frame_codec::{pack_targa_rgba, unpack_targa_rgba};
/// let row = [[9, 9, 9, 255], [9, 9, 9, 255], [1, 2, 3, 4]].concat();
/// let packed = pack_targa_rgba(&row, 3).unwrap();
/// assert_eq!(packed, [0x81, 9, 9, 9, 255, 0x00, 1, 2, 3, 4]);
/// assert_eq!(unpack_targa_rgba(&packed).unwrap(), row);
/// ```
pub fn pack_targa_rgba(input: &[u8], width: usize) -> CodecResult<Vec<u8>> {
	if width == 0 {
		return Err(InvalidArgument("Targa scanline width must be at least 1"));
	};

	let stride = width.checked_mul(TargaRle::UNIT_SIZE).ok_or(InvalidArgument("Targa scanline width overflows"))?;

	if input.len() % stride != 0 {
		return Err(InvalidArgument("Targa input is not a whole number of scanlines"));
	};

	let mut output = Vec::new();

	for scanline in input.chunks_exact(stride) {
		rle_pack::<TargaRle>(scanline, &mut output)?;
	};

	macros::log!(trace, "pack_targa_rgba: {} rows of {} -> {} bytes", input.len() / stride, width, output.len());

	Ok(output)
}


/// Decode Targa run-length packets until the end of `input`.
///
/// # Errors
/// - [`CorruptData`]: A packet reads past the end of `input`.
/// - [`AllocationFailure`]: The output could not grow.
pub fn unpack_targa_rgba(input: &[u8]) -> CodecResult<Vec<u8>> {
	let mut output = Vec::new();
	rle_unpack::<TargaRle>(input, &mut output, None)?;
	Ok(output)
}


/// Decode exactly `pixel_count` pixels of Targa run-length packets.  Input
/// past the last packet needed is ignored, as a TGA file carries its footer
/// there.
///
/// # Errors
/// - [`CorruptData`]: A packet is truncated, crosses `pixel_count`, or the
///   input ends short of `pixel_count` pixels.
/// - [`AllocationFailure`]: The output could not be allocated.
pub fn unpack_targa_rgba_exact(input: &[u8], pixel_count: usize) -> CodecResult<Vec<u8>> {
	let expected = pixel_count.checked_mul(TargaRle::UNIT_SIZE).ok_or(AllocationFailure(usize::MAX))?;
	let mut output = crate::try_with_capacity(expected)?;
	rle_unpack::<TargaRle>(input, &mut output, Some(expected))?;

	if output.len() != expected {
		return Err(CorruptData("Targa stream ends before the expected pixel count"));
	};

	Ok(output)
}


#[cfg(test)]
fn pixels(values: &[u8]) -> Vec<u8> {
	values.iter().flat_map(|v| [*v, *v, *v, 0xFF]).collect()
}


#[test]
fn header_bits() {
	assert_eq!(TargaRle::literal_header(1), 0x00);
	assert_eq!(TargaRle::run_header(2), 0x81);
	assert_eq!(TargaRle::run_header(128), 0xFF);
	assert_eq!(TargaRle::parse_header(0x7F), Packet::Literal(128));
	assert_eq!(TargaRle::parse_header(0x80), Packet::Run(1));
}


#[test]
fn packets_stop_at_scanlines() {
	let image = pixels(&[5, 5, 5, 5, 5, 5]);

	let one_row = pack_targa_rgba(&image, 6).unwrap();
	assert_eq!(one_row, vec![0x85, 5, 5, 5, 0xFF]);

	let three_rows = pack_targa_rgba(&image, 2).unwrap();
	assert_eq!(three_rows, [0x81u8, 5, 5, 5, 0xFF].repeat(3));

	assert_eq!(unpack_targa_rgba(&one_row).unwrap(), image);
	assert_eq!(unpack_targa_rgba(&three_rows).unwrap(), image);
}


#[test]
fn mixed_packets() {
	let image = pixels(&[1, 2, 2, 3, 4, 4, 4, 5]);
	let packed = pack_targa_rgba(&image, 8).unwrap();

	let mut expected = vec![0x00];
	expected.extend(pixels(&[1]));
	expected.push(0x81);
	expected.extend(pixels(&[2]));
	expected.push(0x00);
	expected.extend(pixels(&[3]));
	expected.push(0x82);
	expected.extend(pixels(&[4]));
	expected.push(0x00);
	expected.extend(pixels(&[5]));

	assert_eq!(packed, expected);
	assert_eq!(unpack_targa_rgba(&packed).unwrap(), image);
}


#[test]
fn invalid_geometry() {
	assert!(matches!(pack_targa_rgba(&pixels(&[1, 2]), 0), Err(InvalidArgument(_))));
	assert!(matches!(pack_targa_rgba(&pixels(&[1, 2, 3]), 2), Err(InvalidArgument(_))));
	assert!(matches!(pack_targa_rgba(&[1, 2], 1), Err(InvalidArgument(_))));
	assert!(pack_targa_rgba(&[], 7).unwrap().is_empty());
	assert!(unpack_targa_rgba(&[]).unwrap().is_empty());
}


#[test]
fn exact_pixel_count() {
	let image = pixels(&[7, 7, 7, 8]);
	let mut packed = pack_targa_rgba(&image, 4).unwrap();
	packed.extend(b"TRUEVISION-XFILE.\0");

	assert_eq!(unpack_targa_rgba_exact(&packed, 4).unwrap(), image);
	assert!(matches!(unpack_targa_rgba_exact(&packed, 2), Err(CorruptData(_))));
	assert!(matches!(unpack_targa_rgba_exact(&packed[..5], 4), Err(CorruptData(_))));
	assert!(matches!(unpack_targa_rgba(&packed[..7]), Err(CorruptData(_))));
}
