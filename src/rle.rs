//! Run-length coding shared by [`PackBits`][crate::PackBits] and
//! [`TargaRle`][crate::TargaRle].
//!
//! Both formats interleave one-byte packet headers with data units.  A header
//! announces either a run of literal units copied verbatim, or a single unit
//! repeated a number of times.  They differ in the size of a unit and in how
//! the header byte encodes the packet kind and count, which is what a
//! [`RunLengthScheme`] describes.

use crate::CodecResult;
use crate::CodecError::*;


/// A decoded packet header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Packet {
	/// The next `n` units are copied verbatim.
	Literal(usize),
	/// The next unit is repeated `n` times.
	Run(usize),
	/// The header carries no data and is skipped.
	Noop,
}


/// Header layout of one run-length format
pub trait RunLengthScheme {
	/// Bytes per data unit.
	const UNIT_SIZE: usize;
	/// Longest literal packet the header can express, in units.
	const MAX_LITERAL: usize;
	/// Longest run packet the header can express, in units.
	const MAX_RUN: usize;
	/// Shortest run of identical units the encoder emits as a run packet.
	const MIN_RUN: usize;

	/// Header for a literal packet of `count` units, `1..=MAX_LITERAL`.
	fn literal_header(count: usize) -> u8;
	/// Header for a run packet of `count` units, `MIN_RUN..=MAX_RUN`.
	fn run_header(count: usize) -> u8;
	/// Interpret a header byte.
	fn parse_header(header: u8) -> Packet;
}


/// Greedily encode `data`, a whole number of units, appending packets to
/// `out`.  Runs of at least [`MIN_RUN`][RunLengthScheme::MIN_RUN] identical
/// units become run packets, everything else is grouped into literal packets.
///
/// # Errors
/// - [`InvalidArgument`]: `data` is not a whole number of units.
/// - [`AllocationFailure`]: `out` could not grow.
pub fn rle_pack<S: RunLengthScheme>(data: &[u8], out: &mut Vec<u8>) -> CodecResult<()> {
	if data.len() % S::UNIT_SIZE != 0 {
		return Err(InvalidArgument("run-length input is not a whole number of units"));
	};

	let units: Vec<&[u8]> = data.chunks_exact(S::UNIT_SIZE).collect();
	let mut literal_start = 0;
	let mut i = 0;

	// Worst case is one header per MAX_LITERAL units.
	let bound = data.len() + units.len() / S::MAX_LITERAL + 1;
	out.try_reserve(bound).map_err(|_| AllocationFailure(out.len().saturating_add(bound)))?;

	while i < units.len() {
		let run = units[i..]
			.iter()
			.take(S::MAX_RUN)
			.take_while(|u| **u == units[i])
			.count();

		if run >= S::MIN_RUN {
			emit_literals::<S>(&units[literal_start..i], out);
			out.push(S::run_header(run));
			out.extend_from_slice(units[i]);
			i += run;
			literal_start = i;
		} else {
			i += run;
		};
	};

	emit_literals::<S>(&units[literal_start..], out);

	Ok(())
}


fn emit_literals<S: RunLengthScheme>(units: &[&[u8]], out: &mut Vec<u8>) {
	for packet in units.chunks(S::MAX_LITERAL) {
		out.push(S::literal_header(packet.len()));
		packet.iter().for_each(|u| out.extend_from_slice(u));
	};
}


/// Decode packets from `input`, appending units to `out`.
///
/// With a `limit`, decoding stops once `out` has grown by `limit` bytes and
/// any further input is ignored; a packet that would cross the limit is an
/// error.  Returns the number of input bytes consumed.
///
/// # Errors
/// - [`CorruptData`]: A packet reads past the end of `input` or crosses
///   `limit`.
/// - [`AllocationFailure`]: `out` could not grow.
pub fn rle_unpack<S: RunLengthScheme>(input: &[u8], out: &mut Vec<u8>, limit: Option<usize>) -> CodecResult<usize> {
	let start_len = out.len();
	let mut pos = 0;

	while pos < input.len() {
		let produced = out.len() - start_len;

		if limit.map_or(false, |l| produced >= l) {
			break;
		};

		let header = input[pos];
		pos += 1;

		let (count, repeat) = match S::parse_header(header) {
			Packet::Noop => continue,
			Packet::Literal(n) => (n, false),
			Packet::Run(n) => (n, true),
		};

		let payload_len = if repeat { S::UNIT_SIZE } else { count * S::UNIT_SIZE };
		let payload = input.get(pos..pos + payload_len)
			.ok_or(CorruptData("run-length packet reads past the end of input"))?;
		pos += payload_len;

		let decoded_len = count * S::UNIT_SIZE;

		if limit.map_or(false, |l| produced + decoded_len > l) {
			return Err(CorruptData("run-length packet overruns the expected output size"));
		};

		out.try_reserve(decoded_len).map_err(|_| AllocationFailure(out.len().saturating_add(decoded_len)))?;

		if repeat {
			(0..count).for_each(|_| out.extend_from_slice(payload));
		} else {
			out.extend_from_slice(payload);
		};
	};

	Ok(pos)
}


#[cfg(test)]
struct PairScheme;


#[cfg(test)]
impl RunLengthScheme for PairScheme {
	const UNIT_SIZE: usize = 2;
	const MAX_LITERAL: usize = 4;
	const MAX_RUN: usize = 4;
	const MIN_RUN: usize = 2;

	#[allow(clippy::cast_possible_truncation)]
	fn literal_header(count: usize) -> u8 { count as u8 }

	#[allow(clippy::cast_possible_truncation)]
	fn run_header(count: usize) -> u8 { 0x10 | count as u8 }

	fn parse_header(header: u8) -> Packet {
		match header {
			0 => Packet::Noop,
			h if h & 0x10 != 0 => Packet::Run(usize::from(h & 0x0F)),
			h => Packet::Literal(usize::from(h)),
		}
	}
}


#[test]
fn packet_splitting() {
	let data = [1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 2, 2, 3, 3, 4, 4, 5, 5, 6, 6, 7, 7];
	let mut packed = vec![];
	rle_pack::<PairScheme>(&data, &mut packed).unwrap();

	assert_eq!(packed, vec![
		0x14, 1, 1,
		0x04, 1, 1, 2, 2, 3, 3, 4, 4,
		0x03, 5, 5, 6, 6, 7, 7,
	]);

	let mut unpacked = vec![];
	assert_eq!(rle_unpack::<PairScheme>(&packed, &mut unpacked, None).unwrap(), packed.len());
	assert_eq!(unpacked, data);
}


#[test]
fn partial_units() {
	assert!(matches!(rle_pack::<PairScheme>(&[1, 2, 3], &mut vec![]), Err(InvalidArgument(_))));
}


#[test]
fn truncated_packets() {
	let mut out = vec![];
	assert!(matches!(rle_unpack::<PairScheme>(&[0x12, 9], &mut out, None), Err(CorruptData(_))));
	assert!(matches!(rle_unpack::<PairScheme>(&[0x02, 1, 2, 3], &mut out, None), Err(CorruptData(_))));
	assert!(matches!(rle_unpack::<PairScheme>(&[0x01], &mut out, None), Err(CorruptData(_))));
}


#[test]
fn unpack_limit() {
	let packed = [0x00, 0x12, 8, 9, 0x01, 5, 5, 0xEE, 0xEE];

	let mut out = vec![0xAA];
	assert_eq!(rle_unpack::<PairScheme>(&packed, &mut out, Some(6)).unwrap(), 7);
	assert_eq!(out, vec![0xAA, 8, 9, 8, 9, 5, 5]);

	assert!(matches!(rle_unpack::<PairScheme>(&packed, &mut vec![], Some(4)), Ok(4)));
	assert!(matches!(rle_unpack::<PairScheme>(&packed, &mut vec![], Some(3)), Err(CorruptData(_))));
}
