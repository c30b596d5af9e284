#![warn(missing_docs, unreachable_pub, clippy::all)]
#![allow(clippy::wildcard_imports, clippy::enum_glob_use)]
#![warn(clippy::missing_errors_doc, clippy::missing_panics_doc)]
#![allow(clippy::must_use_candidate)]


#![doc = include_str!("../README.md")]


mod macros;
mod offset_data;
mod stream;
mod ccz;
mod rle;
mod packbits;
mod targa;
mod pvr;
mod progress;
mod ext;

pub use offset_data::*;
pub use stream::*;
pub use ccz::*;
pub use rle::*;
pub use packbits::*;
pub use targa::*;
pub use pvr::*;
pub use progress::*;
pub use ext::*;


use std::iter::Extend;

use byteorder::ByteOrder;
use derive_more::{Display, Error};
#[cfg(test)] use static_assertions::assert_impl_all;

use CodecError::*;

/// [`std::result::Result`] parameterized with [`CodecError`]
pub type CodecResult<T> = Result<T, CodecError>;


/// `frame_codec`'s [`std::error::Error`]
///
/// Every codec operation either returns its complete output or one of these;
/// no operation hands back partial output on a failure path.
#[derive(Debug, Display, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum CodecError {
	/// Caller misuse: a missing or undersized source, a zero stride,
	/// dimensions that disagree with the data length.
	#[display(fmt = "Invalid argument: {}", _0)]
	InvalidArgument(#[error(ignore)] &'static str),

	/// A window or range reaches past the end of its buffer.
	#[display(fmt = "Range {}..{} is out of bounds for a buffer of length {}", start, end, len)]
	OutOfRange {
		/// First byte of the requested range.
		start: usize,
		/// One past the last byte of the requested range.
		end: usize,
		/// Length of the buffer the range was checked against.
		len: usize,
	},

	/// Protocol violation on a stateful object, e.g. committing a
	/// replacement that was never begun.
	#[display(fmt = "Invalid state: {}", _0)]
	InvalidState(#[error(ignore)] &'static str),

	/// A compressed or encoded stream is structurally invalid (truncated
	/// packet, bad block, checksum mismatch).
	#[display(fmt = "Corrupt data: {}", _0)]
	CorruptData(#[error(ignore)] &'static str),

	/// Container framing is malformed or disagrees with its payload (bad
	/// header, unknown codec id, declared length mismatch).
	#[display(fmt = "Format error: {}", _0)]
	FormatError(#[error(ignore)] String),

	/// The input names a sub-format that is recognized but not implemented.
	#[display(fmt = "Unsupported format: {}", _0)]
	UnsupportedFormat(#[error(ignore)] String),

	/// Output of the given size in bytes could not be allocated, or its size
	/// overflows a [`usize`].
	#[display(fmt = "Could not allocate an output buffer of {} bytes", _0)]
	AllocationFailure(#[error(ignore)] usize),

	/// The caller's [`Stop`] probe requested cancellation.
	#[display(fmt = "Operation cancelled")]
	Cancelled,
}


/// Allocate a zero-filled `Vec<u8>` of `len` bytes, reporting exhaustion as
/// [`AllocationFailure`] instead of aborting.
pub(crate) fn try_alloc(len: usize) -> CodecResult<Vec<u8>> {
	let mut buf = try_with_capacity(len)?;
	buf.resize(len, 0);
	Ok(buf)
}


/// Empty `Vec<u8>` with room for exactly `capacity` bytes.
pub(crate) fn try_with_capacity(capacity: usize) -> CodecResult<Vec<u8>> {
	let mut buf: Vec<u8> = Vec::new();
	buf.try_reserve_exact(capacity).map_err(|_| AllocationFailure(capacity))?;
	Ok(buf)
}


trait ExtendExt: Extend<u8> {
	/// Convenience function which extends an [`std::iter::Extend<u8>`] with a
	/// [`byteorder::ByteOrder`]-encoded integer.
	fn extend_with_uint<B: ByteOrder, T: Into<u64>, const N: usize>(&mut self, v: T) {
		let mut buf = [0u8; N];
		B::write_uint(&mut buf[..], v.into(), N);
		self.extend(buf);
	}
}


impl<T> ExtendExt for T where T: Extend<u8> {}


#[test]
fn test_extend_with_uint() {
	use byteorder::{BigEndian, LittleEndian};

	let mut dest: Vec<u8> = vec![];

	dest.extend_with_uint::<LittleEndian, _, 2>(1234u16);
	assert_eq!(dest, vec![0xD2, 0x04]);

	dest.extend_with_uint::<LittleEndian, _, 4>(1234u32);
	assert_eq!(dest, vec![0xD2, 0x04, 0xD2, 0x04, 0x00, 0x00]);

	dest.extend_with_uint::<BigEndian, _, 4>(5678u32);
	assert_eq!(dest, vec![0xD2, 0x04, 0xD2, 0x04, 0x00, 0x00, 0x00, 0x00, 0x16, 0x2E]);
}


#[test]
fn test_try_alloc() {
	assert_eq!(try_alloc(3).unwrap(), vec![0u8; 3]);
	assert!(try_alloc(0).unwrap().is_empty());
	assert_eq!(try_alloc(usize::MAX).unwrap_err(), AllocationFailure(usize::MAX));
}


#[test]
fn assert_traits() {
	use std::fmt::{Debug, Display};
	use std::error::Error;
	use std::panic::{UnwindSafe, RefUnwindSafe};

	assert_impl_all!(CodecError: Debug, Display, Error, Clone, Send, Sync, UnwindSafe, RefUnwindSafe);
}
