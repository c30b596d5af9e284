use std::borrow::Cow;
use std::ops::Range;

use crate::CodecResult;
use crate::CodecError::*;
use crate::try_with_capacity;


/// Byte buffer with a single replaceable window
///
/// An [`OffsetData`] wraps either borrowed bytes (never freed by the buffer,
/// and guaranteed by the lifetime to outlive it) or an owned `Vec<u8>`.  A
/// caller opens a window with [`set_window`][Self::set_window], obtains a
/// scratch region of any size with
/// [`begin_replacement`][Self::begin_replacement], fills it, and splices it in
/// place of the window with [`commit_replacement`][Self::commit_replacement].
/// Borrowed bytes are copied on the first commit, and only the suffix behind
/// the window moves, so growing the tail repeatedly costs no prefix copies.
///
/// # Example
/// ```
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// # use frame_codec::OffsetData;
/// let source = b"hello world";
/// let mut buffer = OffsetData::with_bytes_no_copy(&source[..]);
/// buffer.set_window(6, 5)?;
/// buffer.begin_replacement(4)?.copy_from_slice(b"rust");
/// buffer.commit_replacement()?;
/// assert_eq!(buffer.data(), b"hello rust");
/// assert_eq!(&source[..], b"hello world");
/// # Ok(()) }
/// ```
#[derive(Debug, Clone)]
pub struct OffsetData<'a> {
	data: Cow<'a, [u8]>,
	window: Option<Range<usize>>,
	replacement: Option<Vec<u8>>,
}


impl<'a> OffsetData<'a> {
	/// Wrap the first `length` bytes of `bytes` without copying them.
	///
	/// # Errors
	/// - [`InvalidArgument`]: `bytes` is `None` while `length` is non-zero, or
	///   `length` exceeds `bytes.len()`.
	pub fn new(bytes: Option<&'a [u8]>, length: usize) -> CodecResult<Self> {
		let data = match bytes {
			None if length > 0 => return Err(InvalidArgument("OffsetData::new: no bytes given for a non-empty buffer")),
			None => &[][..],
			Some(b) => b.get(..length).ok_or(InvalidArgument("OffsetData::new: length exceeds the given bytes"))?,
		};

		Ok(Self::with_bytes_no_copy(data))
	}


	/// Wrap `bytes` without copying them.
	pub fn with_bytes_no_copy(bytes: &'a [u8]) -> Self {
		Self { data: Cow::Borrowed(bytes), window: None, replacement: None }
	}


	/// Take ownership of `bytes`.
	pub fn with_vec(bytes: Vec<u8>) -> OffsetData<'static> {
		OffsetData { data: Cow::Owned(bytes), window: None, replacement: None }
	}


	/// Current length of the whole buffer.
	pub fn len(&self) -> usize {
		self.data.len()
	}


	/// Returns `true` if the buffer holds no bytes.
	pub fn is_empty(&self) -> bool {
		self.data.is_empty()
	}


	/// Returns `true` once the buffer owns its storage, either because it was
	/// created from a `Vec` or because a commit copied borrowed bytes.
	pub fn owns_memory(&self) -> bool {
		matches!(self.data, Cow::Owned(_))
	}


	/// The whole current contents.
	pub fn bytes(&self) -> &[u8] {
		&self.data
	}


	/// The open window, if any.
	pub fn window(&self) -> Option<Range<usize>> {
		self.window.clone()
	}


	/// The bytes covered by the open window.
	///
	/// # Errors
	/// - [`InvalidState`]: No window is open.
	pub fn window_bytes(&self) -> CodecResult<&[u8]> {
		let window = self.window.clone().ok_or(InvalidState("no window is open"))?;
		Ok(&self.data[window])
	}


	/// Open the window `offset..offset+length`.
	///
	/// # Errors
	/// - [`InvalidState`]: A window is already open.
	/// - [`OutOfRange`]: The window reaches past the end of the buffer.
	pub fn set_window(&mut self, offset: usize, length: usize) -> CodecResult<()> {
		if self.window.is_some() {
			return Err(InvalidState("a window is already open"));
		};

		let len = self.data.len();
		let end = offset.checked_add(length).ok_or(OutOfRange { start: offset, end: usize::MAX, len })?;

		if end > len {
			return Err(OutOfRange { start: offset, end, len });
		};

		self.window = Some(offset..end);

		Ok(())
	}


	/// Close the open window without replacing it.
	///
	/// # Errors
	/// - [`InvalidState`]: A replacement is pending.
	pub fn clear_window(&mut self) -> CodecResult<()> {
		if self.replacement.is_some() {
			return Err(InvalidState("cannot clear the window while a replacement is pending"));
		};

		self.window = None;
		Ok(())
	}


	/// Allocate a scratch region of `new_size` bytes that will replace the
	/// window on [`commit_replacement`][Self::commit_replacement].
	///
	/// # Errors
	/// - [`InvalidState`]: No window is open, or a replacement is already
	///   pending.
	/// - [`AllocationFailure`]: The scratch region could not be allocated.
	pub fn begin_replacement(&mut self, new_size: usize) -> CodecResult<&mut [u8]> {
		if self.window.is_none() {
			return Err(InvalidState("begin_replacement without an open window"));
		};

		if self.replacement.is_some() {
			return Err(InvalidState("a replacement is already pending"));
		};

		let mut scratch = try_with_capacity(new_size)?;
		scratch.resize(new_size, 0);

		Ok(self.replacement.insert(scratch).as_mut_slice())
	}


	/// Splice the pending scratch region in place of the window and close the
	/// window.  The buffer length becomes `len - window.len() + new_size`.
	///
	/// # Errors
	/// - [`InvalidState`]: No replacement is pending.
	/// - [`AllocationFailure`]: The buffer could not grow.
	pub fn commit_replacement(&mut self) -> CodecResult<()> {
		let window = match (&self.window, &self.replacement) {
			(Some(w), Some(_)) => w.clone(),
			_ => return Err(InvalidState("commit_replacement without begin_replacement")),
		};

		let growth = self.replacement.as_ref().map_or(0, |r| r.len().saturating_sub(window.len()));
		let storage = self.data.to_mut();
		storage.try_reserve(growth).map_err(|_| AllocationFailure(storage.len().saturating_add(growth)))?;

		if let Some(replacement) = self.replacement.take() {
			let _ = storage.splice(window, replacement);
		};

		self.window = None;

		Ok(())
	}


	/// Append `bytes` at the tail through a zero-length window.
	///
	/// # Errors
	/// - [`InvalidState`]: A window is already open.
	/// - [`AllocationFailure`]: The buffer could not grow.
	pub fn append_patch(&mut self, bytes: &[u8]) -> CodecResult<()> {
		self.set_window(self.len(), 0)?;
		self.begin_replacement(bytes.len())?.copy_from_slice(bytes);
		self.commit_replacement()
	}


	/// Snapshot of the current contents.  The snapshot is a copy and never
	/// aliases storage that later patches mutate.
	pub fn data(&self) -> Vec<u8> {
		self.data.to_vec()
	}


	/// Consume the buffer, returning its contents without a copy when it
	/// already owns them.
	pub fn into_vec(self) -> Vec<u8> {
		self.data.into_owned()
	}
}


impl Default for OffsetData<'static> {
	fn default() -> Self {
		OffsetData::with_vec(vec![])
	}
}


#[test]
fn create_rejects_missing_bytes() {
	assert!(matches!(OffsetData::new(None, 4), Err(InvalidArgument(_))));
	assert!(OffsetData::new(None, 0).unwrap().is_empty());
	assert!(matches!(OffsetData::new(Some(&[1u8, 2][..]), 3), Err(InvalidArgument(_))));
	assert_eq!(OffsetData::new(Some(&[1u8, 2, 3][..]), 2).unwrap().bytes(), &[1, 2]);
}


#[test]
fn window_bounds() {
	let mut buffer = OffsetData::with_vec(vec![0u8; 8]);
	assert_eq!(buffer.set_window(4, 5), Err(OutOfRange { start: 4, end: 9, len: 8 }));
	assert!(matches!(buffer.set_window(usize::MAX, 2), Err(OutOfRange { .. })));
	buffer.set_window(4, 4).unwrap();
	assert!(matches!(buffer.set_window(0, 1), Err(InvalidState(_))));
	buffer.clear_window().unwrap();
	buffer.set_window(0, 8).unwrap();
	assert_eq!(buffer.window(), Some(0..8));
}


#[test]
fn commit_without_begin() {
	let mut buffer = OffsetData::with_vec(vec![1u8, 2, 3]);
	assert!(matches!(buffer.commit_replacement(), Err(InvalidState(_))));
	buffer.set_window(1, 1).unwrap();
	assert!(matches!(buffer.commit_replacement(), Err(InvalidState(_))));
	assert!(matches!(OffsetData::with_vec(vec![]).begin_replacement(1), Err(InvalidState(_))));
}


#[test]
fn begin_twice() {
	let mut buffer = OffsetData::with_vec(vec![1u8, 2, 3]);
	buffer.set_window(0, 1).unwrap();
	let _ = buffer.begin_replacement(2).unwrap();
	assert!(matches!(buffer.begin_replacement(2), Err(InvalidState(_))));
	assert!(matches!(buffer.clear_window(), Err(InvalidState(_))));
}


#[test]
fn commit_resizes() {
	let source = [0xAAu8; 10];
	let mut buffer = OffsetData::with_bytes_no_copy(&source);
	assert!(!buffer.owns_memory());

	buffer.set_window(2, 3).unwrap();
	buffer.begin_replacement(7).unwrap().copy_from_slice(&[1, 2, 3, 4, 5, 6, 7]);
	buffer.commit_replacement().unwrap();

	assert_eq!(buffer.len(), 10 - 3 + 7);
	assert!(buffer.owns_memory());
	assert_eq!(buffer.window(), None);
	assert_eq!(buffer.bytes(), &[0xAA, 0xAA, 1, 2, 3, 4, 5, 6, 7, 0xAA, 0xAA, 0xAA, 0xAA, 0xAA]);
	assert_eq!(source, [0xAAu8; 10]);

	buffer.set_window(0, 9).unwrap();
	let _ = buffer.begin_replacement(0).unwrap();
	buffer.commit_replacement().unwrap();
	assert_eq!(buffer.bytes(), &[0xAA; 5]);
}


#[test]
fn snapshot_does_not_alias() {
	let mut buffer = OffsetData::with_vec(vec![1u8, 2, 3]);
	let snapshot = buffer.data();
	buffer.append_patch(&[4, 5]).unwrap();
	assert_eq!(snapshot, vec![1, 2, 3]);
	assert_eq!(buffer.into_vec(), vec![1, 2, 3, 4, 5]);
}
