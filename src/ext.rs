use std::ops::Range;

use crate::*;


/// Method-call forms of the byte codecs, implemented for `[u8]` (and so for
/// `Vec<u8>` through deref)
///
/// ```
/// # use frame_codec::ByteCodecExt;
/// let data = b"aaaaaaaabbbbbbbbcccccccc".to_vec();
/// assert_eq!(data.packed_bits().unwrap().unpacked_bits().unwrap(), data);
/// assert_eq!(data.zlib_deflate().unwrap().zlib_inflate().unwrap(), data);
/// ```
pub trait ByteCodecExt {
	/// See [`unpack_bits`].
	///
	/// # Errors
	/// See [`unpack_bits`].
	fn unpacked_bits(&self) -> CodecResult<Vec<u8>>;

	/// See [`pack_bits`].
	///
	/// # Errors
	/// See [`pack_bits`].
	fn packed_bits(&self) -> CodecResult<Vec<u8>>;

	/// See [`pack_bits_range`].
	///
	/// # Errors
	/// See [`pack_bits_range`].
	fn packed_bits_for_range(&self, range: Range<usize>, skip: usize) -> CodecResult<Vec<u8>>;

	/// See [`pack_image_rgba`].
	///
	/// # Errors
	/// See [`pack_image_rgba`].
	fn packed_image_rgba(&self) -> CodecResult<Vec<u8>>;

	/// See [`unpack_image_rgba`].
	///
	/// # Errors
	/// See [`unpack_image_rgba`].
	fn unpacked_image_rgba(&self) -> CodecResult<Vec<u8>>;

	/// See [`pack_targa_rgba`].
	///
	/// # Errors
	/// See [`pack_targa_rgba`].
	fn packed_targa_rgba(&self, width: usize) -> CodecResult<Vec<u8>>;

	/// See [`unpack_targa_rgba`].
	///
	/// # Errors
	/// See [`unpack_targa_rgba`].
	fn unpacked_targa_rgba(&self) -> CodecResult<Vec<u8>>;

	/// See [`zlib_deflate`].
	///
	/// # Errors
	/// See [`zlib_deflate`].
	fn zlib_deflate(&self) -> CodecResult<Vec<u8>>;

	/// See [`zlib_inflate`].
	///
	/// # Errors
	/// See [`zlib_inflate`].
	fn zlib_inflate(&self) -> CodecResult<Vec<u8>>;

	/// See [`ccz_inflate`].
	///
	/// # Errors
	/// See [`ccz_inflate`].
	fn ccz_inflate(&self) -> CodecResult<Vec<u8>>;

	/// See [`fastlz_deflate`].
	///
	/// # Errors
	/// See [`fastlz_deflate`].
	fn fastlz_deflate(&self) -> CodecResult<Vec<u8>>;

	/// See [`fastlz_inflate`].
	///
	/// # Errors
	/// See [`fastlz_inflate`].
	fn fastlz_inflate(&self) -> CodecResult<Vec<u8>>;

	/// See [`lz4_deflate`].
	///
	/// # Errors
	/// See [`lz4_deflate`].
	fn lz4_deflate(&self) -> CodecResult<Vec<u8>>;

	/// See [`lz4_inflate`].
	///
	/// # Errors
	/// See [`lz4_inflate`].
	fn lz4_inflate(&self) -> CodecResult<Vec<u8>>;
}


impl ByteCodecExt for [u8] {
	fn unpacked_bits(&self) -> CodecResult<Vec<u8>> { unpack_bits(self) }
	fn packed_bits(&self) -> CodecResult<Vec<u8>> { pack_bits(self) }
	fn packed_bits_for_range(&self, range: Range<usize>, skip: usize) -> CodecResult<Vec<u8>> { pack_bits_range(self, range, skip) }
	fn packed_image_rgba(&self) -> CodecResult<Vec<u8>> { pack_image_rgba(self) }
	fn unpacked_image_rgba(&self) -> CodecResult<Vec<u8>> { unpack_image_rgba(self) }
	fn packed_targa_rgba(&self, width: usize) -> CodecResult<Vec<u8>> { pack_targa_rgba(self, width) }
	fn unpacked_targa_rgba(&self) -> CodecResult<Vec<u8>> { unpack_targa_rgba(self) }
	fn zlib_deflate(&self) -> CodecResult<Vec<u8>> { zlib_deflate(self) }
	fn zlib_inflate(&self) -> CodecResult<Vec<u8>> { zlib_inflate(self) }
	fn ccz_inflate(&self) -> CodecResult<Vec<u8>> { ccz_inflate(self) }
	fn fastlz_deflate(&self) -> CodecResult<Vec<u8>> { fastlz_deflate(self) }
	fn fastlz_inflate(&self) -> CodecResult<Vec<u8>> { fastlz_inflate(self) }
	fn lz4_deflate(&self) -> CodecResult<Vec<u8>> { lz4_deflate(self) }
	fn lz4_inflate(&self) -> CodecResult<Vec<u8>> { lz4_inflate(self) }
}


#[test]
fn method_forms() {
	let pixels = [1u8, 2, 3, 4].repeat(6);
	assert_eq!(pixels.packed_targa_rgba(3).unwrap().unpacked_targa_rgba().unwrap(), pixels);
	assert_eq!(pixels.packed_image_rgba().unwrap().unpacked_image_rgba().unwrap(), pixels);
	assert_eq!(pixels.lz4_deflate().unwrap().lz4_inflate().unwrap(), pixels);
	assert_eq!(pixels.fastlz_deflate().unwrap().fastlz_inflate().unwrap(), pixels);
	assert_eq!(pixels.packed_bits_for_range(0..24, 4).unwrap().unpacked_bits().unwrap(), vec![1; 6]);
	assert_eq!(ccz_deflate(&pixels, StreamCodec::Lz4).unwrap().ccz_inflate().unwrap(), pixels);
}
