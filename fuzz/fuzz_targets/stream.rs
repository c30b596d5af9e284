#![no_main]
use libfuzzer_sys::fuzz_target;

use frame_codec::{StreamCodec, ccz_deflate, ccz_inflate};

fuzz_target!(|input: (StreamCodec, &[u8])| {
	let (codec, data) = input;

	let compressed = codec.compress_slice(data).unwrap();
	assert_eq!(codec.decompress_slice(&compressed, data.len()).unwrap(), data);

	let container = ccz_deflate(data, codec).unwrap();
	assert_eq!(ccz_inflate(&container).unwrap(), data);

	let _ = codec.decompress_slice(data, data.len().saturating_mul(4));
});
