#![no_main]
use libfuzzer_sys::fuzz_target;

use frame_codec::{pack_image_rgba, unpack_image_rgba};

fuzz_target!(|data: &[u8]| {
	let whole = &data[..data.len() / 4 * 4];
	let packed = pack_image_rgba(whole).unwrap();
	assert_eq!(unpack_image_rgba(&packed).unwrap(), whole);

	let _ = unpack_image_rgba(data);
});
