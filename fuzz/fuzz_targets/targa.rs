#![no_main]
use libfuzzer_sys::fuzz_target;

use frame_codec::{pack_targa_rgba, unpack_targa_rgba, unpack_targa_rgba_exact};

fuzz_target!(|input: (u8, &[u8])| {
	let (width, data) = input;
	let width = usize::from(width.max(1));
	let whole = &data[..data.len() / (width * 4) * (width * 4)];

	let packed = pack_targa_rgba(whole, width).unwrap();
	assert_eq!(unpack_targa_rgba(&packed).unwrap(), whole);
	assert_eq!(unpack_targa_rgba_exact(&packed, whole.len() / 4).unwrap(), whole);

	let _ = unpack_targa_rgba(data);
});
