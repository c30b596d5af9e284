#![no_main]
use libfuzzer_sys::fuzz_target;

use frame_codec::{pack_bits, unpack_bits};

fuzz_target!(|data: &[u8]| {
	let packed = pack_bits(data).unwrap();
	let unpacked = unpack_bits(&packed[..]).unwrap();
	assert_eq!(data, unpacked);

	let _ = unpack_bits(data);
});
