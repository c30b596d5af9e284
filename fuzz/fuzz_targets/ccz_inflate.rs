#![no_main]
use libfuzzer_sys::fuzz_target;

use frame_codec::{ccz_inflate, OffsetData};

fuzz_target!(|data: &[u8]| {
	let inflated = ccz_inflate(data);

	let mut buffer = OffsetData::with_bytes_no_copy(data);
	buffer.set_window(0, data.len()).unwrap();
	let in_place = buffer.ccz_inflate().map(|()| buffer.data());

	assert_eq!(inflated.is_ok(), in_place.is_ok());
});
