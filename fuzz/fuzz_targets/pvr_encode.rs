#![no_main]
use libfuzzer_sys::fuzz_target;

use frame_codec::{PvrEncodingSettings, compress_pvr_lossy, decompress_pvr};

fuzz_target!(|input: (u8, u8, u8, u8, &[u8])| {
	let (width, tile, alt_tile, samples, data) = input;
	let width = u32::from(width % 32) + 1;
	let height = (data.len() / 4) as u32 / width;

	if height == 0 || height > 64 {
		return;
	}

	let settings = PvrEncodingSettings {
		tile_size: u32::from(tile % 15) + 2,
		alt_tile_size: Some(u32::from(alt_tile % 15) + 2),
		samples_per_pixel: u32::from(samples % 6) + 1,
		..Default::default()
	};

	let rgba = &data[..(width * height * 4) as usize];
	let encoded = compress_pvr_lossy(rgba, (width, height), &settings).unwrap();
	let decoded = decompress_pvr(&encoded.data).unwrap();
	assert_eq!(decoded.dimensions(), (width, height));
});
