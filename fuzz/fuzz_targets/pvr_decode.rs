#![no_main]
use libfuzzer_sys::fuzz_target;

use frame_codec::PvrTexture;

fuzz_target!(|data: &[u8]| {
	if let Ok(texture) = PvrTexture::parse(data) {
		if u64::from(texture.width()) * u64::from(texture.height()) > 1 << 22 {
			return;
		}

		if let Ok(image) = texture.decode() {
			assert_eq!(image.dimensions(), (texture.width(), texture.height()));
		}
	}
});
