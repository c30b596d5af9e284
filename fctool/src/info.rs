use frame_codec::*;
use anyhow::{Context, Result as AnyhowResult};


pub fn command_info(matches: &clap::ArgMatches) -> AnyhowResult<()> {
	let brief = matches.is_present("brief");

	let mut result = Ok(());

	for path in matches.values_of("input").expect("INPUT required") {
		let result_now = path_info(path, brief);

		if result_now.is_err() {
			result = result_now;
		};
	};

	result
}


fn path_info(path: &str, brief: bool) -> AnyhowResult<()> {
	let brief_prefix = if brief {
		"".to_string()
	}
	else {
		format!("{}: ", path)
	};

	let data = std::fs::read(path).with_context(|| format!("Could not read file: {path}"))?;
	let filesize = data.len();

	println!("{brief_prefix}File size: {filesize} (0x{filesize:X})");

	if data.starts_with(b"CCZ!") {
		let (header, payload) = CczHeader::parse(&data).with_context(|| format!("Could not parse CCZ header: {path}"))?;
		let codec = header.codec().map_or_else(|_| format!("unknown ({})", header.codec_id), |c| c.name().to_string());

		println!("{brief_prefix}CCZ version {}, codec {codec}", header.version);
		println!("{brief_prefix}Payload {} bytes, uncompressed {} bytes", payload.len(), header.uncompressed_len);
		return Ok(());
	};

	let texture = PvrTexture::parse(&data).with_context(|| format!("Could not parse PVR: {path}"))?;

	match texture.header {
		PvrHeader::V2(h) => println!("{brief_prefix}PVR v2, flags 0x{:08X}, bit count {}", h.flags, h.bit_count),
		PvrHeader::V3(h) => println!("{brief_prefix}PVR v3, pixel format 0x{:016X}, {} bytes of metadata", h.pixel_format, h.metadata_size),
	};

	println!("{brief_prefix}{:?}, {}x{}, {} level(s)", texture.format, texture.width(), texture.height(), texture.header.level_count());
	println!("{brief_prefix}Base level: {} bytes", texture.base_level().len());

	if texture.format == PvrPixelFormat::TilePalette {
		if let Some(tile) = texture.base_level().first() {
			println!("{brief_prefix}Tile size: {tile}x{tile}");
		};
	};

	Ok(())
}
