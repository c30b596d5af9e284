use frame_codec::*;
use anyhow::{Context, Result as AnyhowResult};
use tap::prelude::*;


pub fn command_decode(matches: &clap::ArgMatches) -> AnyhowResult<()> {
	let pvr_path = matches.value_of("pvr").expect("PVR required");
	let png_path = matches.value_of("png").expect("PNG required");

	let data = std::fs::read(pvr_path).with_context(|| format!("Could not read file: {pvr_path}"))?;
	let texture = PvrTexture::parse(&data).with_context(|| format!("Could not parse PVR: {pvr_path}"))?;
	tracing::debug!("{pvr_path}: {:?} {}x{}", texture.format, texture.width(), texture.height());

	let image = texture.decode().with_context(|| format!("Failed to decode PVR: {pvr_path}"))?;
	image.save_with_format(png_path, image::ImageFormat::Png)
		.with_context(|| format!("save_with_format to path failed: {png_path}"))?;

	Ok(())
}


pub fn command_encode(matches: &clap::ArgMatches) -> AnyhowResult<()> {
	let img_path = matches.value_of("img").expect("IMG required");
	let pvr_path = matches.value_of("pvr").expect("PVR required");

	let format_str = matches.value_of("format").unwrap_or("TilePalette");
	let format = format_str.parse::<PvrPixelFormat>()
		.map_err(|_| anyhow::anyhow!("Unknown PVR pixel format: {format_str:?}"))?;

	let image = image::open(img_path)
		.context(format!("{img_path:?}: Failed to open input IMG"))?
		.into_rgba8();

	let data = if format == PvrPixelFormat::TilePalette {
		let settings = encoding_settings(matches)?;
		tracing::info!("Encoding {img_path:?} with {settings}");

		let progress = |f: f32| tracing::debug!("{img_path}: {:.0}%", f * 100.0);
		PvrEncoder::new(settings)
			.with_progress(&progress)
			.encode_image(&image)
			.tap_ok(|e| tracing::info!("{img_path}: encoded with {0}x{0} tiles", e.tile_size))
			.context("Failed to encode image")?
			.data
	}
	else {
		encode_pvr(&image, format).context("Failed to encode image")?
	};

	std::fs::write(pvr_path, data)
		.context(format!("Failed to write PVR data to {pvr_path:?}"))?;

	Ok(())
}


fn encoding_settings(matches: &clap::ArgMatches) -> AnyhowResult<PvrEncodingSettings> {
	let parse_u32 = |name: &str| -> AnyhowResult<Option<u32>> {
		matches.value_of(name)
			.map(|s| s.parse::<u32>().with_context(|| format!("Could not parse --{name} from \"{s}\"")))
			.transpose()
	};

	let defaults = PvrEncodingSettings::default();
	let weighting_str = matches.value_of("weighting").unwrap_or("uniform");

	let settings = PvrEncodingSettings {
		tile_size: parse_u32("tile")?.unwrap_or(defaults.tile_size),
		alt_tile_size: parse_u32("alt_tile")?,
		weighting: weighting_str.parse().with_context(|| format!("Could not parse weighting from \"{weighting_str}\""))?,
		samples_per_pixel: parse_u32("samples")?.unwrap_or(defaults.samples_per_pixel),
	};

	settings.validate().context("Invalid encoder settings")?;
	Ok(settings)
}
