use frame_codec::*;
use anyhow::{Context, anyhow, Result as AnyhowResult};


pub fn command_pack(matches: &clap::ArgMatches) -> AnyhowResult<()> {
	let img_path = matches.value_of("img").expect("IMG required");
	let output_path = matches.value_of("output").expect("OUTPUT required");
	let scheme = matches.value_of("scheme").unwrap_or("rgba").to_ascii_lowercase();

	let image = image::open(img_path)
		.context(format!("{img_path:?}: Failed to open input IMG"))?
		.into_rgba8();
	let (width, height) = image.dimensions();
	let rgba = image.as_raw();

	let packed = match scheme.as_str() {
		"packbits" => pack_bits(rgba),
		"rgba" => pack_image_rgba(rgba),
		"targa" => pack_targa_rgba(rgba, width as usize),
		s => return Err(anyhow!("Unknown run-length scheme: {s:?}")),
	}
	.with_context(|| format!("Failed to pack {img_path}"))?;

	tracing::info!("{img_path}: {width}x{height}, {} -> {} bytes ({scheme})", rgba.len(), packed.len());

	std::fs::write(output_path, packed)
		.with_context(|| format!("Failed to write {output_path:?}"))?;

	Ok(())
}


pub fn command_unpack(matches: &clap::ArgMatches) -> AnyhowResult<()> {
	let input_path = matches.value_of("input").expect("INPUT required");
	let png_path = matches.value_of("png").expect("PNG required");
	let scheme = matches.value_of("scheme").unwrap_or("rgba").to_ascii_lowercase();
	let width_str = matches.value_of("width").expect("WIDTH required");
	let width = width_str.parse::<u32>()
		.with_context(|| format!("Could not parse width from \"{width_str}\""))
		.and_then(|w| if w > 0 { Ok(w) } else { Err(anyhow!("Width cannot be 0")) })?;

	let input = std::fs::read(input_path).with_context(|| format!("Could not read file: {input_path}"))?;

	let rgba = match scheme.as_str() {
		"packbits" => unpack_bits(&input),
		"rgba" => unpack_image_rgba(&input),
		"targa" => unpack_targa_rgba(&input),
		s => return Err(anyhow!("Unknown run-length scheme: {s:?}")),
	}
	.with_context(|| format!("Failed to unpack {input_path}"))?;

	let row_bytes = width as usize * 4;

	if rgba.is_empty() || rgba.len() % row_bytes != 0 {
		return Err(anyhow!("{input_path}: {} bytes of RGBA do not form rows of {width} pixels", rgba.len()));
	};

	let height = u32::try_from(rgba.len() / row_bytes).context("Image is too tall")?;
	let image = image::RgbaImage::from_vec(width, height, rgba).context("Image buffer size mismatch")?;

	image.save_with_format(png_path, image::ImageFormat::Png)
		.with_context(|| format!("save_with_format to path failed: {png_path}"))?;

	Ok(())
}
