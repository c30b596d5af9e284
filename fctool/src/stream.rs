use frame_codec::*;
use anyhow::{Context, Result as AnyhowResult};


fn codec(matches: &clap::ArgMatches) -> AnyhowResult<StreamCodec> {
	let codec_str = matches.value_of("codec").unwrap_or("zlib");
	codec_str.parse::<StreamCodec>()
		.map_err(|_| anyhow::anyhow!("Unknown stream codec: {codec_str:?}"))
}


pub fn command_compress(matches: &clap::ArgMatches) -> AnyhowResult<()> {
	let input_path = matches.value_of("input").expect("INPUT required");
	let output_path = matches.value_of("output").expect("OUTPUT required");
	let codec = codec(matches)?;

	let input = std::fs::read(input_path).with_context(|| format!("Could not read file: {input_path}"))?;

	let output = if matches.is_present("ccz") {
		ccz_deflate(&input, codec)
	}
	else {
		match codec {
			StreamCodec::Stored => Ok(input.clone()),
			StreamCodec::Zlib => zlib_deflate(&input),
			StreamCodec::FastLz => fastlz_deflate(&input),
			StreamCodec::Lz4 => lz4_deflate(&input),
		}
	}
	.with_context(|| format!("Failed to compress {input_path} with {}", codec.name()))?;

	tracing::info!("{input_path}: {} -> {} bytes ({})", input.len(), output.len(), codec.name());

	std::fs::write(output_path, output)
		.with_context(|| format!("Failed to write {output_path:?}"))?;

	Ok(())
}


pub fn command_decompress(matches: &clap::ArgMatches) -> AnyhowResult<()> {
	let input_path = matches.value_of("input").expect("INPUT required");
	let output_path = matches.value_of("output").expect("OUTPUT required");

	let input = std::fs::read(input_path).with_context(|| format!("Could not read file: {input_path}"))?;

	let output = if matches.is_present("ccz") {
		ccz_inflate(&input)
	}
	else {
		match codec(matches)? {
			StreamCodec::Stored => Ok(input.clone()),
			StreamCodec::Zlib => zlib_inflate(&input),
			StreamCodec::FastLz => fastlz_inflate(&input),
			StreamCodec::Lz4 => lz4_inflate(&input),
		}
	}
	.with_context(|| format!("Failed to decompress {input_path}"))?;

	tracing::info!("{input_path}: {} -> {} bytes", input.len(), output.len());

	std::fs::write(output_path, output)
		.with_context(|| format!("Failed to write {output_path:?}"))?;

	Ok(())
}
