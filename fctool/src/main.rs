use anyhow::{Context, Result as AnyhowResult};

mod pvr;
mod stream;
mod rle;
mod info;


fn construct_app() -> clap::Command<'static> {
	clap::Command::new("fctool")
		.version(clap::crate_version!())
		.setting(clap::AppSettings::DeriveDisplayOrder)
		.arg(clap::arg!(loglevel: -L "Global log verbosity level")
			.ignore_case(true)
			.possible_values(["Error", "Warn", "Info", "Debug", "Trace"])
			.default_value("Info"))
		.subcommand(clap::Command::new("encode")
			.about("Encode an image file to PVR")
			.arg(clap::arg!(format: -f --format <FORMAT> "PVR pixel format (e.g. \"TilePalette\", \"Rgba4444\", \"Dxt5\")")
				.required(false)
				.default_value("TilePalette"))
			.arg(clap::arg!(tile: --tile <N> "Preferred tile edge for TilePalette")
				.required(false)
				.default_value("4"))
			.arg(clap::Arg::new("alt_tile")
				.long("alt-tile")
				.value_name("N")
				.takes_value(true)
				.help("Tile edge to use when --tile does not divide the image"))
			.arg(clap::arg!(weighting: -w --weighting <W> "Channel weighting: one number, \"r,g,b,a\", uniform, perceptual or opaque")
				.required(false)
				.default_value("uniform"))
			.arg(clap::arg!(samples: -s --samples <N> "Endpoint samples per tile axis")
				.required(false)
				.default_value("4"))
			.arg(clap::arg!(img: <IMG> "IMG input file"))
			.arg(clap::arg!(pvr: <PVR> "PVR output path")))
		.subcommand(clap::Command::new("decode")
			.about("Decode a PVR file to PNG")
			.arg(clap::arg!(pvr: <PVR> "PVR input file"))
			.arg(clap::arg!(png: <PNG> "PNG output path")))
		.subcommand(clap::Command::new("compress")
			.about("Compress a file with a stream codec")
			.arg(clap::arg!(codec: -c --codec <CODEC> "Stream codec")
				.ignore_case(true)
				.possible_values(["stored", "zlib", "fastlz", "lz4"])
				.required(false)
				.default_value("zlib"))
			.arg(clap::arg!(ccz: --ccz "Wrap the output in a CCZ container").takes_value(false))
			.arg(clap::arg!(input: <INPUT> "Input file"))
			.arg(clap::arg!(output: <OUTPUT> "Output path")))
		.subcommand(clap::Command::new("decompress")
			.about("Decompress a file written by `compress`")
			.arg(clap::arg!(codec: -c --codec <CODEC> "Stream codec; ignored for CCZ input")
				.ignore_case(true)
				.possible_values(["stored", "zlib", "fastlz", "lz4"])
				.required(false)
				.default_value("zlib"))
			.arg(clap::arg!(ccz: --ccz "Input is a CCZ container").takes_value(false))
			.arg(clap::arg!(input: <INPUT> "Input file"))
			.arg(clap::arg!(output: <OUTPUT> "Output path")))
		.subcommand(clap::Command::new("pack")
			.about("Run-length encode an image file's RGBA texels")
			.arg(clap::arg!(scheme: -s --scheme <SCHEME> "Run-length scheme")
				.ignore_case(true)
				.possible_values(["packbits", "rgba", "targa"])
				.required(false)
				.default_value("rgba"))
			.arg(clap::arg!(img: <IMG> "IMG input file"))
			.arg(clap::arg!(output: <OUTPUT> "Output path")))
		.subcommand(clap::Command::new("unpack")
			.about("Decode a run-length encoded RGBA file to PNG")
			.arg(clap::arg!(scheme: -s --scheme <SCHEME> "Run-length scheme")
				.ignore_case(true)
				.possible_values(["packbits", "rgba", "targa"])
				.required(false)
				.default_value("rgba"))
			.arg(clap::arg!(width: -W --width <WIDTH> "Image width in pixels"))
			.arg(clap::arg!(input: <INPUT> "Input file"))
			.arg(clap::arg!(png: <PNG> "PNG output path")))
		.subcommand(clap::Command::new("info")
			.about("Parse PVR or CCZ files and print their headers")
			.arg(clap::arg!(brief: -b --brief "Do not prepend file name to output").takes_value(false))
			.arg(clap::arg!(input: <INPUT> ... "File to parse")))
}


fn fctool<I, T>(args: I) -> AnyhowResult<()>
where
	I: IntoIterator<Item = T>,
	T: Into<std::ffi::OsString> + Clone,
{
	let matches = construct_app().get_matches_from(args);
	let loglevel_str = matches.value_of("loglevel")
		.unwrap_or("Info");
	let loglevel = loglevel_str
		.parse::<tracing::Level>()
		.with_context(|| format!("Failed to parse loglevel from -L{}", loglevel_str))?;

	// Already installed when driven more than once in-process.
	let _ = tracing_subscriber::fmt()
		.with_max_level(loglevel)
		.try_init();

	tracing::trace!("Global loglevel set to {:?}", loglevel);

	match matches.subcommand() {
		Some(("encode", matches)) => pvr::command_encode(matches),
		Some(("decode", matches)) => pvr::command_decode(matches),
		Some(("compress", matches)) => stream::command_compress(matches),
		Some(("decompress", matches)) => stream::command_decompress(matches),
		Some(("pack", matches)) => rle::command_pack(matches),
		Some(("unpack", matches)) => rle::command_unpack(matches),
		Some(("info", matches)) => info::command_info(matches),

		Some((&_, _)) => unreachable!(),

		None => {
			let _ = construct_app().print_help();
			Ok(())
		},
	}
}


fn main() -> AnyhowResult<()> {
	fctool(wild::args())
}


#[test]
fn app_is_well_formed() {
	construct_app().debug_assert();
}


#[test]
fn failures_propagate() {
	let dir = std::env::temp_dir().join(format!("fctool-failures-{}", std::process::id()));
	std::fs::create_dir_all(&dir).unwrap();
	let input = dir.join("oversized.fastlz");
	let output = dir.join("out.bin");
	std::fs::write(&input, [0xFF, 0xFF, 0xFF, 0xFF, 0x00]).unwrap();

	let run = |codec: &str| fctool([
		"fctool".into(), "decompress".into(), "-c".into(), codec.into(),
		input.clone().into_os_string(), output.clone().into_os_string(),
	] as [std::ffi::OsString; 6]);

	assert!(run("fastlz").is_err());
	assert!(run("lz4").is_err());
	assert!(fctool(["fctool", "decode", "does-not-exist.pvr", "out.png"]).is_err());

	std::fs::remove_dir_all(&dir).unwrap();
}
