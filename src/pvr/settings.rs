use nom::{
	IResult,
	branch::alt,
	bytes::complete::{tag, tag_no_case},
	character::complete::multispace0,
	combinator::{all_consuming, map, value},
	error::{VerboseError, context},
	number::complete::float,
	sequence::{delimited, preceded, tuple},
};

use crate::{CodecError, CodecResult};
use crate::CodecError::*;


/// Smallest accepted tile edge.
pub const MIN_TILE_SIZE: u32 = 2;

/// Largest accepted tile edge.
pub const MAX_TILE_SIZE: u32 = 16;

/// Largest accepted endpoint search density.
pub const MAX_SAMPLES_PER_PIXEL: u32 = 64;


/// Per-channel scale applied to squared error when the lossy encoder ranks
/// candidate tile encodings
///
/// Parses from a single number applied to every channel, four
/// comma-separated numbers in R, G, B, A order, or one of the presets
/// `uniform`, `perceptual` and `opaque`.
///
/// ```
/// # use frame_codec::ChannelWeighting;
/// let w: ChannelWeighting = "1, 1, 1, 0.5".parse().unwrap();
/// assert_eq!(w.a, 0.5);
/// assert_eq!("1.0".parse::<ChannelWeighting>().unwrap(), ChannelWeighting::UNIFORM);
/// assert!("-1".parse::<ChannelWeighting>().is_err());
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ChannelWeighting {
	/// Red.
	pub r: f32,
	/// Green.
	pub g: f32,
	/// Blue.
	pub b: f32,
	/// Alpha.
	pub a: f32,
}


impl ChannelWeighting {
	/// Every channel counts the same.
	pub const UNIFORM: Self = Self { r: 1.0, g: 1.0, b: 1.0, a: 1.0 };
	/// Rec. 601 luma weights for colour, half weight for alpha.
	pub const PERCEPTUAL: Self = Self { r: 0.299, g: 0.587, b: 0.114, a: 0.5 };
	/// Colour only; alpha error is ignored.
	pub const OPAQUE: Self = Self { r: 1.0, g: 1.0, b: 1.0, a: 0.0 };


	/// Weights as an `[r, g, b, a]` array.
	pub fn as_array(&self) -> [f32; 4] {
		[self.r, self.g, self.b, self.a]
	}


	/// # Errors
	/// - [`InvalidArgument`]: A weight is negative or not finite, or all
	///   weights are zero.
	pub fn validate(&self) -> CodecResult<()> {
		let weights = self.as_array();

		if weights.iter().any(|w| !w.is_finite() || *w < 0.0) {
			return Err(InvalidArgument("channel weights must be finite and non-negative"));
		};

		if weights.iter().all(|w| *w == 0.0) {
			return Err(InvalidArgument("at least one channel weight must be positive"));
		};

		Ok(())
	}
}


impl Default for ChannelWeighting {
	fn default() -> Self {
		Self::UNIFORM
	}
}


impl std::fmt::Display for ChannelWeighting {
	fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
		write!(f, "{},{},{},{}", self.r, self.g, self.b, self.a)
	}
}


fn ws<'a, F: 'a, O>(inner: F) -> impl FnMut(&'a str) -> IResult<&'a str, O, VerboseError<&'a str>>
where
	F: FnMut(&'a str) -> IResult<&'a str, O, VerboseError<&'a str>>,
{
	delimited(multispace0, inner, multispace0)
}


fn parse_preset(i: &str) -> IResult<&str, ChannelWeighting, VerboseError<&str>> {
	context("weighting preset", alt((
		value(ChannelWeighting::UNIFORM, tag_no_case("uniform")),
		value(ChannelWeighting::PERCEPTUAL, tag_no_case("perceptual")),
		value(ChannelWeighting::OPAQUE, tag_no_case("opaque")),
	)))(i)
}


fn parse_rgba(i: &str) -> IResult<&str, ChannelWeighting, VerboseError<&str>> {
	let next = || preceded(ws(tag(",")), float);

	map(
		tuple((float, next(), next(), next())),
		|(r, g, b, a)| ChannelWeighting { r, g, b, a },
	)(i)
}


fn parse_weighting(i: &str) -> IResult<&str, ChannelWeighting, VerboseError<&str>> {
	all_consuming(ws(alt((
		parse_preset,
		context("four channel weights", parse_rgba),
		context("single weight", map(float, |w| ChannelWeighting { r: w, g: w, b: w, a: w })),
	))))(i)
}


impl std::str::FromStr for ChannelWeighting {
	type Err = CodecError;

	fn from_str(input: &str) -> CodecResult<Self> {
		let (_, result) = parse_weighting(input)
			.map_err(|_| InvalidArgument("unrecognized channel weighting"))?;
		result.validate()?;
		Ok(result)
	}
}


/// Configuration of the lossy tile-search PVR encoder
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PvrEncodingSettings {
	/// Preferred tile edge in texels.
	pub tile_size: u32,
	/// Tile edge to use when `tile_size` does not divide the image but this
	/// one does.
	pub alt_tile_size: Option<u32>,
	/// Per-channel error weights.
	pub weighting: ChannelWeighting,
	/// Endpoint search density; each tile tries `samples_per_pixel²`
	/// candidate endpoint pairs.
	pub samples_per_pixel: u32,
}


impl Default for PvrEncodingSettings {
	fn default() -> Self {
		Self {
			tile_size: 4,
			alt_tile_size: None,
			weighting: ChannelWeighting::UNIFORM,
			samples_per_pixel: 4,
		}
	}
}


impl PvrEncodingSettings {
	/// # Errors
	/// - [`InvalidArgument`]: A tile size is outside
	///   `MIN_TILE_SIZE..=MAX_TILE_SIZE`, `samples_per_pixel` is outside
	///   `1..=MAX_SAMPLES_PER_PIXEL`, or the weighting is invalid.
	pub fn validate(&self) -> CodecResult<()> {
		let tile_ok = |t: u32| (MIN_TILE_SIZE..=MAX_TILE_SIZE).contains(&t);

		if !tile_ok(self.tile_size) || !self.alt_tile_size.map_or(true, tile_ok) {
			return Err(InvalidArgument("tile size must be between 2 and 16"));
		};

		if !(1..=MAX_SAMPLES_PER_PIXEL).contains(&self.samples_per_pixel) {
			return Err(InvalidArgument("samples per pixel must be between 1 and 64"));
		};

		self.weighting.validate()
	}


	/// Tile edge to encode a `width` x `height` image with: `tile_size` if it
	/// divides both dimensions, else `alt_tile_size` if that does, else
	/// `tile_size` with the last row and column of tiles padded.
	pub fn choose_tile_size(&self, width: u32, height: u32) -> u32 {
		let divides = |t: u32| width % t == 0 && height % t == 0;

		match self.alt_tile_size {
			Some(alt) if !divides(self.tile_size) && divides(alt) => alt,
			_ => self.tile_size,
		}
	}
}


impl std::fmt::Display for PvrEncodingSettings {
	fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
		let mut segments: Vec<String> = vec![format!("tile={}", self.tile_size)];

		if let Some(alt) = self.alt_tile_size {
			segments.push(format!("altTile={}", alt));
		};

		segments.push(format!("weighting={}", self.weighting));
		segments.push(format!("samples={}", self.samples_per_pixel));

		write!(f, "<{}>", segments.join(", "))
	}
}


#[test]
fn weighting_forms() {
	assert_eq!(parse_weighting("2").unwrap().1, ChannelWeighting { r: 2.0, g: 2.0, b: 2.0, a: 2.0 });
	assert_eq!(parse_weighting(" 1,0.5 , 0.25,0 ").unwrap().1, ChannelWeighting { r: 1.0, g: 0.5, b: 0.25, a: 0.0 });
	assert_eq!(parse_weighting("Perceptual").unwrap().1, ChannelWeighting::PERCEPTUAL);
	assert_eq!("opaque".parse::<ChannelWeighting>().unwrap(), ChannelWeighting::OPAQUE);
	assert!(parse_weighting("1,2").is_err());
	assert!(parse_weighting("1,2,3,4,5").is_err());
	assert!(parse_weighting("bright").is_err());
}


#[test]
fn weighting_validation() {
	assert!(matches!("0".parse::<ChannelWeighting>(), Err(InvalidArgument(_))));
	assert!(matches!("1,1,-1,1".parse::<ChannelWeighting>(), Err(InvalidArgument(_))));
	assert!(matches!("inf".parse::<ChannelWeighting>(), Err(InvalidArgument(_))));
	assert!(matches!("".parse::<ChannelWeighting>(), Err(InvalidArgument(_))));
	assert_eq!(ChannelWeighting::default().to_string(), "1,1,1,1");
}


#[test]
fn tile_choice() {
	let settings = PvrEncodingSettings { alt_tile_size: Some(3), ..Default::default() };
	assert_eq!(settings.choose_tile_size(16, 8), 4);
	assert_eq!(settings.choose_tile_size(9, 6), 3);
	assert_eq!(settings.choose_tile_size(17, 17), 4);
	assert_eq!(PvrEncodingSettings::default().choose_tile_size(9, 6), 4);
}


#[test]
fn settings_validation() {
	assert!(PvrEncodingSettings::default().validate().is_ok());
	assert!(PvrEncodingSettings { tile_size: 1, ..Default::default() }.validate().is_err());
	assert!(PvrEncodingSettings { alt_tile_size: Some(17), ..Default::default() }.validate().is_err());
	assert!(PvrEncodingSettings { samples_per_pixel: 0, ..Default::default() }.validate().is_err());
	assert!(PvrEncodingSettings { samples_per_pixel: MAX_SAMPLES_PER_PIXEL, ..Default::default() }.validate().is_ok());
	assert!(matches!(
		PvrEncodingSettings { samples_per_pixel: MAX_SAMPLES_PER_PIXEL + 1, ..Default::default() }.validate(),
		Err(InvalidArgument(_))));
	assert!(PvrEncodingSettings { samples_per_pixel: 1 << 31, ..Default::default() }.validate().is_err());
	assert_eq!(
		PvrEncodingSettings { alt_tile_size: Some(8), ..Default::default() }.to_string(),
		"<tile=4, altTile=8, weighting=1,1,1,1, samples=4>");
}
