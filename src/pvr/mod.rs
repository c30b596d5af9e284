//! PVR texture containers: legacy (v2) and v3 header parsing, base level
//! decode to RGBA8888, and container writing.

mod pixel;
mod pvrtc;
mod settings;
mod tile;

pub use settings::*;
pub use tile::*;

use deku::prelude::*;
use enum_utils::FromStr;
use image::RgbaImage;
use static_assertions::const_assert_eq;
use surety::Ensure;
use texpresso::Format as TextureFormat;

use crate::CodecResult;
use crate::CodecError::*;
use crate::macros;
use pixel::{BytePixel, PackedPixel};
use pvrtc::PvrtcBpp;


/// Size of both the legacy and the v3 header.
pub const PVR_HEADER_SIZE: usize = 52;

/// `PVR!` as a little-endian `u32`, found at offset 44 of a legacy header.
pub const PVR_LEGACY_TAG: u32 = 0x2152_5650;

const PVR_V3_MAGIC: &[u8; 4] = b"PVR\x03";
const PVR_V3_MAGIC_BIG_ENDIAN: &[u8; 4] = b"\x03RVP";

const FLAG_MIPMAPS: u32 = 0x0000_0100;
const FLAG_TWIDDLED: u32 = 0x0000_0200;
const FLAG_ALPHA: u32 = 0x0000_8000;
const FLAG_VERTICAL_FLIP: u32 = 0x0001_0000;
const PIXEL_TYPE_MASK: u32 = 0xFF;


/// Texel layout of a PVR texture
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, FromStr)]
#[cfg_attr(feature = "arbitrary", derive(arbitrary::Arbitrary))]
#[enumeration(case_insensitive)]
pub enum PvrPixelFormat {
	/// RGBA 4:4:4:4 in a little-endian `u16`, red in the top bits.
	Rgba4444,
	/// RGBA 5:5:5:1 in a little-endian `u16`.
	Rgba5551,
	/// RGBA 8:8:8:8.
	Rgba8888,
	/// RGB 5:6:5 in a little-endian `u16`.
	Rgb565,
	/// RGB 5:5:5 in a little-endian `u16`, top bit unused.
	Rgb555,
	/// RGB 8:8:8.
	Rgb888,
	/// 8-bit intensity.
	I8,
	/// 8-bit intensity, then 8-bit alpha.
	Ai88,
	/// 8-bit alpha.
	A8,
	/// BGRA 8:8:8:8.
	Bgra8888,
	/// PVRTC, 2 bits per texel.
	Pvrtc2,
	/// PVRTC, 4 bits per texel.
	Pvrtc4,
	/// DXT1 (BC1).
	Dxt1,
	/// DXT3 (BC2).
	Dxt3,
	/// DXT5 (BC3).
	Dxt5,
	/// Tiles of two RGBA endpoints and 2-bit selectors, as written by
	/// [`PvrEncoder`].
	TilePalette,
}


impl PvrPixelFormat {
	/// Every format, in legacy id order.
	pub const ALL: [PvrPixelFormat; 16] = {
		use PvrPixelFormat::*;
		[Rgba4444, Rgba5551, Rgba8888, Rgb565, Rgb555, Rgb888, I8, Ai88, Pvrtc2, Pvrtc4, Bgra8888, A8, Dxt1, Dxt3, Dxt5, TilePalette]
	};


	/// Format named by the low byte of a legacy header's flags.
	pub const fn from_legacy_id(id: u32) -> Option<Self> {
		use PvrPixelFormat::*;

		Some(match id {
			0x10 => Rgba4444,
			0x11 => Rgba5551,
			0x12 => Rgba8888,
			0x13 => Rgb565,
			0x14 => Rgb555,
			0x15 => Rgb888,
			0x16 => I8,
			0x17 => Ai88,
			0x0C | 0x18 => Pvrtc2,
			0x0D | 0x19 => Pvrtc4,
			0x1A => Bgra8888,
			0x1B => A8,
			0x20 => Dxt1,
			0x22 => Dxt3,
			0x24 => Dxt5,
			0x40 => TilePalette,
			_ => return None,
		})
	}


	/// Id written into a legacy header.
	pub const fn legacy_id(self) -> u32 {
		use PvrPixelFormat::*;

		match self {
			Rgba4444 => 0x10,
			Rgba5551 => 0x11,
			Rgba8888 => 0x12,
			Rgb565 => 0x13,
			Rgb555 => 0x14,
			Rgb888 => 0x15,
			I8 => 0x16,
			Ai88 => 0x17,
			Pvrtc2 => 0x18,
			Pvrtc4 => 0x19,
			Bgra8888 => 0x1A,
			A8 => 0x1B,
			Dxt1 => 0x20,
			Dxt3 => 0x22,
			Dxt5 => 0x24,
			TilePalette => 0x40,
		}
	}


	/// Format named by a v3 header's 64-bit pixel format field: a compressed
	/// format id when the upper half is zero, otherwise four channel names
	/// followed by their four bit widths.
	pub fn from_v3_format(format: u64) -> Option<Self> {
		use PvrPixelFormat::*;

		let channels = |names: &[u8; 4], bits: [u8; 4]| {
			u64::from_le_bytes([names[0], names[1], names[2], names[3], bits[0], bits[1], bits[2], bits[3]])
		};

		if format >> 32 == 0 {
			return match format {
				0 | 1 => Some(Pvrtc2),
				2 | 3 => Some(Pvrtc4),
				7 => Some(Dxt1),
				9 => Some(Dxt3),
				11 => Some(Dxt5),
				_ => None,
			};
		};

		[
			(channels(b"rgba", [8, 8, 8, 8]), Rgba8888),
			(channels(b"bgra", [8, 8, 8, 8]), Bgra8888),
			(channels(b"rgba", [4, 4, 4, 4]), Rgba4444),
			(channels(b"rgba", [5, 5, 5, 1]), Rgba5551),
			(channels(b"rgb\0", [5, 6, 5, 0]), Rgb565),
			(channels(b"rgb\0", [8, 8, 8, 0]), Rgb888),
			(channels(b"l\0\0\0", [8, 0, 0, 0]), I8),
			(channels(b"la\0\0", [8, 8, 0, 0]), Ai88),
			(channels(b"a\0\0\0", [8, 0, 0, 0]), A8),
		]
		.into_iter()
		.find_map(|(id, f)| (id == format).then_some(f))
	}


	/// Bits per texel, or 0 when it depends on the payload.
	pub const fn bit_count(self) -> u32 {
		use PvrPixelFormat::*;

		match self {
			Rgba8888 | Bgra8888 => 32,
			Rgb888 => 24,
			Rgba4444 | Rgba5551 | Rgb565 | Rgb555 | Ai88 => 16,
			I8 | A8 | Dxt3 | Dxt5 => 8,
			Pvrtc4 | Dxt1 => 4,
			Pvrtc2 => 2,
			TilePalette => 0,
		}
	}


	/// Legacy header channel masks, in R, G, B, A order.
	pub const fn masks(self) -> [u32; 4] {
		use PvrPixelFormat::*;

		match self {
			Rgba4444 => [0xF000, 0x0F00, 0x00F0, 0x000F],
			Rgba5551 => [0xF800, 0x07C0, 0x003E, 0x0001],
			Rgba8888 => [0x0000_00FF, 0x0000_FF00, 0x00FF_0000, 0xFF00_0000],
			Rgb565 => [0xF800, 0x07E0, 0x001F, 0],
			Rgb555 => [0x7C00, 0x03E0, 0x001F, 0],
			Rgb888 => [0x0000_00FF, 0x0000_FF00, 0x00FF_0000, 0],
			Bgra8888 => [0x00FF_0000, 0x0000_FF00, 0x0000_00FF, 0xFF00_0000],
			I8 => [0xFF, 0, 0, 0],
			Ai88 => [0x00FF, 0, 0, 0xFF00],
			A8 => [0, 0, 0, 0xFF],
			Pvrtc2 | Pvrtc4 | Dxt1 | Dxt3 | Dxt5 | TilePalette => [0; 4],
		}
	}


	/// Whether texels carry an alpha channel.
	pub const fn has_alpha(self) -> bool {
		!matches!(self, PvrPixelFormat::Rgb565 | PvrPixelFormat::Rgb555 | PvrPixelFormat::Rgb888 | PvrPixelFormat::I8)
	}


	fn dxt(self) -> Option<(TextureFormat, usize)> {
		match self {
			PvrPixelFormat::Dxt1 => Some((TextureFormat::Bc1, 8)),
			PvrPixelFormat::Dxt3 => Some((TextureFormat::Bc2, 16)),
			PvrPixelFormat::Dxt5 => Some((TextureFormat::Bc3, 16)),
			_ => None,
		}
	}


	fn byte_pixel(self) -> Option<BytePixel> {
		use PvrPixelFormat::*;

		match self {
			Rgba8888 => Some(BytePixel::Rgba8888),
			Bgra8888 => Some(BytePixel::Bgra8888),
			Rgb888 => Some(BytePixel::Rgb888),
			I8 => Some(BytePixel::I8),
			Ai88 => Some(BytePixel::Ai88),
			A8 => Some(BytePixel::A8),
			_ => None,
		}
	}


	/// Bytes of base level payload a `width` x `height` texture needs.
	/// Tile-palette payloads announce their tile size in their first byte.
	///
	/// # Errors
	/// - [`FormatError`]: A tile-palette payload names no valid tile size.
	/// - [`AllocationFailure`]: The size overflows a [`usize`].
	fn level_size(self, width: usize, height: usize, payload: &[u8]) -> CodecResult<usize> {
		use PvrPixelFormat::*;

		let overflow = AllocationFailure(usize::MAX);

		match self {
			Pvrtc2 => PvrtcBpp::Two.level_size(width, height).ok_or(overflow),
			Pvrtc4 => PvrtcBpp::Four.level_size(width, height).ok_or(overflow),
			Dxt1 | Dxt3 | Dxt5 => {
				let block = self.dxt().map_or(16, |(_, b)| b);
				(((width.checked() + 3) / 4) * ((height + 3) / 4) * block).ok_or(overflow)
			},
			TilePalette => tile::tile_palette_size(width, height, tile::payload_tile_size(payload)?).ok_or(overflow),
			Rgba4444 | Rgba5551 | Rgb565 | Rgb555 => (width.checked() * height * 2).ok_or(overflow),
			_ => (width.checked() * height * self.byte_pixel().map_or(4, BytePixel::bytes)).ok_or(overflow),
		}
	}
}


/// Legacy PVR header
#[derive(Debug, Clone, Copy, PartialEq, Eq, DekuRead, DekuWrite)]
#[deku(endian = "little")]
pub struct PvrHeaderV2 {
	/// Always [`PVR_HEADER_SIZE`].
	pub header_size: u32,
	#[allow(missing_docs)]
	pub height: u32,
	#[allow(missing_docs)]
	pub width: u32,
	/// Mip levels after the base level.
	pub mipmap_count: u32,
	/// Pixel type id in the low byte, layout flags above it.
	pub flags: u32,
	/// Payload bytes, all levels and surfaces.
	pub data_size: u32,
	#[allow(missing_docs)]
	pub bit_count: u32,
	#[allow(missing_docs)]
	pub red_mask: u32,
	#[allow(missing_docs)]
	pub green_mask: u32,
	#[allow(missing_docs)]
	pub blue_mask: u32,
	#[allow(missing_docs)]
	pub alpha_mask: u32,
	/// Always [`PVR_LEGACY_TAG`].
	pub tag: u32,
	#[allow(missing_docs)]
	pub surface_count: u32,
}


/// PVR v3 header; `metadata_size` bytes of metadata follow it
#[derive(Debug, Clone, Copy, PartialEq, Eq, DekuRead, DekuWrite)]
#[deku(magic = b"PVR\x03", endian = "little")]
pub struct PvrHeaderV3 {
	#[allow(missing_docs)]
	pub flags: u32,
	/// See [`PvrPixelFormat::from_v3_format`].
	pub pixel_format: u64,
	#[allow(missing_docs)]
	pub colour_space: u32,
	#[allow(missing_docs)]
	pub channel_type: u32,
	#[allow(missing_docs)]
	pub height: u32,
	#[allow(missing_docs)]
	pub width: u32,
	#[allow(missing_docs)]
	pub depth: u32,
	#[allow(missing_docs)]
	pub surface_count: u32,
	#[allow(missing_docs)]
	pub face_count: u32,
	/// Mip levels including the base level.
	pub mipmap_count: u32,
	#[allow(missing_docs)]
	pub metadata_size: u32,
}


/// Either header revision
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PvrHeader {
	#[allow(missing_docs)]
	V2(PvrHeaderV2),
	#[allow(missing_docs)]
	V3(PvrHeaderV3),
}


impl PvrHeader {
	/// Parse whichever header starts `input`, returning it together with the
	/// texel data that follows it.
	///
	/// # Errors
	/// - [`FormatError`]: `input` is not a PVR container or is truncated.
	/// - [`UnsupportedFormat`]: The container is a big-endian v3 file.
	pub fn parse(input: &[u8]) -> CodecResult<(Self, &[u8])> {
		if input.len() < PVR_HEADER_SIZE {
			return Err(FormatError(format!("truncated PVR header ({} of {} bytes)", input.len(), PVR_HEADER_SIZE)));
		};

		const_assert_eq!(PVR_HEADER_SIZE, 13 * 4);
		const_assert_eq!(PVR_HEADER_SIZE, 4 + 4 + 8 + 9 * 4);

		if input.starts_with(PVR_V3_MAGIC_BIG_ENDIAN) {
			return Err(UnsupportedFormat("big-endian PVR v3".into()));
		};

		if input.starts_with(PVR_V3_MAGIC) {
			let (_, header) = PvrHeaderV3::from_bytes((input, 0))
				.map_err(|e| FormatError(format!("invalid PVR v3 header: {}", e)))?;
			let metadata = usize::try_from(header.metadata_size).map_err(|_| AllocationFailure(usize::MAX))?;
			let data = input[PVR_HEADER_SIZE..].get(metadata..)
				.ok_or_else(|| FormatError(format!("PVR v3 metadata of {} bytes is truncated", metadata)))?;
			return Ok((PvrHeader::V3(header), data));
		};

		let (_, header) = PvrHeaderV2::from_bytes((input, 0))
			.map_err(|e| FormatError(format!("invalid PVR header: {}", e)))?;

		if header.tag != PVR_LEGACY_TAG {
			return Err(FormatError("not a PVR container".into()));
		};

		if header.header_size as usize != PVR_HEADER_SIZE {
			return Err(FormatError(format!("unexpected PVR header size {}", header.header_size)));
		};

		Ok((PvrHeader::V2(header), &input[PVR_HEADER_SIZE..]))
	}


	#[allow(missing_docs)]
	pub const fn width(&self) -> u32 {
		match self {
			PvrHeader::V2(h) => h.width,
			PvrHeader::V3(h) => h.width,
		}
	}


	#[allow(missing_docs)]
	pub const fn height(&self) -> u32 {
		match self {
			PvrHeader::V2(h) => h.height,
			PvrHeader::V3(h) => h.height,
		}
	}


	/// Number of mip levels, including the base level.
	pub const fn level_count(&self) -> u32 {
		match self {
			PvrHeader::V2(h) => h.mipmap_count.saturating_add(1),
			PvrHeader::V3(h) => if h.mipmap_count == 0 { 1 } else { h.mipmap_count },
		}
	}


	/// # Errors
	/// - [`UnsupportedFormat`]: The header names a format this crate does
	///   not decode.
	pub fn format(&self) -> CodecResult<PvrPixelFormat> {
		match self {
			PvrHeader::V2(h) => PvrPixelFormat::from_legacy_id(h.flags & PIXEL_TYPE_MASK)
				.ok_or_else(|| UnsupportedFormat(format!("PVR pixel type {:#04x}", h.flags & PIXEL_TYPE_MASK))),
			PvrHeader::V3(h) => PvrPixelFormat::from_v3_format(h.pixel_format)
				.ok_or_else(|| UnsupportedFormat(format!("PVR v3 pixel format {:#018x}", h.pixel_format))),
		}
	}


	fn flags(&self) -> u32 {
		match self {
			PvrHeader::V2(h) => h.flags,
			PvrHeader::V3(_) => 0,
		}
	}
}


/// A parsed PVR container borrowing its texel data
#[derive(Debug, Clone, Copy)]
pub struct PvrTexture<'a> {
	/// The header as stored.
	pub header: PvrHeader,
	/// Texel layout of every level.
	pub format: PvrPixelFormat,
	/// Base level bytes.
	base_level: &'a [u8],
}


impl<'a> PvrTexture<'a> {
	/// Parse a container and locate its base level.
	///
	/// # Errors
	/// - [`FormatError`]: Not a PVR container, zero dimensions, or fewer
	///   texel bytes than the base level needs (also when a legacy header's
	///   `data_size` says so).
	/// - [`UnsupportedFormat`]: Unknown pixel format, or twiddled
	///   uncompressed texels.
	pub fn parse(input: &'a [u8]) -> CodecResult<Self> {
		let (header, data) = PvrHeader::parse(input)?;
		let format = header.format()?;
		let (width, height) = (header.width() as usize, header.height() as usize);

		if width == 0 || height == 0 {
			return Err(FormatError(format!("PVR texture has zero size {}x{}", width, height)));
		};

		let twiddled = header.flags() & FLAG_TWIDDLED != 0;

		if twiddled && !matches!(format, PvrPixelFormat::Pvrtc2 | PvrPixelFormat::Pvrtc4) {
			return Err(UnsupportedFormat(format!("twiddled {:?} texels", format)));
		};

		let needed = format.level_size(width, height, data)?;
		let available = match header {
			PvrHeader::V2(h) => data.len().min(h.data_size as usize),
			PvrHeader::V3(_) => data.len(),
		};

		if available < needed {
			return Err(FormatError(format!("PVR {:?} {}x{} needs {} bytes, has {}", format, width, height, needed, available)));
		};

		macros::log!(trace, "PvrTexture::parse: {:?} {}x{}, {} levels", format, width, height, header.level_count());

		Ok(Self { header, format, base_level: &data[..needed] })
	}


	#[allow(missing_docs)]
	pub const fn width(&self) -> u32 {
		self.header.width()
	}


	#[allow(missing_docs)]
	pub const fn height(&self) -> u32 {
		self.header.height()
	}


	/// Raw bytes of the base level.
	pub const fn base_level(&self) -> &'a [u8] {
		self.base_level
	}


	/// Decode the base level into RGBA8888.
	///
	/// # Errors
	/// - [`FormatError`]: The texel data is malformed for its format.
	/// - [`AllocationFailure`]: The output could not be allocated.
	pub fn decode(&self) -> CodecResult<RgbaImage> {
		use PvrPixelFormat as F;

		let (width, height) = (self.width() as usize, self.height() as usize);
		let level = self.base_level;

		let mut rgba = match self.format {
			F::Rgba4444 => pixel::Rgba4444::convert_to_rgba8_slice(level)?,
			F::Rgba5551 => pixel::Rgba5551::convert_to_rgba8_slice(level)?,
			F::Rgb565 => pixel::Rgb565::convert_to_rgba8_slice(level)?,
			F::Rgb555 => pixel::Rgb555::convert_to_rgba8_slice(level)?,
			F::Pvrtc2 => pvrtc::decode_pvrtc(level, width, height, PvrtcBpp::Two)?,
			F::Pvrtc4 => pvrtc::decode_pvrtc(level, width, height, PvrtcBpp::Four)?,
			F::TilePalette => tile::decode_tile_palette(level, width, height)?,
			f => match (f.dxt(), f.byte_pixel()) {
				(Some((format, _)), _) => {
					let mut buffer = crate::try_alloc((width.checked() * height * 4).ok_or(AllocationFailure(usize::MAX))?)?;
					format.decompress(level, width, height, &mut buffer);
					buffer
				},
				(None, Some(layout)) => layout.convert_to_rgba8_slice(level)?,
				(None, None) => return Err(UnsupportedFormat(format!("{:?}", f))),
			},
		};

		if self.header.flags() & FLAG_VERTICAL_FLIP != 0 {
			rgba = rgba.chunks_exact(width * 4).rev().flatten().copied().collect();
		};

		RgbaImage::from_vec(self.width(), self.height(), rgba)
			.ok_or(InvalidState("decoded texels disagree with the texture size"))
	}
}


/// Decode the base level of a PVR container into RGBA8888.
///
/// # Errors
/// See [`PvrTexture::parse`] and [`PvrTexture::decode`].
///
/// # Example
/// ```
/// # use frame_codec::{decompress_pvr, write_pvr, PvrPixelFormat};
/// let pvr = write_pvr(PvrPixelFormat::Rgb888, 2, 1, &[255, 0, 0, 0, 0, 255]).unwrap();
/// let image = decompress_pvr(&pvr).unwrap();
/// assert_eq!(image.into_raw(), vec![255, 0, 0, 255, 0, 0, 255, 255]);
/// ```
pub fn decompress_pvr(input: &[u8]) -> CodecResult<RgbaImage> {
	PvrTexture::parse(input)?.decode()
}


/// Wrap a base level payload in a legacy PVR container.
///
/// # Errors
/// - [`InvalidArgument`]: A dimension is zero, the payload is shorter than
///   the base level needs, or longer than [`u32::MAX`] bytes.
pub fn write_pvr(format: PvrPixelFormat, width: u32, height: u32, payload: &[u8]) -> CodecResult<Vec<u8>> {
	if width == 0 || height == 0 {
		return Err(InvalidArgument("PVR dimensions must be non-zero"));
	};

	let needed = format.level_size(width as usize, height as usize, payload)
		.map_err(|_| InvalidArgument("PVR payload does not describe a valid base level"))?;

	if payload.len() < needed {
		return Err(InvalidArgument("PVR payload is shorter than its base level"));
	};

	let data_size = u32::try_from(payload.len()).map_err(|_| InvalidArgument("PVR payload is longer than u32::MAX bytes"))?;
	let [red_mask, green_mask, blue_mask, alpha_mask] = format.masks();
	let mut flags = format.legacy_id();

	if format.has_alpha() {
		flags |= FLAG_ALPHA;
	};

	if matches!(format, PvrPixelFormat::Pvrtc2 | PvrPixelFormat::Pvrtc4) {
		flags |= FLAG_TWIDDLED;
	};

	#[allow(clippy::cast_possible_truncation)]
	let header = PvrHeaderV2 {
		header_size: PVR_HEADER_SIZE as u32,
		height,
		width,
		mipmap_count: 0,
		flags: flags & !FLAG_MIPMAPS,
		data_size,
		bit_count: format.bit_count(),
		red_mask,
		green_mask,
		blue_mask,
		alpha_mask,
		tag: PVR_LEGACY_TAG,
		surface_count: 1,
	};

	let header_bytes = header.to_bytes().map_err(|_| InvalidState("could not serialize PVR header"))?;
	let mut output = crate::try_with_capacity(header_bytes.len() + payload.len())?;
	output.extend(header_bytes);
	output.extend_from_slice(payload);

	Ok(output)
}


/// Encode `image` as a single-level legacy PVR container.
///
/// Uncompressed formats convert texel by texel, DXTn goes through
/// `texpresso`, and [`PvrPixelFormat::TilePalette`] runs [`PvrEncoder`] with
/// default settings.
///
/// # Errors
/// - [`UnsupportedFormat`]: PVRTC encoding is not implemented.
/// - [`InvalidArgument`]: The image has a zero dimension.
pub fn encode_pvr(image: &RgbaImage, format: PvrPixelFormat) -> CodecResult<Vec<u8>> {
	use PvrPixelFormat as F;

	let (width, height) = image.dimensions();
	let rgba = image.as_raw();

	let payload = match format {
		F::Rgba4444 => pixel::Rgba4444::convert_from_rgba8_slice(rgba)?,
		F::Rgba5551 => pixel::Rgba5551::convert_from_rgba8_slice(rgba)?,
		F::Rgb565 => pixel::Rgb565::convert_from_rgba8_slice(rgba)?,
		F::Rgb555 => pixel::Rgb555::convert_from_rgba8_slice(rgba)?,
		F::Pvrtc2 | F::Pvrtc4 => return Err(UnsupportedFormat(format!("encoding {:?}", format))),
		F::TilePalette => return PvrEncoder::new(PvrEncodingSettings::default()).encode_image(image).map(|e| e.data),
		f => match (f.dxt(), f.byte_pixel()) {
			(Some((texture_format, _)), _) => {
				let (w, h) = (width as usize, height as usize);
				let mut data = crate::try_alloc(texture_format.compressed_size(w, h))?;
				let params = texpresso::Params { algorithm: texpresso::Algorithm::IterativeClusterFit, ..Default::default() };
				texture_format.compress(rgba, w, h, params, &mut data);
				data
			},
			(None, Some(layout)) => layout.convert_from_rgba8_slice(rgba)?,
			(None, None) => return Err(UnsupportedFormat(format!("encoding {:?}", f))),
		},
	};

	macros::log!(debug, "encode_pvr: {:?} {}x{}, {} payload bytes", format, width, height, payload.len());

	write_pvr(format, width, height, &payload)
}


#[cfg(test)]
fn v3_container(pixel_format: u64, width: u32, height: u32, metadata: &[u8], payload: &[u8]) -> Vec<u8> {
	let header = PvrHeaderV3 {
		flags: 0,
		pixel_format,
		colour_space: 0,
		channel_type: 0,
		height,
		width,
		depth: 1,
		surface_count: 1,
		face_count: 1,
		mipmap_count: 1,
		metadata_size: metadata.len() as u32,
	};

	let mut out = header.to_bytes().unwrap();
	out.extend_from_slice(metadata);
	out.extend_from_slice(payload);
	out
}


#[test]
fn legacy_header_layout() {
	let pvr = write_pvr(PvrPixelFormat::Rgba8888, 3, 2, &[0u8; 24]).unwrap();
	assert_eq!(pvr.len(), PVR_HEADER_SIZE + 24);
	assert_eq!(&pvr[44..48], b"PVR!");
	assert_eq!(&pvr[0..4], &[52, 0, 0, 0]);
	assert_eq!(&pvr[4..8], &[2, 0, 0, 0]);
	assert_eq!(&pvr[8..12], &[3, 0, 0, 0]);
	assert_eq!(&pvr[16..20], &[0x12, 0x80, 0, 0]);

	let texture = PvrTexture::parse(&pvr).unwrap();
	assert_eq!((texture.width(), texture.height(), texture.format), (3, 2, PvrPixelFormat::Rgba8888));
	assert_eq!(texture.header.level_count(), 1);
}


#[test]
fn legacy_ids() {
	for format in PvrPixelFormat::ALL {
		assert_eq!(PvrPixelFormat::from_legacy_id(format.legacy_id()), Some(format));
	};

	assert_eq!(PvrPixelFormat::from_legacy_id(0x0D), Some(PvrPixelFormat::Pvrtc4));
	assert_eq!(PvrPixelFormat::from_legacy_id(0x05), None);
	assert_eq!("pvrtc4".parse::<PvrPixelFormat>(), Ok(PvrPixelFormat::Pvrtc4));
	assert_eq!("TilePalette".parse::<PvrPixelFormat>(), Ok(PvrPixelFormat::TilePalette));
}


#[test]
fn uncompressed_roundtrip() {
	let texels: Vec<u8> = (0..4 * 3).flat_map(|i| [i * 17, 255 - i * 17, 0x33, 0x11 * (i % 16)]).collect();
	let image = RgbaImage::from_vec(4, 3, texels.clone()).unwrap();

	for format in [PvrPixelFormat::Rgba8888, PvrPixelFormat::Bgra8888, PvrPixelFormat::Rgba4444] {
		let pvr = encode_pvr(&image, format).unwrap();
		assert_eq!(decompress_pvr(&pvr).unwrap().into_raw(), texels, "{:?}", format);
	};
}


#[test]
fn v3_containers() {
	let rgba8888 = PvrPixelFormat::from_v3_format(u64::from_le_bytes(*b"rgba\x08\x08\x08\x08")).unwrap();
	assert_eq!(rgba8888, PvrPixelFormat::Rgba8888);

	let pvr = v3_container(u64::from_le_bytes(*b"bgra\x08\x08\x08\x08"), 2, 1, &[0xAA; 12], &[1, 2, 3, 4, 5, 6, 7, 8]);
	let texture = PvrTexture::parse(&pvr).unwrap();
	assert_eq!(texture.format, PvrPixelFormat::Bgra8888);
	assert_eq!(texture.decode().unwrap().into_raw(), vec![3, 2, 1, 4, 7, 6, 5, 8]);

	let pvr = v3_container(u64::from_le_bytes(*b"l\0\0\0\x08\0\0\0"), 1, 2, &[], &[9, 200]);
	assert_eq!(decompress_pvr(&pvr).unwrap().into_raw(), vec![9, 9, 9, 255, 200, 200, 200, 255]);

	let pvr = v3_container(u64::from_le_bytes(*b"rgba\x10\x10\x10\x10"), 1, 1, &[], &[0; 8]);
	assert!(matches!(decompress_pvr(&pvr), Err(UnsupportedFormat(_))));

	let pvr = v3_container(3, 8, 8, &[0; 4], &[0; 32]);
	assert_eq!(decompress_pvr(&pvr).unwrap().dimensions(), (8, 8));
}


#[test]
fn dxt1_block() {
	let block = [0x00, 0xF8, 0x00, 0x00, 0, 0, 0, 0];
	let pvr = write_pvr(PvrPixelFormat::Dxt1, 4, 4, &block).unwrap();
	assert_eq!(decompress_pvr(&pvr).unwrap().into_raw(), [255u8, 0, 0, 255].repeat(16));
}


#[test]
fn vertical_flip() {
	let mut pvr = write_pvr(PvrPixelFormat::I8, 1, 2, &[10, 20]).unwrap();
	pvr[18] |= 0x01;
	assert_eq!(decompress_pvr(&pvr).unwrap().into_raw(), vec![20, 20, 20, 255, 10, 10, 10, 255]);
}


#[test]
fn malformed_containers() {
	assert!(matches!(decompress_pvr(b"PVR!"), Err(FormatError(_))));
	assert!(matches!(decompress_pvr(&[0u8; 64]), Err(FormatError(_))));

	let pvr = write_pvr(PvrPixelFormat::Rgb565, 2, 2, &[0; 8]).unwrap();
	assert!(matches!(decompress_pvr(&pvr[..pvr.len() - 1]), Err(FormatError(_))));

	let mut zero_width = pvr.clone();
	zero_width[8] = 0;
	assert!(matches!(decompress_pvr(&zero_width), Err(FormatError(_))));

	let mut unknown = pvr.clone();
	unknown[16] = 0x05;
	assert!(matches!(decompress_pvr(&unknown), Err(UnsupportedFormat(_))));

	let mut twiddled = pvr.clone();
	twiddled[17] |= 0x02;
	assert!(matches!(decompress_pvr(&twiddled), Err(UnsupportedFormat(_))));

	let mut short_declared = pvr.clone();
	short_declared[20] = 4;
	assert!(matches!(decompress_pvr(&short_declared), Err(FormatError(_))));

	let mut big_endian = pvr;
	big_endian[..4].copy_from_slice(b"\x03RVP");
	assert!(matches!(decompress_pvr(&big_endian), Err(UnsupportedFormat(_))));

	assert!(matches!(write_pvr(PvrPixelFormat::Rgb565, 2, 2, &[0; 7]), Err(InvalidArgument(_))));
	assert!(matches!(write_pvr(PvrPixelFormat::Rgb565, 0, 2, &[]), Err(InvalidArgument(_))));
	assert!(matches!(encode_pvr(&RgbaImage::new(8, 8), PvrPixelFormat::Pvrtc4), Err(UnsupportedFormat(_))));
}
