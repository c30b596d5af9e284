use deku::{prelude::*, DekuContainerRead, DekuContainerWrite};
use surety::Ensure;
use tap::prelude::*;

use crate::CodecResult;
use crate::CodecError::*;


/// A 16-bit pixel whose channels are bitfields of a little-endian `u16`,
/// most significant field first.  A channel width of 0 means the channel is
/// absent: missing colour reads as 0, missing alpha as opaque.
#[allow(clippy::cast_possible_truncation)]
pub(crate) trait PackedPixel: for<'a> DekuContainerRead<'a> + DekuContainerWrite + Sized {
	/// Bit widths of R, G, B and A.
	const WIDTHS: [u8; 4];
	const BYTES: usize = 2;

	fn channels(&self) -> [u8; 4];
	fn from_channels(channels: [u8; 4]) -> Self;


	fn uint_range(width: u8) -> u16 { (1u16 << width) - 1 }


	fn scale(value: u8, from_width: u8, into_width: u8) -> u8 {
		let range_from = Self::uint_range(from_width);
		let range_into = Self::uint_range(into_width);
		let bias = range_from / 2;
		((u16::from(value) * range_into + bias) / range_from) as u8
	}


	fn from_le_bytes(data: &[u8]) -> CodecResult<Self> {
		let data = data.get(..Self::BYTES)
			.ok_or(CorruptData("truncated packed pixel"))?
			.to_owned()
			.tap_mut(|d| d.reverse());

		let (_, result) = <Self as DekuContainerRead>::from_bytes((&data, 0))
			.map_err(|_| CorruptData("unreadable packed pixel"))?;
		Ok(result)
	}


	fn to_le_bytes(&self) -> CodecResult<Vec<u8>> {
		<Self as DekuContainerWrite>::to_bytes(self)
			.map(|bytes| bytes.tap_mut(|b| b.reverse()))
			.map_err(|_| InvalidArgument("packed pixel channel out of range"))
	}


	fn into_rgba8(self) -> [u8; 4] {
		let mut rgba = [0u8, 0, 0, 0xFF];

		for ((out, value), width) in rgba.iter_mut().zip(self.channels()).zip(Self::WIDTHS) {
			if width > 0 {
				*out = Self::scale(value, width, 8);
			};
		};

		rgba
	}


	fn from_rgba8(rgba: [u8; 4]) -> Self {
		let mut channels = [0u8; 4];

		for ((out, value), width) in channels.iter_mut().zip(rgba).zip(Self::WIDTHS) {
			if width > 0 {
				*out = Self::scale(value, 8, width);
			};
		};

		Self::from_channels(channels)
	}


	fn convert_to_rgba8_slice(data: &[u8]) -> CodecResult<Vec<u8>> {
		if data.len() % Self::BYTES != 0 {
			return Err(FormatError(format!("packed pixel data is not a multiple of {} bytes", Self::BYTES)));
		};

		let result_len: usize = (data.len().checked() / Self::BYTES * 4)
			.ok_or(AllocationFailure(usize::MAX))?;
		let mut result = crate::try_with_capacity(result_len)?;

		for pixdata in data.chunks_exact(Self::BYTES) {
			result.extend(Self::from_le_bytes(pixdata)?.into_rgba8());
		};

		Ok(result)
	}


	fn convert_from_rgba8_slice(data: &[u8]) -> CodecResult<Vec<u8>> {
		if data.len() % 4 != 0 {
			return Err(InvalidArgument("RGBA buffer length is not a multiple of 4"));
		};

		let result_len: usize = (data.len().checked() / 4 * Self::BYTES)
			.ok_or(AllocationFailure(usize::MAX))?;
		let mut result = crate::try_with_capacity(result_len)?;

		for pixdata in data.chunks_exact(4) {
			let rgba = [pixdata[0], pixdata[1], pixdata[2], pixdata[3]];
			result.extend(Self::from_rgba8(rgba).to_le_bytes()?);
		};

		Ok(result)
	}
}


macro_rules! packed_pixel {
	($name:ident, [$($field:ident: $bits:tt),+], widths = $widths:expr, channels = |$p:ident| $channels:expr, from = |$c:ident| $from:expr) => {
		#[derive(Debug, Clone, Copy, PartialEq, Eq, DekuRead, DekuWrite)]
		pub(crate) struct $name {
			$(
				#[deku(bits = $bits)]
				$field: u8,
			)+
		}


		impl PackedPixel for $name {
			const WIDTHS: [u8; 4] = $widths;

			fn channels(&self) -> [u8; 4] {
				let $p = self;
				$channels
			}

			fn from_channels($c: [u8; 4]) -> Self {
				$from
			}
		}
	};
}


packed_pixel!(Rgba4444, [r: "4", g: "4", b: "4", a: "4"],
	widths = [4, 4, 4, 4],
	channels = |p| [p.r, p.g, p.b, p.a],
	from = |c| Self { r: c[0], g: c[1], b: c[2], a: c[3] });

packed_pixel!(Rgba5551, [r: "5", g: "5", b: "5", a: "1"],
	widths = [5, 5, 5, 1],
	channels = |p| [p.r, p.g, p.b, p.a],
	from = |c| Self { r: c[0], g: c[1], b: c[2], a: c[3] });

packed_pixel!(Rgb565, [r: "5", g: "6", b: "5"],
	widths = [5, 6, 5, 0],
	channels = |p| [p.r, p.g, p.b, 0],
	from = |c| Self { r: c[0], g: c[1], b: c[2] });

packed_pixel!(Rgb555, [x: "1", r: "5", g: "5", b: "5"],
	widths = [5, 5, 5, 0],
	channels = |p| [p.r, p.g, p.b, 0],
	from = |c| Self { x: 0, r: c[0], g: c[1], b: c[2] });


/// Byte-aligned layouts with 8 bits per channel
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum BytePixel {
	Rgba8888,
	Bgra8888,
	Rgb888,
	I8,
	Ai88,
	A8,
}


impl BytePixel {
	pub(crate) const fn bytes(self) -> usize {
		use BytePixel::*;

		match self {
			Rgba8888 | Bgra8888 => 4,
			Rgb888 => 3,
			Ai88 => 2,
			I8 | A8 => 1,
		}
	}


	fn to_rgba8(self, p: &[u8]) -> [u8; 4] {
		use BytePixel::*;

		match self {
			Rgba8888 => [p[0], p[1], p[2], p[3]],
			Bgra8888 => [p[2], p[1], p[0], p[3]],
			Rgb888 => [p[0], p[1], p[2], 0xFF],
			I8 => [p[0], p[0], p[0], 0xFF],
			Ai88 => [p[0], p[0], p[0], p[1]],
			A8 => [0, 0, 0, p[0]],
		}
	}


	#[allow(clippy::cast_possible_truncation)]
	fn from_rgba8(self, rgba: [u8; 4], out: &mut Vec<u8>) {
		use BytePixel::*;

		let [r, g, b, a] = rgba;
		let luma = || ((u32::from(r) * 299 + u32::from(g) * 587 + u32::from(b) * 114 + 500) / 1000) as u8;

		match self {
			Rgba8888 => out.extend([r, g, b, a]),
			Bgra8888 => out.extend([b, g, r, a]),
			Rgb888 => out.extend([r, g, b]),
			I8 => out.push(luma()),
			Ai88 => out.extend([luma(), a]),
			A8 => out.push(a),
		};
	}


	pub(crate) fn convert_to_rgba8_slice(self, data: &[u8]) -> CodecResult<Vec<u8>> {
		if data.len() % self.bytes() != 0 {
			return Err(FormatError(format!("{:?} data is not a multiple of {} bytes", self, self.bytes())));
		};

		let result_len: usize = (data.len().checked() / self.bytes() * 4)
			.ok_or(AllocationFailure(usize::MAX))?;
		let mut result = crate::try_with_capacity(result_len)?;
		data.chunks_exact(self.bytes()).for_each(|p| result.extend(self.to_rgba8(p)));

		Ok(result)
	}


	pub(crate) fn convert_from_rgba8_slice(self, data: &[u8]) -> CodecResult<Vec<u8>> {
		if data.len() % 4 != 0 {
			return Err(InvalidArgument("RGBA buffer length is not a multiple of 4"));
		};

		let result_len: usize = (data.len().checked() / 4 * self.bytes())
			.ok_or(AllocationFailure(usize::MAX))?;
		let mut result = crate::try_with_capacity(result_len)?;
		data.chunks_exact(4).for_each(|p| self.from_rgba8([p[0], p[1], p[2], p[3]], &mut result));

		Ok(result)
	}
}


#[test]
fn rgba5551_bytes() {
	let purple_rgba = vec![0x6B, 0x00, 0x94, 0xFF];
	let purple_5551 = vec![0x25, 0x68];
	assert_eq!(Rgba5551::convert_from_rgba8_slice(&purple_rgba).unwrap(), purple_5551);
	assert_eq!(Rgba5551::convert_to_rgba8_slice(&purple_5551).unwrap(), purple_rgba);

	let clear_5551 = vec![0x24, 0x68];
	let clear_rgba = vec![0x6B, 0x00, 0x94, 0x00];
	assert_eq!(Rgba5551::convert_to_rgba8_slice(&clear_5551).unwrap(), clear_rgba);
}


#[test]
fn rgba4444_bytes() {
	let rgba = vec![0x11, 0x22, 0x33, 0x44];
	let packed = vec![0x34, 0x12];
	assert_eq!(Rgba4444::convert_from_rgba8_slice(&rgba).unwrap(), packed);
	assert_eq!(Rgba4444::convert_to_rgba8_slice(&packed).unwrap(), rgba);
}


#[test]
fn rgb565_and_555_are_opaque() {
	assert_eq!(Rgb565::convert_to_rgba8_slice(&[0xE0, 0x07]).unwrap(), vec![0x00, 0xFF, 0x00, 0xFF]);
	assert_eq!(Rgb565::convert_from_rgba8_slice(&[0xFF, 0xFF, 0xFF, 0x00]).unwrap(), vec![0xFF, 0xFF]);
	assert_eq!(Rgb555::convert_to_rgba8_slice(&[0x1F, 0x80]).unwrap(), vec![0x00, 0x00, 0xFF, 0xFF]);
	assert_eq!(Rgb555::convert_from_rgba8_slice(&[0xFF, 0x00, 0x00, 0xFF]).unwrap(), vec![0x00, 0x7C]);
	assert!(matches!(Rgb565::convert_to_rgba8_slice(&[0xE0]), Err(FormatError(_))));
}


#[test]
fn byte_pixels() {
	assert_eq!(BytePixel::Bgra8888.convert_to_rgba8_slice(&[1, 2, 3, 4]).unwrap(), vec![3, 2, 1, 4]);
	assert_eq!(BytePixel::Ai88.convert_to_rgba8_slice(&[9, 7]).unwrap(), vec![9, 9, 9, 7]);
	assert_eq!(BytePixel::A8.convert_to_rgba8_slice(&[7]).unwrap(), vec![0, 0, 0, 7]);
	assert_eq!(BytePixel::I8.convert_from_rgba8_slice(&[200, 200, 200, 1]).unwrap(), vec![200]);
	assert_eq!(BytePixel::Rgb888.convert_from_rgba8_slice(&[1, 2, 3, 4]).unwrap(), vec![1, 2, 3]);
	assert!(matches!(BytePixel::Rgb888.convert_to_rgba8_slice(&[1, 2]), Err(FormatError(_))));
}
