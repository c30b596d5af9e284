//! PVRTC 2bpp and 4bpp decoding.
//!
//! Each 64-bit word holds 32 bits of modulation data followed by two
//! low-precision colours.  A texel blends the bilinearly upscaled colour A
//! and colour B images of the four words around it, weighted by its
//! modulation value.  Words are stored in twiddled (Morton) order with the
//! y coordinate in the least significant bit.

use byteorder::{ByteOrder, LittleEndian};

use crate::{CodecResult, try_alloc};
use crate::CodecError::*;


const WORD_HEIGHT: usize = 4;


/// Bits per texel of a PVRTC texture
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum PvrtcBpp {
	Two,
	Four,
}


impl PvrtcBpp {
	const fn word_width(self) -> usize {
		match self {
			PvrtcBpp::Two => 8,
			PvrtcBpp::Four => 4,
		}
	}


	/// Texture dimensions padded to the 2x2-word minimum.
	pub(crate) fn padded_dimensions(self, width: usize, height: usize) -> (usize, usize) {
		let word_width = self.word_width();
		(width.max(word_width * 2), height.max(WORD_HEIGHT * 2))
	}


	/// Bytes taken by a level of the given size.
	pub(crate) fn level_size(self, width: usize, height: usize) -> Option<usize> {
		let (w, h) = self.padded_dimensions(width, height);
		let x_words = (w + self.word_width() - 1) / self.word_width();
		let y_words = (h + WORD_HEIGHT - 1) / WORD_HEIGHT;
		x_words.checked_mul(y_words)?.checked_mul(8)
	}
}


#[derive(Debug, Clone, Copy)]
struct Word {
	modulation: u32,
	colour: u32,
}


/// Colour with 5-bit RGB and 4-bit alpha.
type Colour = [i32; 4];


fn colour_a(word: Word) -> Colour {
	let c = word.colour;

	if c & 0x8000 != 0 {
		[((c & 0x7C00) >> 10) as i32, ((c & 0x3E0) >> 5) as i32, ((c & 0x1E) | ((c & 0x1E) >> 4)) as i32, 0xF]
	} else {
		[
			(((c & 0xF00) >> 7) | ((c & 0xF00) >> 11)) as i32,
			(((c & 0xF0) >> 3) | ((c & 0xF0) >> 7)) as i32,
			(((c & 0xE) << 1) | ((c & 0xE) >> 2)) as i32,
			((c & 0x7000) >> 11) as i32,
		]
	}
}


fn colour_b(word: Word) -> Colour {
	let c = word.colour;

	if c & 0x8000_0000 != 0 {
		[((c & 0x7C00_0000) >> 26) as i32, ((c & 0x03E0_0000) >> 21) as i32, ((c & 0x001F_0000) >> 16) as i32, 0xF]
	} else {
		[
			(((c & 0x0F00_0000) >> 23) | ((c & 0x0F00_0000) >> 27)) as i32,
			(((c & 0x00F0_0000) >> 19) | ((c & 0x00F0_0000) >> 23)) as i32,
			(((c & 0x000F_0000) >> 15) | ((c & 0x000F_0000) >> 19)) as i32,
			((c & 0x7000_0000) >> 27) as i32,
		]
	}
}


/// Morton index of word `(x, y)` in an `x_words` by `y_words` grid, both
/// powers of two.  Bits of the longer axis that have no partner are
/// appended above the interleaved ones.
pub(crate) fn twiddle(x: usize, y: usize, x_words: usize, y_words: usize) -> usize {
	let min_dimension = x_words.min(y_words);
	let mut twiddled = 0;
	let mut bit = 1;
	let mut shift = 0;

	while bit < min_dimension {
		if y & bit != 0 {
			twiddled |= 1 << (2 * shift);
		};

		if x & bit != 0 {
			twiddled |= 1 << (2 * shift + 1);
		};

		bit <<= 1;
		shift += 1;
	};

	let rest = if x_words > y_words { x } else { y };
	twiddled | ((rest >> shift) << (2 * shift))
}


/// Upscale four word colours into the `word_width` x 4 texels spanning the
/// word centres, returning 8-bit channels.
fn interpolate(corners: [Colour; 4], bpp: PvrtcBpp) -> Vec<Colour> {
	let word_width = bpp.word_width();
	let [p, q, r, s] = corners;
	let w = word_width as i32;

	let mut hp: Colour = p.map(|c| c * w);
	let mut hr: Colour = r.map(|c| c * w);
	let mut out = vec![[0i32; 4]; word_width * WORD_HEIGHT];

	for x in 0..word_width {
		let mut result = hp.map(|c| c * 4);
		let dy: Colour = std::array::from_fn(|i| hr[i] - hp[i]);

		for y in 0..WORD_HEIGHT {
			let texel = &mut out[y * word_width + x];

			for i in 0..3 {
				texel[i] = match bpp {
					PvrtcBpp::Two => (result[i] >> 7) + (result[i] >> 2),
					PvrtcBpp::Four => (result[i] >> 6) + (result[i] >> 1),
				};
			};

			texel[3] = match bpp {
				PvrtcBpp::Two => (result[3] >> 5) + (result[3] >> 1),
				PvrtcBpp::Four => (result[3] >> 4) + result[3],
			};

			(0..4).for_each(|i| result[i] += dy[i]);
		};

		(0..4).for_each(|i| {
			hp[i] += q[i] - p[i];
			hr[i] += s[i] - r[i];
		});
	};

	out
}


/// Modulation values and modes of a 2x2 word neighbourhood, indexed
/// `[y][x]`.
struct ModulationGrid {
	values: [[i32; 16]; 8],
	modes: [[u8; 16]; 8],
}


const REPEATED_2BPP: [i32; 4] = [0, 3, 5, 8];


impl ModulationGrid {
	fn new() -> Self {
		Self { values: [[0; 16]; 8], modes: [[0; 16]; 8] }
	}


	fn unpack(&mut self, word: Word, offset_x: usize, offset_y: usize, bpp: PvrtcBpp) {
		let mut mode = (word.colour & 1) as u8;
		let mut bits = word.modulation;

		match bpp {
			PvrtcBpp::Two if mode == 1 => {
				if bits & 1 != 0 {
					mode = if bits & (1 << 20) != 0 { 3 } else { 2 };

					if bits & (1 << 21) != 0 {
						bits |= 1 << 20;
					} else {
						bits &= !(1 << 20);
					};
				};

				if bits & 2 != 0 {
					bits |= 1;
				} else {
					bits &= !1;
				};

				for y in 0..WORD_HEIGHT {
					for x in 0..8 {
						self.modes[y + offset_y][x + offset_x] = mode;

						if (x ^ y) & 1 == 0 {
							self.values[y + offset_y][x + offset_x] = (bits & 3) as i32;
							bits >>= 2;
						};
					};
				};
			},

			PvrtcBpp::Two => {
				for y in 0..WORD_HEIGHT {
					for x in 0..8 {
						self.modes[y + offset_y][x + offset_x] = 0;
						self.values[y + offset_y][x + offset_x] = if bits & 1 != 0 { 3 } else { 0 };
						bits >>= 1;
					};
				};
			},

			PvrtcBpp::Four => {
				for y in 0..WORD_HEIGHT {
					for x in 0..4 {
						let v = (bits & 3) as i32;
						self.values[y + offset_y][x + offset_x] = match (mode, v) {
							(1, 1) => 4,
							(1, 2) => 14,
							(1, 3) => 8,
							(_, 0) => 0,
							(_, v) => v * 3 - i32::from(v > 1),
						};
						bits >>= 2;
					};
				};
			},
		};
	}


	fn value_at(&self, x: usize, y: usize, bpp: PvrtcBpp) -> i32 {
		if bpp == PvrtcBpp::Four {
			return self.values[y][x];
		};

		let rep = |yy: usize, xx: usize| REPEATED_2BPP[self.values[yy][xx] as usize];

		match self.modes[y][x] {
			0 => rep(y, x),
			_ if (x ^ y) & 1 == 0 => rep(y, x),
			1 => (rep(y - 1, x) + rep(y + 1, x) + rep(y, x - 1) + rep(y, x + 1) + 2) / 4,
			2 => (rep(y, x - 1) + rep(y, x + 1) + 1) / 2,
			_ => (rep(y - 1, x) + rep(y + 1, x) + 1) / 2,
		}
	}
}


/// Texels between the centre of the top left word and the centre of the
/// bottom right one; `words` are in row-major order.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn decode_quad(words: [Word; 4], bpp: PvrtcBpp) -> Vec<[u8; 4]> {
	let word_width = bpp.word_width();
	let mut grid = ModulationGrid::new();

	grid.unpack(words[0], 0, 0, bpp);
	grid.unpack(words[1], word_width, 0, bpp);
	grid.unpack(words[2], 0, WORD_HEIGHT, bpp);
	grid.unpack(words[3], word_width, WORD_HEIGHT, bpp);

	let a = interpolate(words.map(colour_a), bpp);
	let b = interpolate(words.map(colour_b), bpp);

	let mut out = Vec::with_capacity(word_width * WORD_HEIGHT);

	for y in 0..WORD_HEIGHT {
		for x in 0..word_width {
			let mut modulation = grid.value_at(x + word_width / 2, y + WORD_HEIGHT / 2, bpp);
			let punch_through = modulation > 10;

			if punch_through {
				modulation -= 10;
			};

			let (ca, cb) = (a[y * word_width + x], b[y * word_width + x]);
			let mut texel = [0u8; 4];

			for i in 0..4 {
				texel[i] = ((ca[i] * (8 - modulation) + cb[i] * modulation) / 8).clamp(0, 255) as u8;
			};

			if punch_through {
				texel[3] = 0;
			};

			out.push(texel);
		};
	};

	out
}


/// Decode the base level of a PVRTC texture into RGBA8888.
///
/// # Errors
/// - [`FormatError`]: A dimension is not a power of two, or `data` is shorter
///   than the level.
/// - [`AllocationFailure`]: The output could not be allocated.
pub(crate) fn decode_pvrtc(data: &[u8], width: usize, height: usize, bpp: PvrtcBpp) -> CodecResult<Vec<u8>> {
	if !width.is_power_of_two() || !height.is_power_of_two() {
		return Err(FormatError(format!("PVRTC dimensions {}x{} are not powers of two", width, height)));
	};

	let word_width = bpp.word_width();
	let (full_width, full_height) = bpp.padded_dimensions(width, height);
	let (x_words, y_words) = (full_width / word_width, full_height / WORD_HEIGHT);
	let needed = bpp.level_size(width, height).ok_or(AllocationFailure(usize::MAX))?;
	let data = data.get(..needed)
		.ok_or_else(|| FormatError(format!("PVRTC payload holds {} of {} bytes", data.len(), needed)))?;

	let words: Vec<Word> = data
		.chunks_exact(8)
		.map(|w| Word { modulation: LittleEndian::read_u32(&w[..4]), colour: LittleEndian::read_u32(&w[4..]) })
		.collect();

	let mut full = try_alloc(full_width * full_height * 4)?;

	for wy in 0..y_words {
		for wx in 0..x_words {
			let (x1, y1) = ((wx + 1) % x_words, (wy + 1) % y_words);
			let quad = [
				words[twiddle(wx, wy, x_words, y_words)],
				words[twiddle(x1, wy, x_words, y_words)],
				words[twiddle(wx, y1, x_words, y_words)],
				words[twiddle(x1, y1, x_words, y_words)],
			];

			for (i, texel) in decode_quad(quad, bpp).into_iter().enumerate() {
				let ox = (wx * word_width + word_width / 2 + i % word_width) % full_width;
				let oy = (wy * WORD_HEIGHT + WORD_HEIGHT / 2 + i / word_width) % full_height;
				let at = (oy * full_width + ox) * 4;
				full[at..at + 4].copy_from_slice(&texel);
			};
		};
	};

	if (full_width, full_height) == (width, height) {
		return Ok(full);
	};

	let mut cropped = crate::try_with_capacity(width * height * 4)?;

	for row in full.chunks_exact(full_width * 4).take(height) {
		cropped.extend_from_slice(&row[..width * 4]);
	};

	Ok(cropped)
}


#[cfg(test)]
fn uniform_texture(words: usize, modulation: u32, colour: u32) -> Vec<u8> {
	let mut word = modulation.to_le_bytes().to_vec();
	word.extend(colour.to_le_bytes());
	word.repeat(words)
}


#[cfg(test)]
const BLACK_A_WHITE_B: u32 = 0xFFFF_8000;


#[test]
fn twiddle_order() {
	assert_eq!(twiddle(0, 0, 2, 2), 0);
	assert_eq!(twiddle(0, 1, 2, 2), 1);
	assert_eq!(twiddle(1, 0, 2, 2), 2);
	assert_eq!(twiddle(1, 1, 2, 2), 3);
	assert_eq!(twiddle(3, 0, 4, 2), 6);
	assert_eq!(twiddle(0, 3, 2, 4), 5);
}


#[test]
fn colour_layouts() {
	assert_eq!(colour_a(Word { modulation: 0, colour: 0x0000_FFFF }), [31, 31, 31, 15]);
	assert_eq!(colour_b(Word { modulation: 0, colour: 0xFFFF_0000 }), [31, 31, 31, 15]);
	assert_eq!(colour_a(Word { modulation: 0, colour: 0x0000_7FFE }), [31, 31, 31, 14]);
	assert_eq!(colour_b(Word { modulation: 0, colour: 0x7FFF_0000 }), [31, 31, 31, 14]);
}


#[test]
fn pvrtc4_modulation_extremes() {
	let black = decode_pvrtc(&uniform_texture(4, 0, BLACK_A_WHITE_B), 8, 8, PvrtcBpp::Four).unwrap();
	assert_eq!(black, [0u8, 0, 0, 255].repeat(64));

	let white = decode_pvrtc(&uniform_texture(4, 0xFFFF_FFFF, BLACK_A_WHITE_B), 8, 8, PvrtcBpp::Four).unwrap();
	assert_eq!(white, [255u8; 4].repeat(64));
}


#[test]
fn pvrtc4_punch_through() {
	let clear = decode_pvrtc(&uniform_texture(4, 0xAAAA_AAAA, BLACK_A_WHITE_B | 1), 8, 8, PvrtcBpp::Four).unwrap();
	assert!(clear.chunks_exact(4).all(|p| p[3] == 0));
}


#[test]
fn pvrtc2_direct_mode() {
	let white = decode_pvrtc(&uniform_texture(4, 0xFFFF_FFFF, BLACK_A_WHITE_B), 16, 8, PvrtcBpp::Two).unwrap();
	assert_eq!(white, [255u8; 4].repeat(128));

	let black = decode_pvrtc(&uniform_texture(4, 0, BLACK_A_WHITE_B | 1), 16, 8, PvrtcBpp::Two).unwrap();
	assert_eq!(black, [0u8, 0, 0, 255].repeat(128));
}


#[test]
fn small_textures_are_cropped() {
	assert_eq!(PvrtcBpp::Four.level_size(4, 4), Some(32));
	assert_eq!(PvrtcBpp::Two.level_size(8, 8), Some(32));
	let texels = decode_pvrtc(&uniform_texture(4, 0xFFFF_FFFF, BLACK_A_WHITE_B), 4, 2, PvrtcBpp::Four).unwrap();
	assert_eq!(texels, [255u8; 4].repeat(8));
}


#[test]
fn invalid_textures() {
	assert!(matches!(decode_pvrtc(&uniform_texture(16, 0, 0), 12, 8, PvrtcBpp::Four), Err(FormatError(_))));
	assert!(matches!(decode_pvrtc(&uniform_texture(3, 0, 0), 8, 8, PvrtcBpp::Four), Err(FormatError(_))));
}
