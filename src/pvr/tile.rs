//! Tile-palette texture payloads and the lossy tile-search encoder.
//!
//! ```text
//! payload := tile_size:u8  reserved:[u8; 3]  tile*
//! tile    := endpoint0:[u8; 4]  endpoint1:[u8; 4]  selectors:[u8; (t*t + 3) / 4]
//! ```
//!
//! Tiles are `t` x `t` texels in row-major order; the last column and row
//! of tiles is padded when `t` does not divide the image.  Each texel has a
//! 2-bit selector, least significant bits first, into the palette
//! `[e0, e1, (2*e0 + e1) / 3, (e0 + 2*e1) / 3]`.  Padded texels get
//! selector 0 and are dropped on decode.

use std::sync::Mutex;

#[cfg(feature = "parallel")]
use rayon::prelude::*;
use image::RgbaImage;

use crate::{CodecResult, PvrEncodingSettings, PvrPixelFormat, Progress, NoProgress, Stop, Unstoppable};
use crate::{MIN_TILE_SIZE, MAX_TILE_SIZE};
use crate::CodecError::*;
use crate::progress::check_stop;
use crate::macros;

use super::write_pvr;


const PAYLOAD_HEADER_SIZE: usize = 4;

/// Power iterations spent finding a tile's principal axis.
const AXIS_ITERATIONS: usize = 8;


type Rgba = [u8; 4];


pub(crate) const fn tile_bytes(tile: usize) -> usize {
	8 + (tile * tile + 3) / 4
}


const fn tile_grid(width: usize, height: usize, tile: usize) -> (usize, usize) {
	((width + tile - 1) / tile, (height + tile - 1) / tile)
}


/// Payload size of a `width` x `height` image in `tile` x `tile` tiles.
pub(crate) fn tile_palette_size(width: usize, height: usize, tile: usize) -> Option<usize> {
	let (tiles_x, tiles_y) = tile_grid(width, height, tile);
	tiles_x.checked_mul(tiles_y)?.checked_mul(tile_bytes(tile))?.checked_add(PAYLOAD_HEADER_SIZE)
}


#[allow(clippy::cast_possible_truncation)]
fn palette(e0: Rgba, e1: Rgba) -> [Rgba; 4] {
	let blend = |a: u8, b: u8| ((2 * u16::from(a) + u16::from(b) + 1) / 3) as u8;
	[e0, e1, std::array::from_fn(|c| blend(e0[c], e1[c])), std::array::from_fn(|c| blend(e1[c], e0[c]))]
}


/// Tile edge a tile-palette payload was written with.
///
/// # Errors
/// - [`FormatError`]: The payload is empty or names a tile edge outside
///   `MIN_TILE_SIZE..=MAX_TILE_SIZE`.
pub(crate) fn payload_tile_size(payload: &[u8]) -> CodecResult<usize> {
	let tile = *payload.first().ok_or_else(|| FormatError("empty tile palette payload".into()))?;

	if !(MIN_TILE_SIZE..=MAX_TILE_SIZE).contains(&u32::from(tile)) {
		return Err(FormatError(format!("invalid tile size {} in tile palette payload", tile)));
	};

	Ok(usize::from(tile))
}


/// Decode a tile-palette payload into RGBA8888.
///
/// # Errors
/// - [`FormatError`]: The tile size is invalid or the payload is too short.
/// - [`AllocationFailure`]: The output could not be allocated.
pub(crate) fn decode_tile_palette(payload: &[u8], width: usize, height: usize) -> CodecResult<Vec<u8>> {
	let tile = payload_tile_size(payload)?;
	let needed = tile_palette_size(width, height, tile).ok_or(AllocationFailure(usize::MAX))?;

	if payload.len() < needed {
		return Err(FormatError(format!("tile palette payload holds {} of {} bytes", payload.len(), needed)));
	};

	let (tiles_x, _) = tile_grid(width, height, tile);
	let output_len = width.checked_mul(height).and_then(|n| n.checked_mul(4)).ok_or(AllocationFailure(usize::MAX))?;
	let mut output = crate::try_alloc(output_len)?;

	for (index, block) in payload[PAYLOAD_HEADER_SIZE..needed].chunks_exact(tile_bytes(tile)).enumerate() {
		let (tx, ty) = (index % tiles_x, index / tiles_x);
		let colours = palette([block[0], block[1], block[2], block[3]], [block[4], block[5], block[6], block[7]]);
		let selectors = &block[8..];

		for i in 0..tile * tile {
			let (x, y) = (tx * tile + i % tile, ty * tile + i / tile);

			if x >= width || y >= height {
				continue;
			};

			let selector = (selectors[i / 4] >> ((i % 4) * 2)) & 3;
			let at = (y * width + x) * 4;
			output[at..at + 4].copy_from_slice(&colours[usize::from(selector)]);
		};
	};

	Ok(output)
}


/// Result of a lossy encode
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PvrEncoded {
	/// Complete PVR container.
	pub data: Vec<u8>,
	/// Tile edge the encoder settled on.
	pub tile_size: u32,
}


/// Lossy RGBA to tile-palette PVR encoder
///
/// Every tile is encoded independently: the encoder tries a set of endpoint
/// pairs spread along the tile's principal colour axis, plus the tile's
/// bounding box, and keeps the pair whose palette gives the least weighted
/// squared error.  Output depends only on the input and the settings.
///
/// # Example
/// ```
/// # use frame_codec::{PvrEncoder, PvrEncodingSettings, decompress_pvr};
/// let pixels = [40u8, 80, 120, 255].repeat(8 * 8);
/// let encoded = PvrEncoder::new(PvrEncodingSettings::default()).encode(&pixels, 8, 8).unwrap();
/// assert_eq!(encoded.tile_size, 4);
/// assert_eq!(decompress_pvr(&encoded.data).unwrap().into_raw(), pixels);
/// ```
pub struct PvrEncoder<'a> {
	settings: PvrEncodingSettings,
	stop: &'a (dyn Stop + Sync),
	progress: &'a dyn Progress,
}


impl std::fmt::Debug for PvrEncoder<'_> {
	fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
		f.debug_struct("PvrEncoder").field("settings", &self.settings).finish_non_exhaustive()
	}
}


impl<'a> PvrEncoder<'a> {
	/// Encoder that never stops early and reports progress nowhere.
	pub fn new(settings: PvrEncodingSettings) -> Self {
		Self { settings, stop: &Unstoppable, progress: &NoProgress }
	}


	/// Poll `stop` before each row of tiles.
	pub fn with_stop(self, stop: &'a (dyn Stop + Sync)) -> Self {
		Self { stop, ..self }
	}


	/// Report the fraction of tile rows done to `progress`.
	pub fn with_progress(self, progress: &'a dyn Progress) -> Self {
		Self { progress, ..self }
	}


	/// Encode `image`, see [`PvrEncoder::encode`].
	///
	/// # Errors
	/// See [`PvrEncoder::encode`].
	pub fn encode_image(&self, image: &RgbaImage) -> CodecResult<PvrEncoded> {
		let (width, height) = image.dimensions();
		self.encode(image.as_raw(), width, height)
	}


	/// Encode `width` x `height` RGBA8888 texels into a PVR container.
	///
	/// # Errors
	/// - [`InvalidArgument`]: A dimension is zero, `rgba` does not hold
	///   exactly `width * height` texels, or the settings are invalid.
	/// - [`Cancelled`]: The stop probe fired; no output is produced.
	/// - [`AllocationFailure`]: The output could not be allocated.
	pub fn encode(&self, rgba: &[u8], width: u32, height: u32) -> CodecResult<PvrEncoded> {
		self.settings.validate()?;

		if width == 0 || height == 0 {
			return Err(InvalidArgument("image dimensions must be non-zero"));
		};

		let (w, h) = (width as usize, height as usize);

		if w.checked_mul(h).and_then(|n| n.checked_mul(4)) != Some(rgba.len()) {
			return Err(InvalidArgument("RGBA buffer length disagrees with the image dimensions"));
		};

		let tile_size = self.settings.choose_tile_size(width, height);
		let tile = tile_size as usize;
		let payload = self.encode_payload(rgba, w, h, tile)?;

		macros::log!(debug, "PvrEncoder: {}x{} {} -> tile {}, {} bytes", width, height, self.settings, tile_size, payload.len());

		let data = write_pvr(PvrPixelFormat::TilePalette, width, height, &payload)?;
		Ok(PvrEncoded { data, tile_size })
	}


	fn encode_payload(&self, rgba: &[u8], width: usize, height: usize, tile: usize) -> CodecResult<Vec<u8>> {
		let (_, tiles_y) = tile_grid(width, height, tile);
		let needed = tile_palette_size(width, height, tile).ok_or(AllocationFailure(usize::MAX))?;
		let mut payload = crate::try_with_capacity(needed)?;

		let tile_byte = u8::try_from(tile).map_err(|_| InvalidArgument("tile size must be between 2 and 16"))?;
		payload.extend([tile_byte, 0, 0, 0]);

		check_stop(self.stop)?;
		self.progress.report(0.0);

		let search = TileSearch::new(&self.settings);
		let rows_done = Mutex::new(0usize);

		let encode_row = |ty: usize| -> CodecResult<Vec<u8>> {
			check_stop(self.stop)?;
			let row = search.encode_row(rgba, width, height, tile, ty);

			let mut done = rows_done.lock().map_err(|_| InvalidState("progress counter poisoned"))?;
			*done += 1;
			#[allow(clippy::cast_precision_loss)]
			let fraction = *done as f32 / tiles_y as f32;
			self.progress.report(fraction);

			Ok(row)
		};

		#[cfg(feature = "parallel")]
		let rows: Vec<Vec<u8>> = (0..tiles_y).into_par_iter().map(encode_row).collect::<CodecResult<_>>()?;
		#[cfg(not(feature = "parallel"))]
		let rows: Vec<Vec<u8>> = (0..tiles_y).map(encode_row).collect::<CodecResult<_>>()?;

		rows.into_iter().for_each(|r| payload.extend(r));

		Ok(payload)
	}
}


/// Encode RGBA8888 texels with the lossy tile-search encoder.
///
/// # Errors
/// See [`PvrEncoder::encode`].
pub fn compress_pvr_lossy(rgba: &[u8], (width, height): (u32, u32), settings: &PvrEncodingSettings) -> CodecResult<PvrEncoded> {
	PvrEncoder::new(*settings).encode(rgba, width, height)
}


struct TileSearch {
	weights: [f32; 4],
	/// Square roots of `weights`; the search runs in this scaled space so
	/// plain distances match the weighted error.
	scale: [f32; 4],
	samples: usize,
}


impl TileSearch {
	fn new(settings: &PvrEncodingSettings) -> Self {
		let weights = settings.weighting.as_array();
		let scale = weights.map(f32::sqrt);
		Self { weights, scale, samples: settings.samples_per_pixel as usize }
	}


	fn error(&self, a: Rgba, b: Rgba) -> f32 {
		(0..4).map(|c| {
			let d = f32::from(a[c]) - f32::from(b[c]);
			self.weights[c] * d * d
		}).sum()
	}


	fn nearest(&self, colours: &[Rgba; 4], texel: Rgba) -> (u8, f32) {
		let mut best = (0u8, self.error(colours[0], texel));

		for (i, colour) in colours.iter().enumerate().skip(1) {
			let e = self.error(*colour, texel);

			if e < best.1 {
				#[allow(clippy::cast_possible_truncation)]
				let index = i as u8;
				best = (index, e);
			};
		};

		best
	}


	fn encode_row(&self, rgba: &[u8], width: usize, height: usize, tile: usize, ty: usize) -> Vec<u8> {
		let (tiles_x, _) = tile_grid(width, height, tile);
		let mut out = Vec::with_capacity(tiles_x * tile_bytes(tile));

		for tx in 0..tiles_x {
			let texels: Vec<(usize, Rgba)> = (0..tile * tile)
				.filter_map(|i| {
					let (x, y) = (tx * tile + i % tile, ty * tile + i / tile);
					let at = (y * width + x) * 4;
					(x < width && y < height).then(|| (i, [rgba[at], rgba[at + 1], rgba[at + 2], rgba[at + 3]]))
				})
				.collect();

			self.encode_tile(&texels, tile, &mut out);
		};

		out
	}


	fn encode_tile(&self, texels: &[(usize, Rgba)], tile: usize, out: &mut Vec<u8>) {
		let mut best: Option<(f32, Rgba, Rgba)> = None;

		for (e0, e1) in self.candidates(texels) {
			let colours = palette(e0, e1);
			let error: f32 = texels.iter().map(|(_, t)| self.nearest(&colours, *t).1).sum();

			if best.map_or(true, |(e, _, _)| error < e) {
				best = Some((error, e0, e1));
			};
		};

		let (_, e0, e1) = best.unwrap_or((0.0, [0; 4], [0; 4]));
		let colours = palette(e0, e1);
		let mut selectors = vec![0u8; (tile * tile + 3) / 4];

		for (i, texel) in texels {
			let (selector, _) = self.nearest(&colours, *texel);
			selectors[i / 4] |= selector << ((i % 4) * 2);
		};

		out.extend(e0);
		out.extend(e1);
		out.extend(selectors);
	}


	#[allow(clippy::cast_precision_loss)]
	fn candidates(&self, texels: &[(usize, Rgba)]) -> Vec<(Rgba, Rgba)> {
		if texels.is_empty() {
			return vec![];
		};

		let mut lo = [u8::MAX; 4];
		let mut hi = [u8::MIN; 4];

		for (_, t) in texels {
			for c in 0..4 {
				lo[c] = lo[c].min(t[c]);
				hi[c] = hi[c].max(t[c]);
			};
		};

		let n = texels.len() as f32;
		let raw_mean: [f32; 4] = std::array::from_fn(|c| texels.iter().map(|(_, t)| f32::from(t[c])).sum::<f32>() / n);
		let scaled: Vec<[f32; 4]> = texels.iter().map(|(_, t)| std::array::from_fn(|c| f32::from(t[c]) * self.scale[c])).collect();
		let mean: [f32; 4] = std::array::from_fn(|c| raw_mean[c] * self.scale[c]);
		let axis = principal_axis(&scaled, mean);

		let projections = scaled.iter().map(|x| (0..4).map(|c| (x[c] - mean[c]) * axis[c]).sum::<f32>());
		let (min_t, max_t) = projections.fold((f32::MAX, f32::MIN), |(a, b), t| (a.min(t), b.max(t)));
		let range = max_t - min_t;

		let point = |t: f32| -> Rgba {
			std::array::from_fn(|c| {
				let v = if self.scale[c] > 0.0 { (mean[c] + axis[c] * t) / self.scale[c] } else { raw_mean[c] };
				#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
				let v = v.round().clamp(0.0, 255.0) as u8;
				v
			})
		};

		let steps = (2 * self.samples) as f32;
		let mut candidates = Vec::with_capacity(self.samples.checked_mul(self.samples).map_or(1, |n| n.saturating_add(1)));
		candidates.push((lo, hi));

		for a in 0..self.samples {
			for b in 0..self.samples {
				let lo_t = min_t + range * (a as f32 / steps);
				let hi_t = max_t - range * (b as f32 / steps);
				candidates.push((point(lo_t), point(hi_t)));
			};
		};

		candidates
	}
}


/// Dominant eigenvector of the texels' covariance, or zero for a flat tile.
#[allow(clippy::cast_possible_truncation)]
fn principal_axis(scaled: &[[f32; 4]], mean: [f32; 4]) -> [f32; 4] {
	let mut cov = [[0f64; 4]; 4];

	for x in scaled {
		let d: [f64; 4] = std::array::from_fn(|c| f64::from(x[c] - mean[c]));

		for i in 0..4 {
			for j in 0..4 {
				cov[i][j] += d[i] * d[j];
			};
		};
	};

	let (k, largest) = (0..4).map(|i| (i, cov[i][i])).fold((0, 0.0), |best, c| if c.1 > best.1 { c } else { best });

	if largest < 1e-9 {
		return [0.0; 4];
	};

	let mut v: [f64; 4] = std::array::from_fn(|i| cov[i][k]);

	for _ in 0..AXIS_ITERATIONS {
		let norm = v.iter().map(|x| x * x).sum::<f64>().sqrt();

		if norm < 1e-12 {
			return [0.0; 4];
		};

		let unit = v.map(|x| x / norm);
		v = std::array::from_fn(|i| (0..4).map(|j| cov[i][j] * unit[j]).sum());
	};

	let norm = v.iter().map(|x| x * x).sum::<f64>().sqrt();

	if norm < 1e-12 {
		return [0.0; 4];
	};

	v.map(|x| (x / norm) as f32)
}


#[cfg(test)]
fn noisy_image(width: usize, height: usize, seed: u32) -> Vec<u8> {
	let mut state = seed;

	(0..width * height * 4)
		.map(|i| {
			state = state.wrapping_mul(1_664_525).wrapping_add(1_013_904_223);
			let base = ((i / 4) % width * 255 / width) as u32;
			(base.wrapping_add(state >> 28) & 0xFF) as u8
		})
		.collect()
}


#[cfg(test)]
fn weighted_error(a: &[u8], b: &[u8]) -> f64 {
	a.iter().zip(b).map(|(x, y)| (f64::from(*x) - f64::from(*y)).powi(2)).sum()
}


#[cfg(test)]
fn decode_container(data: &[u8]) -> RgbaImage {
	crate::decompress_pvr(data).unwrap()
}


#[test]
fn palette_blends() {
	let colours = palette([0, 0, 0, 255], [255, 90, 3, 0]);
	assert_eq!(colours[2], [85, 30, 1, 170]);
	assert_eq!(colours[3], [170, 60, 2, 85]);
}


#[test]
fn deterministic_output() {
	let image = noisy_image(16, 16, 7);
	let settings = PvrEncodingSettings { samples_per_pixel: 4, ..Default::default() };
	let first = compress_pvr_lossy(&image, (16, 16), &settings).unwrap();
	let second = compress_pvr_lossy(&image, (16, 16), &settings).unwrap();
	assert_eq!(first, second);
}


#[test]
fn solid_tiles_are_exact() {
	let image = [10u8, 200, 30, 255].repeat(8 * 8);
	let encoded = compress_pvr_lossy(&image, (8, 8), &PvrEncodingSettings::default()).unwrap();
	assert_eq!(decode_container(&encoded.data).into_raw(), image);
}


#[test]
fn two_colour_tiles_are_near_exact() {
	let image: Vec<u8> = (0..64).flat_map(|i| if (i + i / 8) % 2 == 0 { [10, 20, 30, 255] } else { [200, 100, 50, 128] }).collect();
	let encoded = compress_pvr_lossy(&image, (8, 8), &PvrEncodingSettings { samples_per_pixel: 1, ..Default::default() }).unwrap();
	let decoded = decode_container(&encoded.data).into_raw();
	assert!(decoded.iter().zip(&image).all(|(a, b)| a.abs_diff(*b) <= 1));
}


#[test]
fn padded_boundary_17x17() {
	let image = noisy_image(17, 17, 3);
	let encoded = compress_pvr_lossy(&image, (17, 17), &PvrEncodingSettings::default()).unwrap();
	assert_eq!(encoded.tile_size, 4);
	assert_eq!(encoded.data.len(), 52 + 4 + 5 * 5 * tile_bytes(4));

	let decoded = decode_container(&encoded.data);
	assert_eq!(decoded.dimensions(), (17, 17));
}


#[test]
fn padded_boundary_solid_is_exact() {
	let image = [60u8, 140, 220, 200].repeat(17 * 17);
	let decoded = decode_container(&compress_pvr_lossy(&image, (17, 17), &PvrEncodingSettings::default()).unwrap().data);
	assert_eq!(decoded.as_raw(), &image);

	for i in 0..17 {
		assert_eq!(decoded.get_pixel(16, i).0, [60, 140, 220, 200]);
		assert_eq!(decoded.get_pixel(i, 16).0, [60, 140, 220, 200]);
	};
}


#[test]
fn padded_boundary_gradient() {
	let texel = |x: u32, y: u32| {
		let s = (x + y) as u8;
		[4 * s, 2 * s, 255 - 3 * s, 255]
	};
	let image: Vec<u8> = (0..17).flat_map(|y| (0..17).flat_map(move |x| texel(x, y))).collect();

	let decoded = decode_container(&compress_pvr_lossy(&image, (17, 17), &PvrEncodingSettings::default()).unwrap().data);

	for (x, y, pixel) in decoded.enumerate_pixels() {
		let expected = texel(x, y);
		for c in 0..4 {
			assert!(pixel.0[c].abs_diff(expected[c]) <= 8, "texel ({}, {}) channel {}: {} vs {}", x, y, c, pixel.0[c], expected[c]);
		};
	};
}


#[test]
fn oversized_search_rejected() {
	let settings = PvrEncodingSettings { samples_per_pixel: 1 << 31, ..Default::default() };
	assert!(matches!(compress_pvr_lossy(&[7, 8, 9, 255].repeat(16), (4, 4), &settings), Err(InvalidArgument(_))));
}


#[test]
fn alternate_tile_size() {
	let image = noisy_image(12, 12, 5);
	let settings = PvrEncodingSettings { tile_size: 8, alt_tile_size: Some(4), ..Default::default() };
	assert_eq!(compress_pvr_lossy(&image, (12, 12), &settings).unwrap().tile_size, 4);

	let settings = PvrEncodingSettings { tile_size: 8, alt_tile_size: Some(5), ..Default::default() };
	assert_eq!(compress_pvr_lossy(&image, (12, 12), &settings).unwrap().tile_size, 8);
}


#[test]
fn more_samples_never_hurt() {
	let image = noisy_image(16, 16, 11);
	let error_with = |samples| {
		let settings = PvrEncodingSettings { samples_per_pixel: samples, ..Default::default() };
		let encoded = compress_pvr_lossy(&image, (16, 16), &settings).unwrap();
		weighted_error(&decode_container(&encoded.data).into_raw(), &image)
	};

	assert!(error_with(4) <= error_with(1));
}


#[test]
fn zero_weight_channel_ignored() {
	let image: Vec<u8> = (0..16u8).flat_map(|i| [100, 100, 100, i * 16]).collect();
	let settings = PvrEncodingSettings { weighting: crate::ChannelWeighting::OPAQUE, ..Default::default() };
	let decoded = decode_container(&compress_pvr_lossy(&image, (4, 4), &settings).unwrap().data).into_raw();
	assert!(decoded.chunks_exact(4).all(|p| p[..3] == [100, 100, 100]));
}


#[test]
fn invalid_arguments() {
	let image = [0u8; 4 * 4 * 4];
	let settings = PvrEncodingSettings::default();
	assert!(matches!(compress_pvr_lossy(&image, (4, 3), &settings), Err(InvalidArgument(_))));
	assert!(matches!(compress_pvr_lossy(&[], (0, 0), &settings), Err(InvalidArgument(_))));
	let bad_tile = PvrEncodingSettings { tile_size: 1, ..Default::default() };
	assert!(matches!(compress_pvr_lossy(&image, (4, 4), &bad_tile), Err(InvalidArgument(_))));
}


#[test]
fn cancellation() {
	use std::sync::atomic::{AtomicUsize, Ordering};

	struct StopAfter(AtomicUsize);

	impl Stop for StopAfter {
		fn check(&self) -> Result<(), enough::StopReason> {
			if self.0.fetch_sub(1, Ordering::SeqCst) == 0 {
				Err(enough::StopReason::Cancelled)
			} else {
				Ok(())
			}
		}
	}

	let image = noisy_image(16, 16, 1);
	let stop = StopAfter(AtomicUsize::new(2));
	let encoder = PvrEncoder::new(PvrEncodingSettings::default()).with_stop(&stop);
	assert_eq!(encoder.encode(&image, 16, 16), Err(Cancelled));
}


#[test]
fn progress_is_monotonic() {
	let seen = Mutex::new(vec![]);
	let sink = |f: f32| seen.lock().unwrap().push(f);
	let image = noisy_image(16, 12, 9);

	let _ = PvrEncoder::new(PvrEncodingSettings::default()).with_progress(&sink).encode(&image, 16, 12).unwrap();

	let seen = seen.into_inner().unwrap();
	assert_eq!(seen.len(), 4);
	assert!(seen.windows(2).all(|w| w[0] <= w[1]));
	assert_eq!(seen.last(), Some(&1.0));
}


#[test]
fn truncated_payloads() {
	assert!(matches!(decode_tile_palette(&[], 4, 4), Err(FormatError(_))));
	assert!(matches!(decode_tile_palette(&[1, 0, 0, 0], 4, 4), Err(FormatError(_))));
	assert!(matches!(decode_tile_palette(&[4, 0, 0, 0, 1, 2], 4, 4), Err(FormatError(_))));
}
