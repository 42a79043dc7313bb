//! # Grayscale-to-1-bit Dithering
//!
//! Three interchangeable algorithms converting an 8-bit grayscale image into
//! a two-level image suitable for the panel: Floyd-Steinberg and Atkinson
//! error diffusion, and ordered (Bayer) thresholding. All three are pure
//! functions over pixel buffers: the input is never mutated and identical
//! inputs produce byte-identical outputs, which the album-art cache relies on.
//!
//! The output uses the same `GrayImage` representation as the input but every
//! pixel is either 0 (black) or 255 (white).

use image::GrayImage;
use serde::Deserialize;
use std::fmt;
use std::str::FromStr;

/// Quantization threshold shared by both error-diffusion algorithms.
const THRESHOLD: i32 = 127;

/// 4x4 Bayer index matrix for ordered dithering.
const BAYER_MATRIX_4X4: [[u8; 4]; 4] = [
    [0, 8, 2, 10],
    [12, 4, 14, 6],
    [3, 11, 1, 9],
    [15, 7, 13, 5],
];

/// The closed set of supported dithering algorithms.
///
/// Selection arrives from the server as a lowercase string; unknown values
/// fail deserialization and the caller keeps its default.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DitherAlgorithm {
    /// Floyd-Steinberg error diffusion: smooth, organic patterns.
    #[default]
    Floyd,
    /// Atkinson error diffusion: Mac Classic style, higher contrast.
    Atkinson,
    /// Ordered/Bayer thresholding: geometric screentone patterns.
    Ordered,
}

impl FromStr for DitherAlgorithm {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "floyd" => Ok(DitherAlgorithm::Floyd),
            "atkinson" => Ok(DitherAlgorithm::Atkinson),
            "ordered" => Ok(DitherAlgorithm::Ordered),
            _ => Err(()),
        }
    }
}

impl fmt::Display for DitherAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DitherAlgorithm::Floyd => "floyd",
            DitherAlgorithm::Atkinson => "atkinson",
            DitherAlgorithm::Ordered => "ordered",
        };
        f.write_str(name)
    }
}

/// Dither a grayscale image to two levels with the selected algorithm.
pub fn dither(image: &GrayImage, algorithm: DitherAlgorithm) -> GrayImage {
    match algorithm {
        DitherAlgorithm::Floyd => floyd_steinberg(image),
        DitherAlgorithm::Atkinson => atkinson(image),
        DitherAlgorithm::Ordered => ordered(image),
    }
}

/// Quantize one intensity to black or white.
fn quantize(value: i32) -> i32 {
    if value > THRESHOLD {
        255
    } else {
        0
    }
}

/// Add a propagated error share to a working pixel, clamping to [0, 255].
fn spread(buf: &mut [i32], width: u32, x: u32, y: u32, share: i32) {
    let idx = (y * width + x) as usize;
    buf[idx] = (buf[idx] + share).clamp(0, 255);
}

/// Floyd-Steinberg error diffusion.
///
/// Raster scan, quantize at 127, distribute the signed error to the four
/// classic neighbors with weights 7/16, 3/16, 5/16, 1/16. Shares are
/// floor-divided so that adding them to a neighbor matches truncating the
/// fractional sum, and the neighbor is clamped after the add.
fn floyd_steinberg(image: &GrayImage) -> GrayImage {
    let (width, height) = image.dimensions();
    let mut buf: Vec<i32> = image.as_raw().iter().map(|&p| i32::from(p)).collect();

    for y in 0..height {
        for x in 0..width {
            let idx = (y * width + x) as usize;
            let old = buf[idx];
            let new = quantize(old);
            buf[idx] = new;
            let error = old - new;

            if x + 1 < width {
                spread(&mut buf, width, x + 1, y, (error * 7).div_euclid(16));
            }
            if y + 1 < height {
                if x > 0 {
                    spread(&mut buf, width, x - 1, y + 1, (error * 3).div_euclid(16));
                }
                spread(&mut buf, width, x, y + 1, (error * 5).div_euclid(16));
                if x + 1 < width {
                    spread(&mut buf, width, x + 1, y + 1, error.div_euclid(16));
                }
            }
        }
    }

    from_working_buffer(width, height, buf)
}

/// The per-neighbor error share used by Atkinson dithering.
///
/// Floor division by 8; with six targets only 6/8 of the error is ever
/// redistributed, which is what gives the algorithm its contrast.
pub(crate) fn atkinson_share(original: i32, quantized: i32) -> i32 {
    (original - quantized).div_euclid(8)
}

/// Atkinson error diffusion (Bill Atkinson, Apple).
fn atkinson(image: &GrayImage) -> GrayImage {
    let (width, height) = image.dimensions();
    let mut buf: Vec<i32> = image.as_raw().iter().map(|&p| i32::from(p)).collect();

    for y in 0..height {
        for x in 0..width {
            let idx = (y * width + x) as usize;
            let old = buf[idx];
            let new = quantize(old);
            buf[idx] = new;
            let share = atkinson_share(old, new);

            if x + 1 < width {
                spread(&mut buf, width, x + 1, y, share);
            }
            if x + 2 < width {
                spread(&mut buf, width, x + 2, y, share);
            }
            if y + 1 < height {
                if x > 0 {
                    spread(&mut buf, width, x - 1, y + 1, share);
                }
                spread(&mut buf, width, x, y + 1, share);
                if x + 1 < width {
                    spread(&mut buf, width, x + 1, y + 1, share);
                }
            }
            if y + 2 < height {
                spread(&mut buf, width, x, y + 2, share);
            }
        }
    }

    from_working_buffer(width, height, buf)
}

/// The 16 thresholds of the scaled Bayer matrix.
///
/// `(index + 1) / 17 * 255` is exact in integers: 255 / 17 == 15.
pub(crate) fn bayer_thresholds() -> [[u8; 4]; 4] {
    let mut thresholds = [[0u8; 4]; 4];
    for (row, indices) in BAYER_MATRIX_4X4.iter().enumerate() {
        for (col, &index) in indices.iter().enumerate() {
            thresholds[row][col] = ((u16::from(index) + 1) * 255 / 17) as u8;
        }
    }
    thresholds
}

/// Ordered dithering with the 4x4 Bayer threshold map.
///
/// Each output pixel depends only on its own intensity and its position
/// modulo 4; there is no sequential dependency, so this is the only
/// algorithm that could be parallelized per pixel.
fn ordered(image: &GrayImage) -> GrayImage {
    let thresholds = bayer_thresholds();
    let (width, height) = image.dimensions();
    let mut out = GrayImage::new(width, height);
    for (x, y, pixel) in image.enumerate_pixels() {
        let threshold = thresholds[(y % 4) as usize][(x % 4) as usize];
        out.put_pixel(x, y, image::Luma([if pixel.0[0] > threshold { 255 } else { 0 }]));
    }
    out
}

fn from_working_buffer(width: u32, height: u32, buf: Vec<i32>) -> GrayImage {
    let bytes: Vec<u8> = buf.into_iter().map(|v| v as u8).collect();
    GrayImage::from_raw(width, height, bytes).expect("buffer length matches dimensions")
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Deterministic pseudo-random grayscale fill for repeatability tests.
    fn noise_image(width: u32, height: u32, seed: u32) -> GrayImage {
        let mut state = seed;
        GrayImage::from_fn(width, height, |_, _| {
            state = state.wrapping_mul(1_664_525).wrapping_add(1_013_904_223);
            image::Luma([(state >> 24) as u8])
        })
    }

    #[test]
    fn bayer_thresholds_match_the_scaled_matrix() {
        let expected = [
            [15, 135, 45, 165],
            [195, 75, 225, 105],
            [60, 180, 30, 150],
            [240, 120, 210, 90],
        ];
        assert_eq!(bayer_thresholds(), expected);
    }

    #[test]
    fn ordered_is_a_pure_per_pixel_function() {
        let input = noise_image(13, 9, 7);
        let output = dither(&input, DitherAlgorithm::Ordered);
        let thresholds = bayer_thresholds();
        for (x, y, pixel) in input.enumerate_pixels() {
            let threshold = thresholds[(y % 4) as usize][(x % 4) as usize];
            let expected = if pixel.0[0] > threshold { 255 } else { 0 };
            assert_eq!(output.get_pixel(x, y).0[0], expected, "at ({x}, {y})");
        }
    }

    #[test]
    fn error_diffusion_is_deterministic() {
        let input = noise_image(32, 24, 42);
        for algorithm in [DitherAlgorithm::Floyd, DitherAlgorithm::Atkinson] {
            let first = dither(&input, algorithm);
            let second = dither(&input, algorithm);
            assert_eq!(first.as_raw(), second.as_raw(), "{algorithm} not stable");
        }
    }

    #[test]
    fn input_is_not_mutated() {
        let input = noise_image(16, 16, 3);
        let copy = input.clone();
        let _ = dither(&input, DitherAlgorithm::Floyd);
        assert_eq!(input.as_raw(), copy.as_raw());
    }

    #[test]
    fn output_is_two_level_and_same_size() {
        let input = noise_image(21, 17, 99);
        for algorithm in [
            DitherAlgorithm::Floyd,
            DitherAlgorithm::Atkinson,
            DitherAlgorithm::Ordered,
        ] {
            let output = dither(&input, algorithm);
            assert_eq!(output.dimensions(), input.dimensions());
            assert!(output.pixels().all(|p| p.0[0] == 0 || p.0[0] == 255));
        }
    }

    #[test]
    fn empty_images_dither_to_empty_images() {
        for (w, h) in [(0, 0), (0, 5), (5, 0)] {
            let input = GrayImage::new(w, h);
            for algorithm in [
                DitherAlgorithm::Floyd,
                DitherAlgorithm::Atkinson,
                DitherAlgorithm::Ordered,
            ] {
                let output = dither(&input, algorithm);
                assert_eq!(output.dimensions(), (w, h));
            }
        }
    }

    #[test]
    fn atkinson_redistributes_six_eighths_of_the_error() {
        // 100 quantizes to 0; the error of 100 yields six shares of 12,
        // i.e. 72 of the 100 actually move to neighbors.
        assert_eq!(atkinson_share(100, 0), 12);
        assert_eq!(6 * atkinson_share(100, 0), 72);
        // Negative errors floor toward -infinity, matching the original.
        assert_eq!(atkinson_share(200, 255), -7);
        // The redistributed total never exceeds the original error.
        for value in 0..=255 {
            let q = quantize(value);
            let error = (value - q).abs();
            assert!((6 * atkinson_share(value, q)).abs() <= error);
        }
    }

    #[test]
    fn atkinson_keeps_more_contrast_than_floyd() {
        // On a flat mid-dark gray the dropped 2/8 of the error makes the
        // Atkinson result darker than the Floyd result.
        let input = GrayImage::from_pixel(40, 40, image::Luma([100]));
        let lit = |img: &GrayImage| img.pixels().filter(|p| p.0[0] == 255).count();
        let floyd = dither(&input, DitherAlgorithm::Floyd);
        let atkinson = dither(&input, DitherAlgorithm::Atkinson);
        assert!(lit(&atkinson) < lit(&floyd));
    }

    #[test]
    fn algorithm_names_parse_from_server_strings() {
        assert_eq!("floyd".parse(), Ok(DitherAlgorithm::Floyd));
        assert_eq!("atkinson".parse(), Ok(DitherAlgorithm::Atkinson));
        assert_eq!("ordered".parse(), Ok(DitherAlgorithm::Ordered));
        assert!("bayer".parse::<DitherAlgorithm>().is_err());
        assert_eq!(DitherAlgorithm::default(), DitherAlgorithm::Floyd);
    }
}
