//! Deterministic synthetic images for ELA tests.
//!
//! Everything here is built from an LCG PRNG and the `image` crate's own
//! encoders, so inputs are identical on every platform.

#![allow(dead_code)]

use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::PngEncoder;
use image::{ExtendedColorType, ImageEncoder};

/// LCG pseudo-random number generator (deterministic)
pub struct Lcg {
    state: u64,
}

impl Lcg {
    pub const fn new(seed: u64) -> Self {
        Self { state: seed }
    }

    pub fn next_u8(&mut self) -> u8 {
        self.state = self
            .state
            .wrapping_mul(6364136223846793005)
            .wrapping_add(1442695040888963407);
        ((self.state >> 33) & 0xFF) as u8
    }

    pub fn next_u8_range(&mut self, min: u8, max: u8) -> u8 {
        let range = (max - min) as u64 + 1;
        let val = self.next_u8() as u64;
        (min as u64 + (val * range / 256)) as u8
    }
}

/// Axis-aligned rectangle in pixels, `x..x + w` by `y..y + h`.
#[derive(Clone, Copy, Debug)]
pub struct Block {
    pub x: usize,
    pub y: usize,
    pub w: usize,
    pub h: usize,
}

impl Block {
    pub fn contains(&self, x: usize, y: usize) -> bool {
        x >= self.x && x < self.x + self.w && y >= self.y && y < self.y + self.h
    }
}

/// Smooth RGB gradient: red follows x, green follows y, blue is constant.
pub fn gen_gradient_rgb(width: usize, height: usize) -> Vec<u8> {
    let mut data = Vec::with_capacity(width * height * 3);
    for y in 0..height {
        for x in 0..width {
            let r = if width > 1 { x * 200 / (width - 1) } else { 100 };
            let g = if height > 1 { y * 200 / (height - 1) } else { 100 };
            data.extend_from_slice(&[r as u8 + 20, g as u8 + 20, 110]);
        }
    }
    data
}

/// Uniform single-channel image.
pub fn gen_uniform_gray(width: usize, height: usize, value: u8) -> Vec<u8> {
    vec![value; width * height]
}

/// Low-amplitude noise around mid-gray.
pub fn gen_noise_rgb(width: usize, height: usize, seed: u64) -> Vec<u8> {
    let mut rng = Lcg::new(seed);
    (0..width * height * 3)
        .map(|_| rng.next_u8_range(96, 160))
        .collect()
}

/// Overwrites `block` with one flat color, simulating a pasted edit.
pub fn paint_block(rgb: &mut [u8], width: usize, block: Block, color: [u8; 3]) {
    for y in block.y..block.y + block.h {
        for x in block.x..block.x + block.w {
            let i = (y * width + x) * 3;
            rgb[i..i + 3].copy_from_slice(&color);
        }
    }
}

pub fn encode_png(data: &[u8], width: usize, height: usize, color: ExtendedColorType) -> Vec<u8> {
    let mut out = Vec::new();
    PngEncoder::new(&mut out)
        .write_image(data, width as u32, height as u32, color)
        .expect("png encode");
    out
}

pub fn encode_jpeg_rgb(rgb: &[u8], width: usize, height: usize, quality: u8) -> Vec<u8> {
    let mut out = Vec::new();
    JpegEncoder::new_with_quality(&mut out, quality)
        .encode(rgb, width as u32, height as u32, ExtendedColorType::Rgb8)
        .expect("jpeg encode");
    out
}

pub fn decode_rgb(bytes: &[u8]) -> Vec<u8> {
    image::load_from_memory(bytes)
        .expect("decode")
        .into_rgb8()
        .into_raw()
}

/// The classic tamper scenario: a gradient saved once as JPEG at `quality`,
/// then a flat block painted over the decoded pixels and saved losslessly.
///
/// Returns the PNG bytes of the edited image.
pub fn tampered_upload(width: usize, height: usize, quality: u8, block: Block) -> Vec<u8> {
    let first_save = encode_jpeg_rgb(&gen_gradient_rgb(width, height), width, height, quality);
    let mut pixels = decode_rgb(&first_save);
    paint_block(&mut pixels, width, block, [255, 0, 0]);
    encode_png(&pixels, width, height, ExtendedColorType::Rgb8)
}

/// Mean sample value inside and outside `block` of an interleaved buffer.
pub fn block_means(
    samples: &[u8],
    width: usize,
    channels: usize,
    block: Block,
) -> (f64, f64) {
    let (mut inside, mut n_inside) = (0u64, 0u64);
    let (mut outside, mut n_outside) = (0u64, 0u64);
    for (i, px) in samples.chunks_exact(channels).enumerate() {
        let sum: u64 = px.iter().map(|&v| u64::from(v)).sum();
        if block.contains(i % width, i / width) {
            inside += sum;
            n_inside += channels as u64;
        } else {
            outside += sum;
            n_outside += channels as u64;
        }
    }
    (
        inside as f64 / n_inside as f64,
        outside as f64 / n_outside as f64,
    )
}
