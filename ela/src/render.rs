//! Heatmap renderer.

use std::fmt;

use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::PngEncoder;
use image::{ExtendedColorType, ImageEncoder};
use rgb::RGB8;
use serde::{Deserialize, Serialize};

use crate::buffer::{PixelBuffer, MAX_SAMPLE};
use crate::error::EncodeError;

/// Quality used when the artifact itself is JPEG.
pub const ARTIFACT_JPEG_QUALITY: u8 = 95;

/// How the normalized buffer is turned into pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HeatmapStyle {
    /// Normalized channels as-is.
    #[default]
    Ela,
    /// Single-channel luminance.
    Grayscale,
    /// Luminance mapped onto a blue-cyan-green-yellow-red ramp.
    Colormap,
}

/// Container of the rendered artifact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArtifactFormat {
    /// Lossless; the default.
    #[default]
    Png,
    /// Smaller, at [`ARTIFACT_JPEG_QUALITY`].
    Jpeg,
}

impl ArtifactFormat {
    /// MIME type of encoded artifacts.
    pub fn content_type(self) -> &'static str {
        match self {
            Self::Png => "image/png",
            Self::Jpeg => "image/jpeg",
        }
    }

    /// File extension without the dot.
    pub fn extension(self) -> &'static str {
        match self {
            Self::Png => "png",
            Self::Jpeg => "jpg",
        }
    }
}

impl fmt::Display for ArtifactFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Png => "PNG",
            Self::Jpeg => "JPEG",
        })
    }
}

/// Encoded heatmap.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artifact {
    /// Encoded image bytes.
    pub bytes: Vec<u8>,
    /// Container format of `bytes`.
    pub format: ArtifactFormat,
    /// Width in pixels, equal to the analyzed image.
    pub width: u32,
    /// Height in pixels, equal to the analyzed image.
    pub height: u32,
}

impl Artifact {
    /// MIME type of `bytes`.
    pub fn content_type(&self) -> &'static str {
        self.format.content_type()
    }
}

/// Maps 0.0..=1.0 onto the heatmap ramp.
pub fn heatmap_color(value: f32) -> RGB8 {
    let v = value.clamp(0.0, 1.0);
    let up = |t: f32| (t * 255.0) as u8;
    let down = |t: f32| (255.0 * (1.0 - t)) as u8;

    if v < 0.25 {
        RGB8::new(0, up(v / 0.25), 255)
    } else if v < 0.5 {
        RGB8::new(0, 255, down((v - 0.25) / 0.25))
    } else if v < 0.75 {
        RGB8::new(up((v - 0.5) / 0.25), 255, 0)
    } else {
        RGB8::new(255, down((v - 0.75) / 0.25), 0)
    }
}

fn colormap(buffer: &PixelBuffer) -> Vec<u8> {
    let top = f32::from(MAX_SAMPLE);
    buffer
        .luminance()
        .into_buf()
        .into_iter()
        .map(|v| heatmap_color(f32::from(v) / top))
        .flat_map(|c| [c.r, c.g, c.b])
        .collect()
}

/// Renders `buffer` in `style` and encodes it as `format`.
///
/// The artifact always has the buffer's width and height.
///
/// # Errors
/// Buffers with 2 or 4 channels are rejected; codec failures are reported as
/// [`EncodeError::Codec`].
pub fn render(
    buffer: &PixelBuffer,
    style: HeatmapStyle,
    format: ArtifactFormat,
) -> Result<Artifact, EncodeError> {
    let channels = buffer.channels();
    if channels != 1 && channels != 3 {
        return Err(EncodeError::UnsupportedChannels { channels });
    }

    let (pixels, color) = match style {
        HeatmapStyle::Ela if channels == 1 => (buffer.as_slice().to_vec(), ExtendedColorType::L8),
        HeatmapStyle::Ela => (buffer.as_slice().to_vec(), ExtendedColorType::Rgb8),
        HeatmapStyle::Grayscale => (buffer.luminance().into_buf(), ExtendedColorType::L8),
        HeatmapStyle::Colormap => (colormap(buffer), ExtendedColorType::Rgb8),
    };

    let (width, height) = (buffer.width(), buffer.height());
    let mut bytes = Vec::new();
    let encoded = match format {
        ArtifactFormat::Png => {
            PngEncoder::new(&mut bytes).write_image(&pixels, width, height, color)
        }
        ArtifactFormat::Jpeg => JpegEncoder::new_with_quality(&mut bytes, ARTIFACT_JPEG_QUALITY)
            .encode(&pixels, width, height, color),
    };
    encoded.map_err(|source| EncodeError::Codec { format, source })?;

    Ok(Artifact {
        bytes,
        format,
        width,
        height,
    })
}
