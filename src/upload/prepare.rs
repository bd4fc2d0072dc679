use std::io::Cursor;
use std::path::Path;

use image::imageops::FilterType;
use image::{ImageReader, RgbImage};
use jpeg_encoder::{ColorType, Encoder, SamplingFactor};

use super::error::PrepareError;
use super::exif;
use crate::photos::session::UploadBody;

/// Longest side, in pixels, that the service stores without counting it
/// against the user's quota.
pub const HIGH_QUALITY_PX: u32 = 1600;

const JPEG_QUALITY: u8 = 90;

/// Bytes ready to POST, with their exact length for `Content-Length`.
#[derive(Debug)]
pub struct UploadPayload {
    pub body: UploadBody,
    pub length: u64,
}

/// Produce the upload body for `path`.
///
/// With `full_quality` the file is streamed unchanged. Otherwise images
/// whose longer side exceeds [`HIGH_QUALITY_PX`] are downscaled and
/// re-encoded; smaller ones are still streamed unchanged.
pub async fn prepare_upload_bytes(
    path: &Path,
    full_quality: bool,
) -> Result<UploadPayload, PrepareError> {
    if full_quality {
        return open_original(path).await;
    }

    let (width, height) = {
        let path = path.to_path_buf();
        tokio::task::spawn_blocking(move || read_dimensions(&path)).await??
    };

    if width.max(height) <= HIGH_QUALITY_PX {
        return open_original(path).await;
    }

    let (new_width, new_height) = scaled_dimensions(width, height);
    tracing::info!(
        "Resizing {} from {}x{} to {}x{}",
        display_name(path),
        width,
        height,
        new_width,
        new_height
    );

    let bytes = {
        let path = path.to_path_buf();
        tokio::task::spawn_blocking(move || resize_to_jpeg(&path, new_width, new_height)).await??
    };

    Ok(UploadPayload {
        length: bytes.len() as u64,
        body: UploadBody::Buffer(bytes),
    })
}

/// Dimensions with the longer side scaled to exactly [`HIGH_QUALITY_PX`],
/// the shorter one rounded up so aspect ratio is kept as closely as
/// integer pixels allow.
pub fn scaled_dimensions(width: u32, height: u32) -> (u32, u32) {
    let max_dim = u64::from(width.max(height));
    if max_dim == 0 {
        return (width, height);
    }
    let scale = |side: u32| (u64::from(side) * u64::from(HIGH_QUALITY_PX)).div_ceil(max_dim) as u32;
    (scale(width), scale(height))
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

fn io_error(path: &Path) -> impl FnOnce(std::io::Error) -> PrepareError + '_ {
    move |source| PrepareError::Io {
        path: path.display().to_string(),
        source,
    }
}

async fn open_original(path: &Path) -> Result<UploadPayload, PrepareError> {
    let file = tokio::fs::File::open(path).await.map_err(io_error(path))?;
    let length = file.metadata().await.map_err(io_error(path))?.len();
    Ok(UploadPayload {
        body: UploadBody::File(file),
        length,
    })
}

/// Read only the image header.
fn read_dimensions(path: &Path) -> Result<(u32, u32), PrepareError> {
    ImageReader::open(path)
        .and_then(|reader| reader.with_guessed_format())
        .map_err(io_error(path))?
        .into_dimensions()
        .map_err(|source| PrepareError::Decode {
            path: path.display().to_string(),
            source,
        })
}

fn resize_to_jpeg(path: &Path, width: u32, height: u32) -> Result<Vec<u8>, PrepareError> {
    let original = std::fs::read(path).map_err(io_error(path))?;

    let decoded = ImageReader::new(Cursor::new(&original))
        .with_guessed_format()
        .map_err(io_error(path))?
        .decode()
        .map_err(|source| PrepareError::Decode {
            path: path.display().to_string(),
            source,
        })?;

    let resized = decoded.resize_exact(width, height, FilterType::Lanczos3).to_rgb8();

    let exif_segment = exif::read_exif_segment(&original);
    if exif_segment.is_some() {
        if let Some(taken) = exif::date_time_original(&original) {
            tracing::debug!("Keeping EXIF of {} (taken {})", display_name(path), taken);
        }
    }

    encode_jpeg(path, &resized, exif_segment.as_deref())
}

/// Baseline JPEG, quality 90, no chroma subsampling, optimized Huffman
/// tables. `exif_segment` is written back as APP1 byte-for-byte.
fn encode_jpeg(
    path: &Path,
    image: &RgbImage,
    exif_segment: Option<&[u8]>,
) -> Result<Vec<u8>, PrepareError> {
    let (width, height) = image.dimensions();
    let (Ok(w), Ok(h)) = (u16::try_from(width), u16::try_from(height)) else {
        return Err(PrepareError::Dimensions {
            path: path.display().to_string(),
            width,
            height,
        });
    };
    let encode_error = |source| PrepareError::Encode {
        path: path.display().to_string(),
        source,
    };

    let mut out = Vec::new();
    let mut encoder = Encoder::new(&mut out, JPEG_QUALITY);
    encoder.set_sampling_factor(SamplingFactor::R_4_4_4);
    encoder.set_optimized_huffman_tables(true);
    if let Some(segment) = exif_segment {
        encoder.add_app_segment(1, segment).map_err(encode_error)?;
    }
    encoder
        .encode(image.as_raw(), w, h, ColorType::Rgb)
        .map_err(encode_error)?;
    Ok(out)
}
