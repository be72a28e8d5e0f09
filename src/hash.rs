//! Perceptual hashing of image files.
//!
//! Decodes with `image` (and libheif for HEIC with the `heif` feature),
//! fingerprints with `image_hasher`. The decoded image is dropped before
//! returning, so no handle outlives one file.

use std::fs;
use std::path::Path;

use image::{DynamicImage, ImageReader};
use image_hasher::{HashAlg, Hasher, HasherConfig};

use crate::error::DecodeError;
#[cfg(feature = "heif")]
use crate::scanner::{HEIF_EXTENSIONS, has_image_extension};
use crate::types::{HashAlgorithm, ImageHash, ImageInfo};

/// Width and height of the hash grid, in cells.
const HASH_SIZE: u32 = 8;

/// Turns an image file into a fingerprint plus its dimensions.
pub trait ImageProbe {
    fn probe(&self, path: &Path) -> Result<(ImageHash, ImageInfo), DecodeError>;
}

/// `ImageProbe` backed by a real decoder.
pub struct PerceptualHasher {
    hasher: Hasher,
}

impl PerceptualHasher {
    pub fn new(algorithm: HashAlgorithm) -> Self {
        let config = HasherConfig::new().hash_size(HASH_SIZE, HASH_SIZE);
        let config = match algorithm {
            HashAlgorithm::Mean => config.hash_alg(HashAlg::Mean),
            HashAlgorithm::Dct => config.hash_alg(HashAlg::Mean).preproc_dct(),
            HashAlgorithm::Gradient => config.hash_alg(HashAlg::Gradient),
        };
        Self {
            hasher: config.to_hasher(),
        }
    }
}

impl ImageProbe for PerceptualHasher {
    fn probe(&self, path: &Path) -> Result<(ImageHash, ImageInfo), DecodeError> {
        let size_bytes = fs::metadata(path)
            .map_err(|source| DecodeError::Open {
                path: path.to_path_buf(),
                source,
            })?
            .len();
        let img = decode(path)?;

        let hash = self.hasher.hash_image(&img);
        let info = ImageInfo {
            width: img.width(),
            height: img.height(),
            size_bytes,
        };

        Ok((ImageHash(hash.as_bytes().to_vec()), info))
    }
}

// ============================================================================
// DECODING
// ============================================================================

/// HEIC/HEIF goes through libheif (with the `heif` feature), everything
/// else through `image` with the format sniffed from the content.
fn decode(path: &Path) -> Result<DynamicImage, DecodeError> {
    #[cfg(feature = "heif")]
    if is_heif(path) {
        return decode_heif(path);
    }

    ImageReader::open(path)
        .and_then(|reader| reader.with_guessed_format())
        .map_err(|source| DecodeError::Open {
            path: path.to_path_buf(),
            source,
        })?
        .decode()
        .map_err(|source| DecodeError::Decode {
            path: path.to_path_buf(),
            source,
        })
}

#[cfg(feature = "heif")]
fn is_heif(path: &Path) -> bool {
    let heif: Vec<String> = HEIF_EXTENSIONS.iter().map(|e| e.to_string()).collect();
    has_image_extension(path, &heif)
}

/// Decode the primary image of a HEIF container to 8-bit RGB.
#[cfg(feature = "heif")]
fn decode_heif(path: &Path) -> Result<DynamicImage, DecodeError> {
    use image::RgbImage;
    use libheif_rs::{ColorSpace, HeifContext, LibHeif, RgbChroma};

    let heif_err = |source| DecodeError::Heif {
        path: path.to_path_buf(),
        source,
    };
    let layout_err = || DecodeError::Layout {
        path: path.to_path_buf(),
    };

    // Read the bytes ourselves: libheif only takes UTF-8 paths.
    let bytes = fs::read(path).map_err(|source| DecodeError::Open {
        path: path.to_path_buf(),
        source,
    })?;
    let ctx = HeifContext::read_from_bytes(&bytes).map_err(heif_err)?;
    let handle = ctx.primary_image_handle().map_err(heif_err)?;
    let decoded = LibHeif::new()
        .decode(&handle, ColorSpace::Rgb(RgbChroma::Rgb), None)
        .map_err(heif_err)?;

    let plane = decoded.planes().interleaved.ok_or_else(layout_err)?;
    let (width, height) = (plane.width, plane.height);
    let row_len = width as usize * 3;

    // Rows are padded to `stride` bytes; keep only the pixels.
    let mut pixels = Vec::with_capacity(row_len * height as usize);
    for row in plane.data.chunks(plane.stride).take(height as usize) {
        pixels.extend_from_slice(row.get(..row_len).ok_or_else(layout_err)?);
    }

    RgbImage::from_raw(width, height, pixels)
        .map(DynamicImage::ImageRgb8)
        .ok_or_else(layout_err)
}

// ============================================================================
// TESTS
// ============================================================================
