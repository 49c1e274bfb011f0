use image::{GrayImage, ImageReader, ImageResult, Luma};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

pub const WHITE: Luma<u8> = Luma([255]);
pub const BLACK: Luma<u8> = Luma([0]);

/// Image resolution in pixels.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ImageSize {
    pub width: u32,
    pub height: u32,
}

impl ImageSize {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    #[inline]
    pub fn of(img: &GrayImage) -> Self {
        Self::new(img.width(), img.height())
    }
}

impl fmt::Display for ImageSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.width, self.height)
    }
}

impl From<(u32, u32)> for ImageSize {
    fn from((width, height): (u32, u32)) -> Self {
        Self { width, height }
    }
}

/// Blank white image.
pub fn white_image(width: u32, height: u32) -> GrayImage {
    GrayImage::from_pixel(width, height, WHITE)
}

/// Nearest-neighbour resample; never introduces new gray levels.
///
/// Each destination pixel takes the source pixel under its centre.
pub fn resize_nearest(src: &GrayImage, width: u32, height: u32) -> GrayImage {
    if src.width() == width && src.height() == height {
        return src.clone();
    }
    let xs: Vec<u32> = (0..width).map(|x| nearest_index(x, width, src.width())).collect();
    GrayImage::from_fn(width, height, |x, y| {
        let sy = nearest_index(y, height, src.height());
        *src.get_pixel(xs[x as usize], sy)
    })
}

#[inline]
fn nearest_index(dst: u32, dst_len: u32, src_len: u32) -> u32 {
    let i = (2 * u64::from(dst) + 1) * u64::from(src_len) / (2 * u64::from(dst_len));
    (i as u32).min(src_len.saturating_sub(1))
}

/// Decode an image file into 8-bit grayscale.
pub fn load_gray(path: &Path) -> ImageResult<GrayImage> {
    Ok(ImageReader::open(path)?
        .with_guessed_format()?
        .decode()?
        .to_luma8())
}

/// Sorted distinct pixel values present in the image.
pub fn distinct_levels(img: &GrayImage) -> Vec<u8> {
    let mut seen = [false; 256];
    for &v in img.as_raw() {
        seen[v as usize] = true;
    }
    (0..=255u8).filter(|&v| seen[v as usize]).collect()
}
