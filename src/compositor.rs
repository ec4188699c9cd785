//! Mask compositing
//!
//! Pure, synchronous conversion of a segmentation mask into the alpha channel
//! of the original image. This is the one place subtle bugs hide: alpha is a
//! hard overwrite, never blended with whatever alpha the source carried, and
//! RGB passes through untouched even where the pixel becomes fully
//! transparent.

use crate::types::SegmentationMask;
use image::RgbaImage;

/// Apply a segmentation mask as the alpha channel of an image
///
/// Every output pixel's RGB equals the corresponding input pixel's RGB
/// exactly; only alpha is replaced, with the mask byte at the same row-major
/// position. No blending, no premultiplication.
///
/// # Panics
///
/// Panics if `mask.data.len() != width * height` or the mask dimensions do
/// not match the image. A mismatched mask is a programming error, not a
/// user-recoverable condition, and must not be silently truncated.
#[must_use]
pub fn apply_mask(image: &RgbaImage, mask: &SegmentationMask) -> RgbaImage {
    let (width, height) = image.dimensions();
    assert_eq!(
        mask.dimensions,
        (width, height),
        "mask dimensions {:?} do not match image dimensions {:?}",
        mask.dimensions,
        (width, height)
    );
    assert_eq!(
        mask.data.len(),
        (width as usize) * (height as usize),
        "mask has {} values for {} pixels",
        mask.data.len(),
        (width as usize) * (height as usize)
    );

    let mut result = image.clone();
    for (pixel, &alpha) in result.pixels_mut().zip(mask.data.iter()) {
        pixel.0[3] = alpha;
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    #[test]
    fn test_alpha_overwritten_rgb_preserved() {
        // Source pixels carry a non-trivial existing alpha that must be ignored.
        let mut image = RgbaImage::new(3, 2);
        for (i, pixel) in image.pixels_mut().enumerate() {
            *pixel = Rgba([i as u8 * 10, 100, 200, 77]);
        }
        let mask = SegmentationMask::new(vec![0, 50, 100, 150, 200, 255], (3, 2));

        let result = apply_mask(&image, &mask);

        for ((out, src), &mask_value) in result.pixels().zip(image.pixels()).zip(mask.data.iter()) {
            assert_eq!(out.0[0], src.0[0]);
            assert_eq!(out.0[1], src.0[1]);
            assert_eq!(out.0[2], src.0[2]);
            assert_eq!(out.0[3], mask_value);
        }
    }

    #[test]
    fn test_rgb_preserved_where_fully_transparent() {
        let image = RgbaImage::from_pixel(2, 2, Rgba([10, 20, 30, 255]));
        let mask = SegmentationMask::new(vec![0; 4], (2, 2));

        let result = apply_mask(&image, &mask);

        for pixel in result.pixels() {
            assert_eq!(pixel.0, [10, 20, 30, 0]);
        }
    }

    #[test]
    fn test_quadrant_mask_scenario() {
        // 100x100 opaque red, mask 255 in the 50x50 top-left block, 0 elsewhere.
        let image = RgbaImage::from_pixel(100, 100, Rgba([255, 0, 0, 255]));
        let mut mask_data = vec![0u8; 100 * 100];
        for y in 0..50 {
            for x in 0..50 {
                mask_data[y * 100 + x] = 255;
            }
        }
        let mask = SegmentationMask::new(mask_data, (100, 100));

        let result = apply_mask(&image, &mask);

        for (x, y, pixel) in result.enumerate_pixels() {
            let expected_alpha = if x < 50 && y < 50 { 255 } else { 0 };
            assert_eq!(pixel.0, [255, 0, 0, expected_alpha], "pixel ({x},{y})");
        }
    }

    #[test]
    #[should_panic(expected = "mask has")]
    fn test_mask_length_mismatch_panics() {
        let image = RgbaImage::new(4, 4);
        let mask = SegmentationMask::new(vec![255; 15], (4, 4));
        let _ = apply_mask(&image, &mask);
    }

    #[test]
    #[should_panic(expected = "mask dimensions")]
    fn test_mask_dimension_mismatch_panics() {
        let image = RgbaImage::new(4, 4);
        let mask = SegmentationMask::new(vec![255; 16], (8, 2));
        let _ = apply_mask(&image, &mask);
    }
}
