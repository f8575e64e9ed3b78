use image::{DynamicImage, GenericImageView, RgbaImage};

use crate::wrappers::{Axis, PixelExt};

/// Alpha above this counts as content. Leaves room for anti-aliasing fringes.
pub const DEFAULT_ALPHA_THRESHOLD: u8 = 10;

/// Reduce an image to one occupancy flag per column (or row).
///
/// Entry `i` is true when any pixel of column (row) `i` has `alpha > alpha_threshold`.
/// Images without an alpha channel are fully opaque, so every entry is true.
pub fn occupancy_profile(image: &DynamicImage, axis: Axis, alpha_threshold: u8) -> Vec<bool> {
    if !image.color().has_alpha() {
        return vec![true; axis.len(image.dimensions()) as usize];
    }
    match image.as_rgba8() {
        Some(rgba) => rgba_occupancy(rgba, axis, alpha_threshold),
        None => rgba_occupancy(&image.to_rgba8(), axis, alpha_threshold),
    }
}

/// [`occupancy_profile`] for a buffer already in RGBA8
pub fn rgba_occupancy(image: &RgbaImage, axis: Axis, alpha_threshold: u8) -> Vec<bool> {
    occupancy_counts(image, axis, alpha_threshold)
        .into_iter()
        .map(|count| count > 0)
        .collect()
}

/// Number of content pixels per column (or row)
pub fn occupancy_counts(image: &RgbaImage, axis: Axis, alpha_threshold: u8) -> Vec<u32> {
    let mut counts = vec![0u32; axis.len(image.dimensions()) as usize];
    for (x, y, px) in image.enumerate_pixels() {
        if px.is_content(alpha_threshold) {
            let i = match axis {
                Axis::Columns => x,
                Axis::Rows => y,
            };
            counts[i as usize] += 1;
        }
    }
    counts
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage, Rgba};

    #[test]
    fn transparent_image_is_empty_on_both_axes() {
        let img = DynamicImage::ImageRgba8(RgbaImage::new(30, 12));
        let cols = occupancy_profile(&img, Axis::Columns, DEFAULT_ALPHA_THRESHOLD);
        let rows = occupancy_profile(&img, Axis::Rows, DEFAULT_ALPHA_THRESHOLD);
        assert_eq!(cols.len(), 30);
        assert_eq!(rows.len(), 12);
        assert!(cols.iter().chain(rows.iter()).all(|o| !o));
    }

    #[test]
    fn opaque_formats_are_fully_occupied() {
        let img = DynamicImage::ImageRgb8(RgbImage::from_pixel(7, 3, Rgb([0, 0, 0])));
        assert_eq!(occupancy_profile(&img, Axis::Columns, 255), vec![true; 7]);
        assert_eq!(occupancy_profile(&img, Axis::Rows, 255), vec![true; 3]);
    }

    #[test]
    fn fringe_below_threshold_is_ignored() {
        let mut img = RgbaImage::new(6, 4);
        img.put_pixel(1, 1, Rgba([9, 9, 9, 10]));
        img.put_pixel(4, 2, Rgba([9, 9, 9, 11]));
        let img = DynamicImage::ImageRgba8(img);
        assert_eq!(
            occupancy_profile(&img, Axis::Columns, 10),
            vec![false, false, false, false, true, false]
        );
        assert_eq!(occupancy_profile(&img, Axis::Rows, 10), vec![false, false, true, false]);
    }

    #[test]
    fn counts_per_line() {
        let mut img = RgbaImage::new(3, 3);
        for y in 0..3 {
            img.put_pixel(1, y, Rgba([1, 1, 1, 255]));
        }
        assert_eq!(occupancy_counts(&img, Axis::Columns, 0), vec![0, 3, 0]);
        assert_eq!(occupancy_counts(&img, Axis::Rows, 0), vec![1, 1, 1]);
    }
}
