//! Solid background removal for generated sheets that come without transparency.

use std::collections::VecDeque;

use image::{Rgba, RgbaImage};
use itertools::Itertools;
use tracing::debug;

use crate::wrappers::PixelExt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackgroundConfig {
    /// Largest per-channel difference from the key color still treated as background
    pub tolerance: u8,
}

impl Default for BackgroundConfig {
    fn default() -> Self {
        Self { tolerance: 24 }
    }
}

fn close_to(px: &Rgba<u8>, key: &Rgba<u8>, tolerance: u8) -> bool {
    px.0[..3]
        .iter()
        .zip(&key.0[..3])
        .all(|(a, b)| a.abs_diff(*b) <= tolerance)
}

/// Most common corner color. Ties go to the top-left corner.
pub fn key_color(image: &RgbaImage) -> Option<Rgba<u8>> {
    let (w, h) = image.dimensions();
    if w == 0 || h == 0 {
        return None;
    }
    let corners = [(0, 0), (w - 1, 0), (0, h - 1), (w - 1, h - 1)].map(|(x, y)| *image.get_pixel(x, y));
    let counts = corners.iter().counts();
    corners
        .iter()
        .max_by_key(|c| (counts[c], std::cmp::Reverse(corners.iter().position(|o| o == *c))))
        .copied()
}

/// Clear the background connected to the image border.
///
/// The key color is sampled from the corners, then every pixel reachable from the
/// border through pixels within `tolerance` of it becomes fully transparent. Matching
/// pixels enclosed by the sprite are kept. Images whose corners are already
/// transparent are returned unchanged.
pub fn remove_background(image: &RgbaImage, config: &BackgroundConfig) -> RgbaImage {
    let mut out = image.clone();
    let Some(key) = key_color(image) else {
        return out;
    };
    if key.a() == 0 {
        debug!("corners already transparent, skipping background removal");
        return out;
    }

    let (w, h) = image.dimensions();
    let mut visited = vec![false; w as usize * h as usize];
    let mut queue = VecDeque::new();
    let border = (0..w)
        .flat_map(|x| [(x, 0), (x, h - 1)])
        .chain((0..h).flat_map(|y| [(0, y), (w - 1, y)]));
    for (x, y) in border {
        let i = (y * w + x) as usize;
        if !visited[i] && close_to(image.get_pixel(x, y), &key, config.tolerance) {
            visited[i] = true;
            queue.push_back((x, y));
        }
    }

    let mut cleared = 0usize;
    while let Some((x, y)) = queue.pop_front() {
        out.put_pixel(x, y, Rgba::zeroed());
        cleared += 1;
        let neighbours = [
            (x.checked_sub(1), Some(y)),
            (x.checked_add(1).filter(|&nx| nx < w), Some(y)),
            (Some(x), y.checked_sub(1)),
            (Some(x), y.checked_add(1).filter(|&ny| ny < h)),
        ];
        for (nx, ny) in neighbours {
            let (Some(nx), Some(ny)) = (nx, ny) else { continue };
            let i = (ny * w + nx) as usize;
            if !visited[i] && close_to(image.get_pixel(nx, ny), &key, config.tolerance) {
                visited[i] = true;
                queue.push_back((nx, ny));
            }
        }
    }
    debug!(?key, cleared, "removed background");
    out
}
