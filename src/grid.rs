use image::{DynamicImage, GenericImageView};
use itertools::Itertools;
use tracing::{debug, warn};

use crate::{
    intervals::{content_intervals, equal_division, ContentInterval, GapConfig},
    profile::{occupancy_profile, DEFAULT_ALPHA_THRESHOLD},
    wrappers::Axis,
};

/// Candidate frame bounding box inside a source sheet.
/// Indices are 1-based in row-major order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FrameRect {
    pub index: usize,
    pub row: usize,
    pub col: usize,
    pub x_start: u32,
    pub y_start: u32,
    pub x_end: u32,
    pub y_end: u32,
}

impl FrameRect {
    pub fn width(&self) -> u32 {
        self.x_end - self.x_start
    }
    pub fn height(&self) -> u32 {
        self.y_end - self.y_start
    }
}

/// Cross every row interval with every column interval, row-major
pub fn build_grid(columns: &[ContentInterval], rows: &[ContentInterval]) -> Vec<FrameRect> {
    rows.iter()
        .enumerate()
        .cartesian_product(columns.iter().enumerate())
        .map(|((row, r), (col, c))| FrameRect {
            index: row * columns.len() + col + 1,
            row,
            col,
            x_start: c.start,
            y_start: r.start,
            x_end: c.end,
            y_end: r.end,
        })
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ExpectedLayout {
    pub columns: Option<u32>,
    pub rows: Option<u32>,
}

impl ExpectedLayout {
    pub fn new(columns: u32, rows: u32) -> Self {
        Self {
            columns: Some(columns),
            rows: Some(rows),
        }
    }

    fn for_axis(&self, axis: Axis) -> Option<u32> {
        match axis {
            Axis::Columns => self.columns,
            Axis::Rows => self.rows,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DetectConfig {
    pub alpha_threshold: u8,
    pub gaps: GapConfig,
}

impl Default for DetectConfig {
    fn default() -> Self {
        Self {
            alpha_threshold: DEFAULT_ALPHA_THRESHOLD,
            gaps: GapConfig::default(),
        }
    }
}

/// How an axis' intervals were obtained
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IntervalSource {
    Gaps,
    /// Detection disagreed with the expected count; `detected` is what gap analysis found
    EqualDivision { detected: usize },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AxisIntervals {
    pub intervals: Vec<ContentInterval>,
    pub source: IntervalSource,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DetectedGrid {
    pub columns: AxisIntervals,
    pub rows: AxisIntervals,
    pub frames: Vec<FrameRect>,
}

impl DetectedGrid {
    pub fn column_count(&self) -> usize {
        self.columns.intervals.len()
    }
    pub fn row_count(&self) -> usize {
        self.rows.intervals.len()
    }
    pub fn used_fallback(&self) -> bool {
        !matches!(
            (self.columns.source, self.rows.source),
            (IntervalSource::Gaps, IntervalSource::Gaps)
        )
    }
}

fn axis_intervals(
    image: &DynamicImage,
    axis: Axis,
    config: &DetectConfig,
    expected: Option<u32>,
) -> AxisIntervals {
    let profile = occupancy_profile(image, axis, config.alpha_threshold);
    let detected = content_intervals(&profile, &config.gaps);
    debug!(%axis, ?detected, "gap analysis");

    let axis_len = axis.len(image.dimensions());
    match expected {
        Some(expected) if expected > axis_len => {
            warn!(
                %axis,
                expected,
                axis_len,
                "expected frame count exceeds the axis length, keeping detected intervals"
            );
            AxisIntervals {
                intervals: detected,
                source: IntervalSource::Gaps,
            }
        }
        Some(expected) if detected.len() != expected as usize => {
            warn!(
                %axis,
                detected = detected.len(),
                expected,
                "detected frame count differs from expected, splitting axis evenly"
            );
            AxisIntervals {
                intervals: equal_division(axis_len, expected),
                source: IntervalSource::EqualDivision {
                    detected: detected.len(),
                },
            }
        }
        _ => AxisIntervals {
            intervals: detected,
            source: IntervalSource::Gaps,
        },
    }
}

/// Recover the frame grid of a sheet from transparent gaps.
///
/// This is a best-effort hypothesis. When `expected` names a count for an axis and gap
/// analysis disagrees, that axis is split into equal slices instead.
pub fn detect_grid(
    image: &DynamicImage,
    config: &DetectConfig,
    expected: Option<ExpectedLayout>,
) -> DetectedGrid {
    let expected = expected.unwrap_or_default();
    let columns = axis_intervals(image, Axis::Columns, config, expected.for_axis(Axis::Columns));
    let rows = axis_intervals(image, Axis::Rows, config, expected.for_axis(Axis::Rows));
    let frames = build_grid(&columns.intervals, &rows.intervals);
    DetectedGrid {
        columns,
        rows,
        frames,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgba, RgbaImage};

    /// `cols` x `rows` opaque squares of `size`, separated by `gap` transparent pixels
    fn synthetic_sheet(cols: u32, rows: u32, size: u32, gap: u32) -> RgbaImage {
        let width = cols * size + (cols - 1) * gap;
        let height = rows * size + (rows - 1) * gap;
        RgbaImage::from_fn(width, height, |x, y| {
            let in_x = x % (size + gap) < size;
            let in_y = y % (size + gap) < size;
            if in_x && in_y {
                Rgba([200, 100, 50, 255])
            } else {
                Rgba([0, 0, 0, 0])
            }
        })
    }

    #[test]
    fn grid_is_row_major_and_one_based() {
        let cols = [ContentInterval::new(0, 10), ContentInterval::new(20, 30)];
        let rows = [ContentInterval::new(0, 5), ContentInterval::new(8, 12)];
        let grid = build_grid(&cols, &rows);
        assert_eq!(grid.len(), 4);
        assert_eq!(grid.iter().map(|f| f.index).collect_vec(), vec![1, 2, 3, 4]);
        assert_eq!((grid[1].row, grid[1].col), (0, 1));
        assert_eq!((grid[2].row, grid[2].col), (1, 0));
        assert_eq!((grid[3].x_start, grid[3].y_start), (20, 8));
        assert_eq!((grid[3].width(), grid[3].height()), (10, 4));
    }

    #[test]
    fn recovers_synthetic_grid() {
        let (cols, rows, size, gap) = (4, 3, 32, 6);
        let sheet = DynamicImage::ImageRgba8(synthetic_sheet(cols, rows, size, gap));
        let grid = detect_grid(&sheet, &DetectConfig::default(), Some(ExpectedLayout::new(cols, rows)));

        assert!(!grid.used_fallback());
        assert_eq!(grid.frames.len(), (cols * rows) as usize);
        for frame in &grid.frames {
            let x = frame.col as u32 * (size + gap);
            let y = frame.row as u32 * (size + gap);
            assert_eq!((frame.x_start, frame.y_start), (x, y));
            assert_eq!((frame.x_end, frame.y_end), (x + size, y + size));
        }
    }

    #[test]
    fn touching_frames_fall_back_to_equal_division() {
        // 4 frames of 50px with zero gap read as one wide blob
        let sheet = DynamicImage::ImageRgba8(RgbaImage::from_fn(200, 50, |x, _| {
            Rgba([(x / 50 * 60) as u8, 0, 0, 255])
        }));
        let detected = detect_grid(&sheet, &DetectConfig::default(), None);
        assert_eq!(detected.column_count(), 1);

        let grid = detect_grid(&sheet, &DetectConfig::default(), Some(ExpectedLayout::new(4, 1)));
        assert_eq!(grid.columns.source, IntervalSource::EqualDivision { detected: 1 });
        assert_eq!(grid.rows.source, IntervalSource::Gaps);
        assert_eq!(grid.frames.len(), 4);
        assert!(grid.columns.intervals.iter().all(|i| i.len() == 50));
        assert_eq!(grid.columns.intervals.iter().map(ContentInterval::len).sum::<u32>(), 200);
    }

    #[test]
    fn missing_expectation_keeps_detection() {
        let sheet = DynamicImage::ImageRgba8(synthetic_sheet(3, 1, 24, 5));
        let grid = detect_grid(&sheet, &DetectConfig::default(), Some(ExpectedLayout::default()));
        assert_eq!(grid.column_count(), 3);
        assert_eq!(grid.row_count(), 1);
        assert!(!grid.used_fallback());
    }

    #[test]
    fn expectation_larger_than_axis_is_ignored() {
        // 30px wide sheet cannot hold 64 columns
        let sheet = DynamicImage::ImageRgba8(RgbaImage::from_pixel(30, 30, Rgba([9, 9, 9, 255])));
        let grid = detect_grid(&sheet, &DetectConfig::default(), Some(ExpectedLayout::new(64, 1)));
        assert_eq!(grid.columns.source, IntervalSource::Gaps);
        assert_eq!(grid.column_count(), 1);
        assert_eq!(grid.frames.len(), 1);
        assert!(grid.frames.iter().all(|f| f.width() > 0 && f.height() > 0));
    }
}
