use image::{imageops, Rgba, RgbaImage};
use itertools::Itertools;
use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumString};
use thiserror::Error;

use crate::grid::{DetectedGrid, FrameRect, IntervalSource};

#[derive(Error, Debug)]
pub enum OutputError {
    #[error("sheet must have at least one column")]
    ZeroColumns,
    #[error("no frames to write")]
    NoFrames,
    #[error("atlas packing failed: {0}")]
    Pack(String),
    #[error("failed to write atlas manifest: {0}")]
    Manifest(#[from] toml::ser::Error),
}

/// How normalized frames are put back together
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Display, EnumString)]
#[strum(serialize_all = "snake_case")]
pub enum SheetLayout {
    /// Uniform grid, one cell per frame
    #[default]
    Grid,
    /// Packed atlas page with duplicate frames stored once
    Atlas,
}

/// Lay equally sized frames out row-major on a `columns` wide sheet
pub fn assemble_sheet(frames: &[RgbaImage], columns: u32, cell_size: u32) -> Result<RgbaImage, OutputError> {
    if columns == 0 {
        return Err(OutputError::ZeroColumns);
    }
    if frames.is_empty() {
        return Err(OutputError::NoFrames);
    }
    let rows = (frames.len() as u32).div_ceil(columns);
    let mut sheet = RgbaImage::new(columns * cell_size, rows * cell_size);
    for (i, frame) in frames.iter().enumerate() {
        let i = i as u32;
        let (x, y) = ((i % columns) * cell_size, (i / columns) * cell_size);
        imageops::replace(&mut sheet, frame, x as i64, y as i64);
    }
    Ok(sheet)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AtlasRegion {
    pub x: u32,
    pub y: u32,
    pub w: u32,
    pub h: u32,
}

#[derive(Debug)]
pub struct PackedAtlas {
    pub image: RgbaImage,
    /// Every frame name, including duplicates, with the region holding its pixels
    pub regions: Vec<(String, AtlasRegion)>,
}

impl PackedAtlas {
    pub fn region(&self, name: &str) -> Option<AtlasRegion> {
        self.regions.iter().find(|(n, _)| n == name).map(|(_, r)| *r)
    }

    /// Frame lookup table for the atlas page stored as `image`
    pub fn manifest(&self, image: &str) -> AtlasManifest {
        AtlasManifest {
            image: image.to_owned(),
            width: self.image.width(),
            height: self.image.height(),
            frames: self
                .regions
                .iter()
                .map(|(name, region)| AtlasFrame {
                    name: name.clone(),
                    region: *region,
                })
                .collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AtlasFrame {
    pub name: String,
    pub region: AtlasRegion,
}

/// Written next to an atlas page so frames can be found again after packing
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AtlasManifest {
    /// File name of the atlas page
    pub image: String,
    pub width: u32,
    pub height: u32,
    /// In frame index order
    pub frames: Vec<AtlasFrame>,
}

impl AtlasManifest {
    pub fn region(&self, name: &str) -> Option<AtlasRegion> {
        self.frames.iter().find(|f| f.name == name).map(|f| f.region)
    }

    pub fn to_toml(&self) -> Result<String, OutputError> {
        Ok(toml::to_string_pretty(self)?)
    }

    pub fn parse(text: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(text)
    }
}

#[derive(Debug, Clone, Copy)]
pub struct AtlasConfig {
    pub max_width: u32,
    pub max_height: u32,
    pub padding: u32,
}

impl Default for AtlasConfig {
    fn default() -> Self {
        Self {
            max_width: 2048,
            max_height: 2048,
            padding: 2,
        }
    }
}

/// Pack frames into a single atlas page, storing identical frames once.
/// Frame `i` is named `{base_name}{i + 1}`.
pub fn pack_atlas(frames: &[RgbaImage], base_name: &str, config: &AtlasConfig) -> Result<PackedAtlas, OutputError> {
    if frames.is_empty() {
        return Err(OutputError::NoFrames);
    }
    let packer_config = texture_packer::TexturePackerConfig {
        max_width: config.max_width,
        max_height: config.max_height,
        allow_rotation: false,
        texture_outlines: false,
        border_padding: 0,
        force_max_dimensions: false,
        texture_padding: config.padding,
        texture_extrusion: 0,
        trim: false, // frames are already centered on their canvas, trimming would move them
    };
    let mut packer = texture_packer::TexturePacker::new_skyline(packer_config);
    let mut frame_image_dedup =
        bimap::BiHashMap::<String, RgbaImage, ahash::RandomState, ahash::RandomState>::default();

    let mut names = Vec::with_capacity(frames.len());
    for (i, frame) in frames.iter().enumerate() {
        let name = format!("{base_name}{}", i + 1);
        let packed_as = if let Some(existing) = frame_image_dedup.get_by_right(frame) {
            existing.to_owned()
        } else {
            packer
                .pack_own(name.clone(), frame.clone())
                .map_err(|e| OutputError::Pack(format!("{e:?}")))?;
            frame_image_dedup.insert(name.clone(), frame.clone());
            name.clone()
        };
        names.push((name, packed_as));
    }

    let packed = packer.get_frames();
    let regions = names
        .into_iter()
        .map(|(name, packed_as)| {
            let rect = packed[&packed_as].frame;
            let region = AtlasRegion { x: rect.x, y: rect.y, w: rect.w, h: rect.h };
            (name, region)
        })
        .collect_vec();

    let image = texture_packer::exporter::ImageExporter::export(&packer)
        .map_err(OutputError::Pack)?
        .to_rgba8();

    Ok(PackedAtlas { image, regions })
}

const DETECTED_OUTLINE: Rgba<u8> = Rgba([0, 255, 0, 255]);
const FALLBACK_OUTLINE: Rgba<u8> = Rgba([255, 0, 255, 255]);

fn outline(image: &mut RgbaImage, frame: &FrameRect, color: Rgba<u8>) {
    if frame.width() == 0 || frame.height() == 0 {
        return;
    }
    let (x0, y0, x1, y1) = (frame.x_start, frame.y_start, frame.x_end - 1, frame.y_end - 1);
    for x in x0..=x1 {
        image.put_pixel(x, y0, color);
        image.put_pixel(x, y1, color);
    }
    for y in y0..=y1 {
        image.put_pixel(x0, y, color);
        image.put_pixel(x1, y, color);
    }
}

/// Copy of the sheet with every frame rectangle outlined.
/// Green where both axes came from gap detection, magenta where an axis was split evenly.
pub fn visualize_grid(sheet: &RgbaImage, grid: &DetectedGrid) -> RgbaImage {
    let mut out = sheet.clone();
    let color = match (grid.columns.source, grid.rows.source) {
        (IntervalSource::Gaps, IntervalSource::Gaps) => DETECTED_OUTLINE,
        _ => FALLBACK_OUTLINE,
    };
    for frame in &grid.frames {
        outline(&mut out, frame, color);
    }
    out
}
