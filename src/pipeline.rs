//! Detect → crop → normalize → reassemble, for one sheet or a directory of them.

use std::path::{Path, PathBuf};

use image::{DynamicImage, RgbaImage};
use thiserror::Error;
use tracing::{error, info, warn};

use crate::{
    background::remove_background,
    config::AssetProfile,
    grid::{detect_grid, DetectedGrid},
    loader::{ImageStore, LoadError},
    make_image::{crop_frame, normalize_frame, NormalizeError},
    output::{
        assemble_sheet, pack_atlas, visualize_grid, AtlasConfig, AtlasManifest, OutputError, SheetLayout,
    },
};

#[derive(Error, Debug)]
pub enum ProcessError {
    #[error(transparent)]
    Load(#[from] LoadError),
    #[error("{}: {source}", path.display())]
    Normalize {
        path: PathBuf,
        #[source]
        source: NormalizeError,
    },
    #[error("{}: no frames detected", .0.display())]
    NoFrames(PathBuf),
    #[error("{}: {source}", path.display())]
    Output {
        path: PathBuf,
        #[source]
        source: OutputError,
    },
    #[error("{}: output {} is already taken by {}", path.display(), dest.display(), first.display())]
    OutputCollision {
        path: PathBuf,
        dest: PathBuf,
        first: PathBuf,
    },
}

#[derive(Error, Debug)]
pub enum BatchError {
    #[error("input directory {} does not exist", .0.display())]
    MissingRoot(PathBuf),
    #[error(transparent)]
    List(LoadError),
}

#[derive(Debug)]
pub struct SlicedSheet {
    pub grid: DetectedGrid,
    /// One normalized canvas per detected frame, in frame index order
    pub frames: Vec<RgbaImage>,
}

/// Detect the frame grid of `sheet` and normalize every frame
pub fn slice_sheet(sheet: &DynamicImage, profile: &AssetProfile) -> SlicedSheet {
    let grid = detect_grid(sheet, &profile.detect(), profile.expected());
    let rgba = sheet.to_rgba8();
    let normalize = profile.normalize();
    let frames = grid
        .frames
        .iter()
        .map(|frame| normalize_frame(&crop_frame(&rgba, frame), &normalize))
        .collect();
    SlicedSheet { grid, frames }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessOptions {
    /// Detect and normalize but write nothing
    pub dry_run: bool,
    /// Also write `<dest>.grid.png` with the detected rectangles outlined
    pub visualize: bool,
    /// Columns of the output sheet; `None` keeps the detected column count
    pub sheet_columns: Option<u32>,
    pub layout: SheetLayout,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileOutcome {
    pub source: PathBuf,
    pub dest: PathBuf,
    pub frame_count: usize,
    pub used_fallback: bool,
    pub written: bool,
    /// Frame regions, for the atlas layout
    pub atlas: Option<AtlasManifest>,
}

fn sibling_path(dest: &Path, suffix: &str) -> PathBuf {
    let stem = dest.file_stem().and_then(|s| s.to_str()).unwrap_or("sheet");
    dest.with_file_name(format!("{stem}{suffix}"))
}

/// Path of the grid visualization written next to `dest`
pub fn visualization_path(dest: &Path) -> PathBuf {
    sibling_path(dest, ".grid.png")
}

/// Path of the frame manifest written next to an atlas page
pub fn atlas_manifest_path(dest: &Path) -> PathBuf {
    sibling_path(dest, ".atlas.toml")
}

/// Slice one sheet from `store` and write the normalized sheet to `dest`
pub fn process_file<S: ImageStore>(
    store: &mut S,
    source: &Path,
    dest: &Path,
    profile: &AssetProfile,
    options: &ProcessOptions,
) -> Result<FileOutcome, ProcessError> {
    let normalize = profile.normalize();
    normalize.validate().map_err(|source_err| ProcessError::Normalize {
        path: source.to_owned(),
        source: source_err,
    })?;

    let mut sheet = store.load(source)?;
    if let Some(background) = profile.background() {
        sheet = DynamicImage::ImageRgba8(remove_background(&sheet.to_rgba8(), &background));
    }

    let sliced = slice_sheet(&sheet, profile);
    if sliced.frames.is_empty() {
        return Err(ProcessError::NoFrames(source.to_owned()));
    }
    if sliced.grid.used_fallback() {
        warn!(file = %source.display(), "frame grid came from equal division");
    }

    let output_err = |source_err| ProcessError::Output {
        path: source.to_owned(),
        source: source_err,
    };
    let (output, atlas) = match options.layout {
        SheetLayout::Grid => {
            let columns = options
                .sheet_columns
                .filter(|c| *c > 0)
                .unwrap_or(sliced.grid.column_count() as u32);
            let sheet = assemble_sheet(&sliced.frames, columns, normalize.target_size).map_err(output_err)?;
            (sheet, None)
        }
        SheetLayout::Atlas => {
            let base_name = source.file_stem().and_then(|s| s.to_str()).unwrap_or("frame");
            let packed = pack_atlas(&sliced.frames, &format!("{base_name}_"), &AtlasConfig::default())
                .map_err(output_err)?;
            let page = dest.file_name().and_then(|n| n.to_str()).unwrap_or_default();
            let manifest = packed.manifest(page);
            (packed.image, Some(manifest))
        }
    };

    if !options.dry_run {
        store.save(dest, &output)?;
        if let Some(manifest) = &atlas {
            let text = manifest.to_toml().map_err(output_err)?;
            store.save_text(&atlas_manifest_path(dest), &text)?;
        }
        if options.visualize {
            let overlay = visualize_grid(&sheet.to_rgba8(), &sliced.grid);
            store.save(&visualization_path(dest), &overlay)?;
        }
    }

    info!(
        file = %source.display(),
        frames = sliced.frames.len(),
        columns = sliced.grid.column_count(),
        rows = sliced.grid.row_count(),
        dry_run = options.dry_run,
        "sliced sheet"
    );

    Ok(FileOutcome {
        source: source.to_owned(),
        dest: dest.to_owned(),
        frame_count: sliced.frames.len(),
        used_fallback: sliced.grid.used_fallback(),
        written: !options.dry_run,
        atlas,
    })
}

#[derive(Debug, Clone)]
pub struct BatchJob {
    pub input_dir: PathBuf,
    pub output_dir: PathBuf,
    pub profile: AssetProfile,
    pub options: ProcessOptions,
}

#[derive(Debug, Default)]
pub struct BatchReport {
    pub processed: Vec<FileOutcome>,
    pub failed: Vec<(PathBuf, ProcessError)>,
}

impl BatchReport {
    pub fn total(&self) -> usize {
        self.processed.len() + self.failed.len()
    }
}

/// Process every image directly inside `job.input_dir`.
///
/// A missing input directory is the only error. Each file's failure is logged with
/// its path and recorded in the report, and the batch moves on to the next file.
/// Sources sharing a stem (`a.png`, `a.jpg`) would write the same output; the first one
/// in path order wins and the others are reported as failed.
pub fn run_batch<S: ImageStore>(store: &mut S, job: &BatchJob) -> Result<BatchReport, BatchError> {
    if !store.exists(&job.input_dir) {
        return Err(BatchError::MissingRoot(job.input_dir.clone()));
    }
    let sources = store.list_images(&job.input_dir).map_err(|e| match e {
        LoadError::NotFound { path } => BatchError::MissingRoot(path),
        e => BatchError::List(e),
    })?;

    let mut report = BatchReport::default();
    let mut claimed = ahash::AHashMap::<PathBuf, PathBuf>::new();
    for source in sources {
        let Some(file_name) = source.file_name() else {
            continue;
        };
        let dest = job.output_dir.join(file_name).with_extension("png");
        if let Some(first) = claimed.get(&dest) {
            let e = ProcessError::OutputCollision {
                path: source.clone(),
                dest,
                first: first.clone(),
            };
            error!(file = %source.display(), error = %e, "output name collision, skipping");
            report.failed.push((source, e));
            continue;
        }
        claimed.insert(dest.clone(), source.clone());
        match process_file(store, &source, &dest, &job.profile, &job.options) {
            Ok(outcome) => report.processed.push(outcome),
            Err(e) => {
                error!(file = %source.display(), error = %e, "failed to process, skipping");
                report.failed.push((source, e));
            }
        }
    }

    info!(
        processed = report.processed.len(),
        failed = report.failed.len(),
        "batch finished"
    );
    Ok(report)
}
