//! Developer tool: slice, clean and audit spritesheet assets.

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::Context;
use clap::{Parser, Subcommand};
use sprite_slicer::{
    audit::{audit_project, AuditConfig},
    background::{remove_background, BackgroundConfig},
    config::{AssetCategory, SlicerConfig},
    loader::{FsImageStore, ImageStore},
    output::SheetLayout,
    pipeline::{atlas_manifest_path, process_file, run_batch, BatchJob, ProcessOptions},
};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "sprite-slicer")]
#[command(about = "Recover frame grids from spritesheets and normalize their frames")]
struct Cli {
    /// TOML file with paths and per-category thresholds
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Slice one sheet and write the normalized sheet
    Slice {
        image: PathBuf,
        /// Output path (default: `<image>_normalized.png`)
        #[arg(short, long)]
        output: Option<PathBuf>,
        #[arg(long, default_value = "character")]
        category: AssetCategory,
        /// Expected number of frame columns
        #[arg(long)]
        columns: Option<u32>,
        /// Expected number of frame rows
        #[arg(long)]
        rows: Option<u32>,
        #[arg(long)]
        dry_run: bool,
        /// Also write the sheet with detected frames outlined
        #[arg(long)]
        visualize: bool,
        /// `grid` or `atlas`
        #[arg(long, default_value = "grid")]
        layout: SheetLayout,
    },
    /// Slice every image in a directory
    Batch {
        /// Input directory (default: `input_dir` from the config)
        dir: Option<PathBuf>,
        #[arg(short, long)]
        output: Option<PathBuf>,
        #[arg(long, default_value = "character")]
        category: AssetCategory,
        #[arg(long)]
        dry_run: bool,
        #[arg(long, default_value = "grid")]
        layout: SheetLayout,
    },
    /// Make a solid background transparent
    StripBg {
        image: PathBuf,
        /// Output path (default: overwrite the input)
        #[arg(short, long)]
        output: Option<PathBuf>,
        #[arg(long, default_value_t = BackgroundConfig::default().tolerance)]
        tolerance: u8,
    },
    /// Report missing `res://` references and unreferenced assets
    Audit { root: PathBuf },
}

fn default_output(image: &Path) -> PathBuf {
    let stem = image.file_stem().and_then(|s| s.to_str()).unwrap_or("sheet");
    image.with_file_name(format!("{stem}_normalized.png"))
}

fn run(cli: Cli) -> anyhow::Result<()> {
    let config = match &cli.config {
        Some(path) => SlicerConfig::from_file(path)?,
        None => SlicerConfig::default(),
    };
    let mut store = FsImageStore;

    match cli.command {
        Command::Slice {
            image,
            output,
            category,
            columns,
            rows,
            dry_run,
            visualize,
            layout,
        } => {
            let mut profile = config.profile(category);
            profile.expected_columns = columns.or(profile.expected_columns);
            profile.expected_rows = rows.or(profile.expected_rows);
            let options = ProcessOptions {
                dry_run,
                visualize,
                sheet_columns: (config.sheet_columns > 0).then_some(config.sheet_columns),
                layout,
            };
            let dest = output.unwrap_or_else(|| default_output(&image));
            let outcome = process_file(&mut store, &image, &dest, &profile, &options)?;
            println!(
                "{} -> {} ({} frames{})",
                outcome.source.display(),
                outcome.dest.display(),
                outcome.frame_count,
                if outcome.used_fallback { ", equal division" } else { "" }
            );
            if outcome.atlas.is_some() && outcome.written {
                println!("frame regions in {}", atlas_manifest_path(&outcome.dest).display());
            }
            Ok(())
        }
        Command::Batch {
            dir,
            output,
            category,
            dry_run,
            layout,
        } => {
            let job = BatchJob {
                input_dir: dir.unwrap_or_else(|| config.input_dir.clone()),
                output_dir: output.unwrap_or_else(|| config.output_dir.clone()),
                profile: config.profile(category),
                options: ProcessOptions {
                    dry_run,
                    visualize: false,
                    sheet_columns: (config.sheet_columns > 0).then_some(config.sheet_columns),
                    layout,
                },
            };
            let report = run_batch(&mut store, &job)?;
            for (path, error) in &report.failed {
                eprintln!("FAILED {}: {error}", path.display());
            }
            println!("{} processed, {} failed", report.processed.len(), report.failed.len());
            Ok(())
        }
        Command::StripBg {
            image,
            output,
            tolerance,
        } => {
            let source = store.load(&image)?.to_rgba8();
            let cleaned = remove_background(&source, &BackgroundConfig { tolerance });
            let dest = output.unwrap_or(image);
            store.save(&dest, &cleaned)?;
            println!("wrote {}", dest.display());
            Ok(())
        }
        Command::Audit { root } => {
            let report = audit_project(&root, &AuditConfig::default())
                .with_context(|| format!("auditing {}", root.display()))?;
            for missing in &report.missing {
                println!(
                    "MISSING  res://{}  (in {})",
                    missing.target.display(),
                    missing.referrer.display()
                );
            }
            for orphan in &report.orphaned {
                println!("ORPHAN   {}", orphan.display());
            }
            println!(
                "{} files scanned, {} references, {} missing, {} orphaned",
                report.scanned_files,
                report.reference_count,
                report.missing.len(),
                report.orphaned.len()
            );
            Ok(())
        }
    }
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("sprite_slicer=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    match run(Cli::parse()) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("sprite-slicer failed: {e:#}");
            ExitCode::FAILURE
        }
    }
}
