//! Slicer configuration: where files live and per-category detection thresholds.

use std::{
    collections::BTreeMap,
    path::{Path, PathBuf},
    str::FromStr,
};

use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumIter, EnumString};
use thiserror::Error;

use crate::{
    background::BackgroundConfig,
    grid::{DetectConfig, ExpectedLayout},
    intervals::GapConfig,
    make_image::{NormalizeConfig, NormalizeError, ScaleMode},
    profile::DEFAULT_ALPHA_THRESHOLD,
};

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),
    #[error("unknown asset category `{0}`")]
    UnknownCategory(String),
    #[error("invalid profile `{category}`: {source}")]
    InvalidProfile {
        category: AssetCategory,
        #[source]
        source: NormalizeError,
    },
}

/// Kinds of art that get their own thresholds
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString, EnumIter,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum AssetCategory {
    Character,
    Creature,
    Effect,
    Item,
    Ui,
}

/// Everything one slicing run of a category needs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AssetProfile {
    pub alpha_threshold: u8,
    pub min_gap_size: u32,
    pub min_content_size: u32,
    pub target_size: u32,
    pub max_content_size: u32,
    pub scale_mode: ScaleMode,
    pub expected_columns: Option<u32>,
    pub expected_rows: Option<u32>,
    /// Key out a solid background before detection
    pub remove_background: bool,
    pub background_tolerance: u8,
}

impl Default for AssetProfile {
    fn default() -> Self {
        let gaps = GapConfig::default();
        let normalize = NormalizeConfig::default();
        Self {
            alpha_threshold: DEFAULT_ALPHA_THRESHOLD,
            min_gap_size: gaps.min_gap_size,
            min_content_size: gaps.min_content_size,
            target_size: normalize.target_size,
            max_content_size: normalize.max_content_size,
            scale_mode: normalize.scale_mode,
            expected_columns: None,
            expected_rows: None,
            remove_background: false,
            background_tolerance: BackgroundConfig::default().tolerance,
        }
    }
}

impl AssetProfile {
    pub fn detect(&self) -> DetectConfig {
        DetectConfig {
            alpha_threshold: self.alpha_threshold,
            gaps: GapConfig {
                min_gap_size: self.min_gap_size,
                min_content_size: self.min_content_size,
            },
        }
    }

    pub fn normalize(&self) -> NormalizeConfig {
        NormalizeConfig {
            target_size: self.target_size,
            max_content_size: self.max_content_size,
            scale_mode: self.scale_mode,
            ..Default::default()
        }
    }

    pub fn expected(&self) -> Option<ExpectedLayout> {
        if self.expected_columns.is_none() && self.expected_rows.is_none() {
            return None;
        }
        Some(ExpectedLayout {
            columns: self.expected_columns,
            rows: self.expected_rows,
        })
    }

    pub fn background(&self) -> Option<BackgroundConfig> {
        self.remove_background.then_some(BackgroundConfig {
            tolerance: self.background_tolerance,
        })
    }
}

/// On-disk shape of [`SlicerConfig`]; profile keys are checked when converting
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
struct ConfigFile {
    input_dir: PathBuf,
    output_dir: PathBuf,
    sheet_columns: u32,
    profiles: BTreeMap<String, AssetProfile>,
}

impl Default for ConfigFile {
    fn default() -> Self {
        Self {
            input_dir: PathBuf::from("art/raw"),
            output_dir: PathBuf::from("art/sheets"),
            sheet_columns: 0,
            profiles: BTreeMap::new(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct SlicerConfig {
    /// Directory batch runs read source sheets from
    pub input_dir: PathBuf,
    /// Directory normalized sheets are written to
    pub output_dir: PathBuf,
    /// Columns of the reassembled sheet; 0 keeps the detected column count
    pub sheet_columns: u32,
    pub profiles: ahash::AHashMap<AssetCategory, AssetProfile>,
}

impl Default for SlicerConfig {
    fn default() -> Self {
        let file = ConfigFile::default();
        Self {
            input_dir: file.input_dir,
            output_dir: file.output_dir,
            sheet_columns: file.sheet_columns,
            profiles: Default::default(),
        }
    }
}

impl TryFrom<ConfigFile> for SlicerConfig {
    type Error = ConfigError;

    fn try_from(file: ConfigFile) -> Result<Self, Self::Error> {
        let profiles = file
            .profiles
            .into_iter()
            .map(|(name, profile)| {
                let category = AssetCategory::from_str(&name)
                    .map_err(|_| ConfigError::UnknownCategory(name))?;
                profile
                    .normalize()
                    .validate()
                    .map_err(|source| ConfigError::InvalidProfile { category, source })?;
                Ok((category, profile))
            })
            .collect::<Result<_, ConfigError>>()?;
        Ok(Self {
            input_dir: file.input_dir,
            output_dir: file.output_dir,
            sheet_columns: file.sheet_columns,
            profiles,
        })
    }
}

impl SlicerConfig {
    /// Parse and validate a TOML document
    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        let file: ConfigFile = toml::from_str(content)?;
        file.try_into()
    }

    /// Load configuration from a TOML file, falling back to defaults for missing fields
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_owned(),
            source,
        })?;
        Self::parse(&content)
    }

    pub fn to_toml(&self) -> Result<String, ConfigError> {
        let file = ConfigFile {
            input_dir: self.input_dir.clone(),
            output_dir: self.output_dir.clone(),
            sheet_columns: self.sheet_columns,
            profiles: self
                .profiles
                .iter()
                .map(|(category, profile)| (category.to_string(), *profile))
                .collect(),
        };
        Ok(toml::to_string_pretty(&file)?)
    }

    /// Thresholds for a category. Categories absent from the file use the defaults.
    pub fn profile(&self, category: AssetCategory) -> AssetProfile {
        self.profiles.get(&category).copied().unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use strum::IntoEnumIterator;

    #[test]
    fn empty_document_uses_defaults() {
        let config = SlicerConfig::parse("").unwrap();
        assert_eq!(config.input_dir, PathBuf::from("art/raw"));
        for category in AssetCategory::iter() {
            assert_eq!(config.profile(category), AssetProfile::default());
        }
    }

    #[test]
    fn per_category_profiles() {
        let config = SlicerConfig::parse(
            r#"
            input_dir = "raw"
            output_dir = "out"

            [profiles.effect]
            alpha_threshold = 0
            min_gap_size = 2
            min_content_size = 8
            expected_columns = 6

            [profiles.ui]
            target_size = 32
            max_content_size = 28
            scale_mode = "stretch"
            remove_background = true
            "#,
        )
        .unwrap();

        let effect = config.profile(AssetCategory::Effect);
        assert_eq!(effect.detect().alpha_threshold, 0);
        assert_eq!(effect.detect().gaps, GapConfig { min_gap_size: 2, min_content_size: 8 });
        assert_eq!(effect.expected(), Some(ExpectedLayout { columns: Some(6), rows: None }));
        assert_eq!(effect.target_size, 64);

        let ui = config.profile(AssetCategory::Ui);
        assert_eq!(ui.normalize().scale_mode, ScaleMode::Stretch);
        assert_eq!(ui.background(), Some(BackgroundConfig::default()));

        assert_eq!(config.profile(AssetCategory::Character).expected(), None);
    }

    #[test]
    fn oversized_content_budget_is_rejected_at_load() {
        let err = SlicerConfig::parse(
            r#"
            [profiles.item]
            target_size = 32
            max_content_size = 48
            "#,
        )
        .unwrap_err();
        assert!(matches!(
            err,
            ConfigError::InvalidProfile { category: AssetCategory::Item, .. }
        ));
    }

    #[test]
    fn unknown_category_is_a_parse_error() {
        let err = SlicerConfig::parse("[profiles.vehicle]\ntarget_size = 32\n").unwrap_err();
        assert!(matches!(err, ConfigError::UnknownCategory(name) if name == "vehicle"));
    }

    #[test]
    fn category_names() {
        assert_eq!(AssetCategory::from_str("creature").unwrap(), AssetCategory::Creature);
        assert_eq!(AssetCategory::Ui.to_string(), "ui");
    }

    #[test]
    fn toml_roundtrip_keeps_profiles() {
        let mut config = SlicerConfig::default();
        config.profiles.insert(
            AssetCategory::Character,
            AssetProfile { expected_columns: Some(8), ..Default::default() },
        );
        let text = config.to_toml().unwrap();
        let loaded = SlicerConfig::parse(&text).unwrap();
        assert_eq!(loaded.profile(AssetCategory::Character).expected_columns, Some(8));
    }
}
