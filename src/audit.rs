//! Cross-check `res://` references in engine text files against assets on disk.
//!
//! Reports references whose target is missing and assets nothing refers to.

use std::path::{Path, PathBuf};

use nom::{
    bytes::complete::{tag, take_till1, take_until},
    combinator::map,
    sequence::preceded,
    IResult,
};
use thiserror::Error;
use tracing::{debug, warn};

pub const RESOURCE_SCHEME: &str = "res://";

#[derive(Error, Debug)]
pub enum AuditError {
    #[error("project root {} does not exist", .0.display())]
    MissingRoot(PathBuf),
    #[error("failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Debug, Clone)]
pub struct AuditConfig {
    /// Files scanned for references
    pub text_extensions: Vec<String>,
    /// Files expected to be referenced by something
    pub asset_extensions: Vec<String>,
    /// Directory names skipped entirely
    pub ignored_dirs: Vec<String>,
}

impl Default for AuditConfig {
    fn default() -> Self {
        let owned = |list: &[&str]| list.iter().map(|s| s.to_string()).collect();
        Self {
            text_extensions: owned(&["tres", "tscn", "gd", "json", "cfg"]),
            asset_extensions: owned(&["png", "jpg", "jpeg", "wav", "ogg", "mp3"]),
            ignored_dirs: owned(&[".git", ".godot", ".import"]),
        }
    }
}

fn terminator(c: char) -> bool {
    matches!(c, '"' | '\'' | ')' | ',' | ']' | '}') || c.is_whitespace()
}

/// Unquoted `res://some/path.png` up to the first quote, bracket, comma or whitespace
fn bare_path(input: &str) -> IResult<&str, &str> {
    preceded(tag(RESOURCE_SCHEME), take_till1(terminator))(input)
}

/// `res://` path inside a string literal: runs to the closing quote, spaces included
fn quoted_path(input: &str, quote: char) -> IResult<&str, &str> {
    preceded(tag(RESOURCE_SCHEME), take_till1(|c: char| c == quote || c == '\n'))(input)
}

/// `res://scene.tscn::SubResource_1` names a resource inside a file; only the file matters
fn file_part(path: &str) -> Option<&str> {
    path.split("::").next().filter(|p| !p.is_empty())
}

/// Skip to the next reference and parse it
fn next_reference(input: &str) -> IResult<&str, Option<&str>> {
    let (input, skipped) = take_until(RESOURCE_SCHEME)(input)?;
    let parsed = match skipped.chars().next_back() {
        Some(quote @ ('"' | '\'')) => quoted_path(input, quote),
        _ => bare_path(input),
    };
    match parsed {
        Ok((rest, path)) => Ok((rest, file_part(path))),
        // a bare `res://` with nothing after it
        Err(_) => map(tag(RESOURCE_SCHEME), |_| None)(input),
    }
}

/// Every `res://` path mentioned in `text`, in order, without the scheme
pub fn parse_references(text: &str) -> Vec<&str> {
    let mut references = Vec::new();
    let mut input = text;
    while let Ok((rest, found)) = next_reference(input) {
        references.extend(found);
        input = rest;
    }
    references
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MissingReference {
    /// File containing the reference
    pub referrer: PathBuf,
    /// Referenced path, relative to the project root
    pub target: PathBuf,
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct AuditReport {
    pub scanned_files: usize,
    pub reference_count: usize,
    pub missing: Vec<MissingReference>,
    /// Assets under the root no scanned file refers to, relative to the root
    pub orphaned: Vec<PathBuf>,
    /// Files that could not be read and were skipped
    pub unreadable: Vec<PathBuf>,
}

impl AuditReport {
    pub fn is_clean(&self) -> bool {
        self.missing.is_empty() && self.orphaned.is_empty()
    }
}

fn has_extension(path: &Path, extensions: &[String]) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| extensions.iter().any(|x| x.eq_ignore_ascii_case(e)))
        .unwrap_or(false)
}

fn collect_files(dir: &Path, config: &AuditConfig, out: &mut Vec<PathBuf>, unreadable: &mut Vec<PathBuf>) {
    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) => {
            warn!(dir = %dir.display(), error = %e, "skipping unreadable directory");
            unreadable.push(dir.to_owned());
            return;
        }
    };
    for entry in entries.flatten() {
        let path = entry.path();
        if path.is_dir() {
            let ignored = path
                .file_name()
                .and_then(|n| n.to_str())
                .map(|n| config.ignored_dirs.iter().any(|d| d == n))
                .unwrap_or(false);
            if !ignored {
                collect_files(&path, config, out, unreadable);
            }
        } else {
            out.push(path);
        }
    }
}

/// Audit every reference under `root`.
///
/// Only a missing root is an error; unreadable files are logged and listed in the report.
pub fn audit_project(root: &Path, config: &AuditConfig) -> Result<AuditReport, AuditError> {
    if !root.is_dir() {
        return Err(AuditError::MissingRoot(root.to_owned()));
    }

    let mut report = AuditReport::default();
    let mut files = Vec::new();
    collect_files(root, config, &mut files, &mut report.unreadable);
    files.sort();

    let mut referenced = ahash::AHashSet::new();
    for file in files.iter().filter(|f| has_extension(f, &config.text_extensions)) {
        let text = match std::fs::read_to_string(file) {
            Ok(text) => text,
            Err(e) => {
                warn!(file = %file.display(), error = %e, "skipping unreadable file");
                report.unreadable.push(file.clone());
                continue;
            }
        };
        report.scanned_files += 1;
        for reference in parse_references(&text) {
            report.reference_count += 1;
            let target = PathBuf::from(reference);
            if !root.join(&target).exists() {
                debug!(referrer = %file.display(), target = reference, "missing reference");
                report.missing.push(MissingReference {
                    referrer: file.strip_prefix(root).unwrap_or(file).to_owned(),
                    target: target.clone(),
                });
            }
            referenced.insert(target);
        }
    }

    report.orphaned = files
        .iter()
        .filter(|f| has_extension(f, &config.asset_extensions))
        .filter_map(|f| f.strip_prefix(root).ok())
        .filter(|rel| !referenced.contains(*rel))
        .map(Path::to_path_buf)
        .collect();

    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finds_references_in_resource_text() {
        let text = r#"
[ext_resource type="Texture2D" path="res://art/hero.png" id="1"]
[ext_resource type="Script" path='res://scripts/hero.gd' id="2"]
var sfx = preload(res://audio/jump.ogg)
"#;
        assert_eq!(
            parse_references(text),
            vec!["art/hero.png", "scripts/hero.gd", "audio/jump.ogg"]
        );
    }

    #[test]
    fn json_lists_and_bare_schemes() {
        let text = r#"{"icons": ["res://ui/a.png","res://ui/b.png"], "empty": "res://"}"#;
        assert_eq!(parse_references(text), vec!["ui/a.png", "ui/b.png"]);
        assert!(parse_references("no references here").is_empty());
        assert!(parse_references("").is_empty());
    }

    #[test]
    fn quoted_paths_keep_spaces() {
        let text = r#"[ext_resource path="res://art/hero (1).png" id="1"]
path='res://audio/big hit.wav'
var broken = "res://ui/unterminated
res://ui/next.png"#;
        assert_eq!(
            parse_references(text),
            vec!["art/hero (1).png", "audio/big hit.wav", "ui/unterminated", "ui/next.png"]
        );
    }

    #[test]
    fn sub_resources_point_at_their_file() {
        let text = r#"res://a.tscn::Resource_1 "res://fx/sparks.tres::ParticleMaterial_x2" res://::x"#;
        assert_eq!(parse_references(text), vec!["a.tscn", "fx/sparks.tres"]);
    }

    #[test]
    fn mixed_quoted_and_bare_references() {
        let text = "path=\"res://art/hero (1).png\" res://a.tscn::Resource_1";
        assert_eq!(parse_references(text), vec!["art/hero (1).png", "a.tscn"]);
    }

    #[test]
    fn missing_root_is_fatal() {
        let err = audit_project(Path::new("/definitely/not/here"), &AuditConfig::default()).unwrap_err();
        assert!(matches!(err, AuditError::MissingRoot(_)));
    }
}
