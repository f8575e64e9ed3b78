use std::path::{Path, PathBuf};

use image::{DynamicImage, ImageFormat, RgbaImage};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum LoadError {
    #[error("{}: not found", path.display())]
    NotFound { path: PathBuf },
    #[error("{}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("{}: decode failed: {source}", path.display())]
    Decode {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },
    #[error("{}: encode failed: {source}", path.display())]
    Encode {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },
}

impl LoadError {
    /// The file this error is about
    pub fn path(&self) -> &Path {
        match self {
            LoadError::NotFound { path }
            | LoadError::Io { path, .. }
            | LoadError::Decode { path, .. }
            | LoadError::Encode { path, .. } => path,
        }
    }
}

/// Extensions treated as decodable raster images
pub const IMAGE_EXTENSIONS: [&str; 3] = ["png", "jpg", "jpeg"];

pub fn is_image_path(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| IMAGE_EXTENSIONS.contains(&e.to_ascii_lowercase().as_str()))
        .unwrap_or(false)
}

/// Where source images come from and outputs go to
pub trait ImageStore {
    fn load(&self, path: &Path) -> Result<DynamicImage, LoadError>;
    /// Always written as PNG
    fn save(&mut self, path: &Path, image: &RgbaImage) -> Result<(), LoadError>;
    /// Sidecar data written alongside images
    fn save_text(&mut self, path: &Path, text: &str) -> Result<(), LoadError>;
    fn exists(&self, path: &Path) -> bool;
    /// Image files directly inside `dir`, sorted by path
    fn list_images(&self, dir: &Path) -> Result<Vec<PathBuf>, LoadError>;
}

/// Decode an image held in memory; `path` only labels errors
pub fn load_from_bytes(path: &Path, data: &[u8]) -> Result<DynamicImage, LoadError> {
    image::load_from_memory(data).map_err(|source| LoadError::Decode {
        path: path.to_owned(),
        source,
    })
}

#[derive(Debug, Default, Clone, Copy)]
pub struct FsImageStore;

fn create_parent(path: &Path) -> Result<(), LoadError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|source| LoadError::Io {
            path: parent.to_owned(),
            source,
        })?;
    }
    Ok(())
}

impl ImageStore for FsImageStore {
    fn load(&self, path: &Path) -> Result<DynamicImage, LoadError> {
        let data = std::fs::read(path).map_err(|source| match source.kind() {
            std::io::ErrorKind::NotFound => LoadError::NotFound { path: path.to_owned() },
            _ => LoadError::Io { path: path.to_owned(), source },
        })?;
        load_from_bytes(path, &data)
    }

    fn save(&mut self, path: &Path, image: &RgbaImage) -> Result<(), LoadError> {
        create_parent(path)?;
        image
            .save_with_format(path, ImageFormat::Png)
            .map_err(|source| LoadError::Encode { path: path.to_owned(), source })
    }

    fn save_text(&mut self, path: &Path, text: &str) -> Result<(), LoadError> {
        create_parent(path)?;
        std::fs::write(path, text).map_err(|source| LoadError::Io { path: path.to_owned(), source })
    }

    fn exists(&self, path: &Path) -> bool {
        path.exists()
    }

    fn list_images(&self, dir: &Path) -> Result<Vec<PathBuf>, LoadError> {
        let entries = std::fs::read_dir(dir).map_err(|source| match source.kind() {
            std::io::ErrorKind::NotFound => LoadError::NotFound { path: dir.to_owned() },
            _ => LoadError::Io { path: dir.to_owned(), source },
        })?;
        let mut paths = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|source| LoadError::Io { path: dir.to_owned(), source })?;
            let path = entry.path();
            if path.is_file() && is_image_path(&path) {
                paths.push(path);
            }
        }
        paths.sort();
        Ok(paths)
    }
}

/// Keeps everything in a map. Directories exist as long as some image lives under them.
#[derive(Debug, Default, Clone)]
pub struct MemoryImageStore {
    images: ahash::AHashMap<PathBuf, DynamicImage>,
    texts: ahash::AHashMap<PathBuf, String>,
}

impl MemoryImageStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, path: impl Into<PathBuf>, image: DynamicImage) {
        self.images.insert(path.into(), image);
    }

    pub fn get(&self, path: &Path) -> Option<&DynamicImage> {
        self.images.get(path)
    }

    pub fn text(&self, path: &Path) -> Option<&str> {
        self.texts.get(path).map(String::as_str)
    }

    /// Number of stored images
    pub fn len(&self) -> usize {
        self.images.len()
    }

    pub fn is_empty(&self) -> bool {
        self.images.is_empty()
    }
}

impl ImageStore for MemoryImageStore {
    fn load(&self, path: &Path) -> Result<DynamicImage, LoadError> {
        self.images
            .get(path)
            .cloned()
            .ok_or_else(|| LoadError::NotFound { path: path.to_owned() })
    }

    fn save(&mut self, path: &Path, image: &RgbaImage) -> Result<(), LoadError> {
        self.images
            .insert(path.to_owned(), DynamicImage::ImageRgba8(image.clone()));
        Ok(())
    }

    fn save_text(&mut self, path: &Path, text: &str) -> Result<(), LoadError> {
        self.texts.insert(path.to_owned(), text.to_owned());
        Ok(())
    }

    fn exists(&self, path: &Path) -> bool {
        self.images.contains_key(path) || self.images.keys().any(|p| p.starts_with(path))
    }

    fn list_images(&self, dir: &Path) -> Result<Vec<PathBuf>, LoadError> {
        if !self.exists(dir) {
            return Err(LoadError::NotFound { path: dir.to_owned() });
        }
        let mut paths: Vec<PathBuf> = self
            .images
            .keys()
            .filter(|p| p.parent() == Some(dir) && is_image_path(p))
            .cloned()
            .collect();
        paths.sort();
        Ok(paths)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn image_extensions() {
        assert!(is_image_path(Path::new("a/b/hero.PNG")));
        assert!(is_image_path(Path::new("cover.jpeg")));
        assert!(!is_image_path(Path::new("hero.tres")));
        assert!(!is_image_path(Path::new("README")));
    }

    #[test]
    fn garbage_bytes_fail_to_decode_with_path() {
        let err = load_from_bytes(Path::new("broken.png"), b"not a png").unwrap_err();
        assert!(matches!(err, LoadError::Decode { .. }));
        assert_eq!(err.path(), Path::new("broken.png"));
        assert!(err.to_string().starts_with("broken.png"));
    }

    #[test]
    fn memory_store_lists_direct_children() {
        let mut store = MemoryImageStore::new();
        let img = DynamicImage::ImageRgba8(RgbaImage::new(2, 2));
        store.insert("sheets/b.png", img.clone());
        store.insert("sheets/a.png", img.clone());
        store.insert("sheets/nested/c.png", img);

        let listed = store.list_images(Path::new("sheets")).unwrap();
        assert_eq!(listed, vec![PathBuf::from("sheets/a.png"), PathBuf::from("sheets/b.png")]);
        assert!(store.exists(Path::new("sheets/nested")));
        assert!(matches!(
            store.list_images(Path::new("missing")),
            Err(LoadError::NotFound { .. })
        ));
    }

    #[test]
    fn memory_store_missing_file() {
        let store = MemoryImageStore::new();
        let err = store.load(Path::new("nope.png")).unwrap_err();
        assert!(matches!(err, LoadError::NotFound { .. }));
    }
}
