use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use image::ImageReader;
use log::info;
use rayon::prelude::*;

use super::PendingItem;

const SUPPORTED_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "gif", "bmp", "webp"];

/// Image path with its base directory for computing relative names
struct ImagePath {
    path: PathBuf,
    base: Option<PathBuf>,
}

/// Load images from input paths (files or directories) as pending items.
///
/// Directory inputs name each image by its path relative to that directory,
/// individual files by their file name.
pub fn load_images(inputs: &[impl AsRef<Path>]) -> Result<Vec<PendingItem>> {
    let image_paths = collect_image_paths(inputs)?;

    if image_paths.is_empty() {
        bail!("no valid images found in input");
    }

    info!("Loading {} images...", image_paths.len());

    let items: Result<Vec<_>> = image_paths
        .par_iter()
        .map(|img_path| load_single_image(&img_path.path, img_path.base.as_deref()))
        .collect();

    // Keep a stable order so repeated runs pack identically
    let mut items = items?;
    items.sort_by(|a, b| a.name.cmp(&b.name));

    Ok(items)
}

fn collect_image_paths(inputs: &[impl AsRef<Path>]) -> Result<Vec<ImagePath>> {
    let mut paths = Vec::new();

    for input in inputs {
        let path = input.as_ref();
        if !path.exists() {
            bail!("input path does not exist: {}", path.display());
        }

        if path.is_file() {
            if is_supported_image(path) {
                paths.push(ImagePath {
                    path: path.to_path_buf(),
                    base: None,
                });
            }
        } else if path.is_dir() {
            collect_from_directory(path, path, &mut paths)?;
        }
    }

    Ok(paths)
}

fn collect_from_directory(base: &Path, dir: &Path, paths: &mut Vec<ImagePath>) -> Result<()> {
    for entry in std::fs::read_dir(dir).context("Failed to read directory")? {
        let entry = entry?;
        let path = entry.path();

        if path.is_file() && is_supported_image(&path) {
            paths.push(ImagePath {
                path,
                base: Some(base.to_path_buf()),
            });
        } else if path.is_dir() {
            collect_from_directory(base, &path, paths)?;
        }
    }

    Ok(())
}

fn is_supported_image(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| SUPPORTED_EXTENSIONS.contains(&ext.to_lowercase().as_str()))
        .unwrap_or(false)
}

fn load_single_image(path: &Path, base: Option<&Path>) -> Result<PendingItem> {
    let image = ImageReader::open(path)
        .with_context(|| format!("Failed to open image '{}'", path.display()))?
        .decode()
        .with_context(|| format!("Failed to decode image '{}'", path.display()))?;

    let name = match base {
        Some(base_dir) => path
            .strip_prefix(base_dir)
            .unwrap_or(path)
            .to_string_lossy()
            .to_string(),
        None => path
            .file_name()
            .and_then(|s| s.to_str())
            .unwrap_or("unknown")
            .to_string(),
    };

    Ok(PendingItem::new(name, image)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_supported_image() {
        assert!(is_supported_image(Path::new("icon.png")));
        assert!(is_supported_image(Path::new("photo.JPG")));
        assert!(!is_supported_image(Path::new("notes.txt")));
        assert!(!is_supported_image(Path::new("noext")));
    }

    #[test]
    fn test_directory_names_are_relative() {
        let dir = std::env::temp_dir().join(format!("dynatlas-loader-{}", std::process::id()));
        let nested = dir.join("buttons");
        std::fs::create_dir_all(&nested).unwrap();
        image::RgbaImage::new(3, 2)
            .save(nested.join("ok.png"))
            .unwrap();
        std::fs::write(dir.join("readme.txt"), "skip me").unwrap();

        let items = load_images(&[&dir]).unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(
            PathBuf::from(&items[0].name),
            PathBuf::from("buttons").join("ok.png")
        );
        assert_eq!((items[0].width(), items[0].height()), (3, 2));

        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_missing_input_is_an_error() {
        assert!(load_images(&["/definitely/not/here.png"]).is_err());
    }
}
