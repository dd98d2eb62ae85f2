//! Image Import
//!
//! Copies an image into the input folder under a content-addressed name:
//! `<file name>-<md5 of decoded pixel bytes>.png`. Importing the same image
//! twice reuses the existing file.

use std::fs;
use std::path::Path;

use image::ImageFormat;
use log::{debug, info};
use md5::{Digest, Md5};

use super::FunctionError;

/// Imports `source` into `input_folder` and returns its name there.
pub fn import_image(input_folder: &Path, source: &Path) -> Result<String, FunctionError> {
    fs::create_dir_all(input_folder).map_err(|e| FunctionError::io(input_folder, e))?;

    let image = image::open(source).map_err(|e| FunctionError::Image {
        path: source.to_path_buf(),
        message: e.to_string(),
    })?;

    let digest = Md5::digest(image.as_bytes());
    let hash: String = digest.iter().map(|b| format!("{:02x}", b)).collect();

    let base_name = source
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| "image".to_string());
    let name = format!("{}-{}.png", base_name, hash);
    let target = input_folder.join(&name);

    if target.exists() {
        debug!("Image already imported: {}", target.display());
    } else {
        image
            .save_with_format(&target, ImageFormat::Png)
            .map_err(|e| FunctionError::Image {
                path: target.clone(),
                message: e.to_string(),
            })?;
        info!("Imported {} as {}", source.display(), name);
    }

    Ok(name)
}
