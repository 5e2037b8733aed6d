//! OCR for raster images via the `tesseract` command-line tool.
//!
//! Runs `<command> <image> stdout -l <language>` as a child process and
//! reads the recognized text from stdout.

use std::path::Path;
use tokio::process::Command;

use crate::config::OcrConfig;
use crate::error::ExtractError;

/// Recognize the text in one image file.
pub async fn recognize(config: &OcrConfig, path: &Path) -> Result<String, ExtractError> {
    let output = Command::new(&config.command)
        .arg(path)
        .arg("stdout")
        .args(["-l", &config.language])
        .kill_on_drop(true)
        .output()
        .await
        .map_err(|e| {
            ExtractError::failed(
                path,
                format!("failed to execute '{}' (is it installed?): {}", config.command, e),
            )
        })?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(ExtractError::failed(
            path,
            format!("{} exited with {}: {}", config.command, output.status, stderr.trim()),
        ));
    }

    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}
