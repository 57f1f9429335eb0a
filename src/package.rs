use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use serde::Deserialize;
use stepvibes::ChartError;

/// Package metadata stored in a `package.json` next to the chart file.
#[derive(Debug, Clone)]
pub struct PackageInfo {
    pub music_id: String,
    pub title: String,
}

#[derive(Debug, Default, Deserialize)]
struct RawPackage {
    music_id: Option<String>,
    title: Option<String>,
}

impl PackageInfo {
    /// Read the package metadata for an input chart.
    ///
    /// Without a `package.json`, both fields fall back to the input's file
    /// stem; with one, missing fields get neutral defaults.
    pub fn for_input(input: &Path) -> Result<Self, ChartError> {
        let stem = input
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("untitled")
            .to_string();
        let package_path = input.with_file_name("package.json");
        if !package_path.exists() {
            return Ok(PackageInfo {
                music_id: stem.clone(),
                title: stem,
            });
        }
        let file = File::open(&package_path)?;
        let reader = BufReader::new(file);
        let raw: RawPackage = serde_json::from_reader(reader).map_err(|err| {
            ChartError::ParsingError(format!("could not read {package_path:?}: {err}"))
        })?;
        Ok(PackageInfo {
            music_id: raw.music_id.unwrap_or(stem),
            title: raw.title.unwrap_or_else(|| "Untitled".to_string()),
        })
    }
}
