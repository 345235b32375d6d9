//! CLI Commands

pub mod history;
pub mod render;
pub mod replay;

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

use cynova_common::CyNovaOptions;

/// Options from `--config` when given, defaults otherwise, with `--output-dir` on top
pub fn load_options(config: Option<&Path>, output_dir: Option<PathBuf>) -> Result<CyNovaOptions> {
    let mut options = match config {
        Some(path) => CyNovaOptions::load(path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => CyNovaOptions::default(),
    };
    if let Some(dir) = output_dir {
        options.output_dir = dir;
    }
    Ok(options)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_output_dir_overrides_config() {
        let tmp = tempfile::TempDir::new().unwrap();
        let config = tmp.path().join("cynova.toml");
        std::fs::write(&config, "outputDir = \"from-config\"\nflakyWindow = 4\n").unwrap();

        let options = load_options(Some(&config), None).unwrap();
        assert_eq!(options.output_dir, PathBuf::from("from-config"));
        assert_eq!(options.flaky_window, 4);

        let options = load_options(Some(&config), Some(PathBuf::from("cli"))).unwrap();
        assert_eq!(options.output_dir, PathBuf::from("cli"));
        assert_eq!(options.flaky_window, 4);
    }

    #[test]
    fn test_invalid_config_is_an_error() {
        let tmp = tempfile::TempDir::new().unwrap();
        let config = tmp.path().join("cynova.toml");
        std::fs::write(&config, "flakyWindow = 0\n").unwrap();

        assert!(load_options(Some(&config), None).is_err());
        assert_eq!(load_options(None, None).unwrap(), CyNovaOptions::default());
    }
}
