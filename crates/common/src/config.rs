//! Reporter configuration

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

/// Fixed file name of the history log inside the output directory
pub const HISTORY_FILE_NAME: &str = "cynova-history.json";

/// Directory (inside the output directory) for screenshot diff images
pub const DIFF_DIR_NAME: &str = "cynova-diffs";

/// Reporter options
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CyNovaOptions {
    /// Directory for the summary, history and HTML report
    pub output_dir: PathBuf,

    /// Summary JSON file name
    pub file_name: String,

    /// Also render the single-file HTML report
    pub generate_html: bool,

    /// HTML report file name
    pub html_file_name: String,

    /// Replacement template for the HTML report
    pub template_path: Option<PathBuf>,

    /// Skip the template renderer and emit the minimal document
    pub force_html_fallback: bool,

    /// Number of most recent runs considered for flaky detection
    pub flaky_window: usize,

    /// Live broadcast server
    pub live_server: LiveServerOptions,
}

impl Default for CyNovaOptions {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("reports"),
            file_name: "cynova-summary.json".to_string(),
            generate_html: true,
            html_file_name: "cynova-report.html".to_string(),
            template_path: None,
            force_html_fallback: false,
            flaky_window: 10,
            live_server: LiveServerOptions::default(),
        }
    }
}

/// Live broadcast configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LiveServerOptions {
    pub enabled: bool,
    pub host: String,
    pub port: u16,
}

impl Default for LiveServerOptions {
    fn default() -> Self {
        Self {
            enabled: false,
            host: "127.0.0.1".to_string(),
            port: 9777,
        }
    }
}

impl LiveServerOptions {
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl CyNovaOptions {
    /// Load options from a TOML or JSON file; a missing file yields defaults
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path)?;
        let options: Self = match path.extension().and_then(|e| e.to_str()) {
            Some("json") => serde_json::from_str(&content)?,
            _ => toml::from_str(&content)?,
        };
        options.validate()?;
        Ok(options)
    }

    /// Reject values that would make every write fail
    pub fn validate(&self) -> Result<()> {
        if self.file_name.trim().is_empty() {
            return Err(Error::InvalidConfig("fileName must not be empty".into()));
        }
        if self.generate_html && self.html_file_name.trim().is_empty() {
            return Err(Error::InvalidConfig("htmlFileName must not be empty".into()));
        }
        if self.flaky_window == 0 {
            return Err(Error::InvalidConfig("flakyWindow must be at least 1".into()));
        }
        Ok(())
    }

    pub fn summary_path(&self) -> PathBuf {
        self.output_dir.join(&self.file_name)
    }

    pub fn history_path(&self) -> PathBuf {
        self.output_dir.join(HISTORY_FILE_NAME)
    }

    pub fn html_path(&self) -> PathBuf {
        self.output_dir.join(&self.html_file_name)
    }

    pub fn diff_dir(&self) -> PathBuf {
        self.output_dir.join(DIFF_DIR_NAME)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_defaults() {
        let options = CyNovaOptions::default();
        assert_eq!(options.summary_path(), PathBuf::from("reports/cynova-summary.json"));
        assert_eq!(options.history_path(), PathBuf::from("reports/cynova-history.json"));
        assert_eq!(options.html_path(), PathBuf::from("reports/cynova-report.html"));
        assert!(options.generate_html);
        assert!(!options.live_server.enabled);
        assert_eq!(options.live_server.addr(), "127.0.0.1:9777");
    }

    #[test]
    fn test_missing_file_yields_defaults() {
        let tmp = TempDir::new().unwrap();
        let options = CyNovaOptions::load(&tmp.path().join("nope.toml")).unwrap();
        assert_eq!(options, CyNovaOptions::default());
    }

    #[test]
    fn test_load_partial_toml() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("cynova.toml");
        std::fs::write(
            &path,
            r#"
outputDir = "out"
generateHtml = false

[liveServer]
enabled = true
port = 9900
"#,
        )
        .unwrap();

        let options = CyNovaOptions::load(&path).unwrap();
        assert_eq!(options.output_dir, PathBuf::from("out"));
        assert!(!options.generate_html);
        assert_eq!(options.file_name, "cynova-summary.json");
        assert!(options.live_server.enabled);
        assert_eq!(options.live_server.host, "127.0.0.1");
        assert_eq!(options.live_server.port, 9900);
    }

    #[test]
    fn test_load_json() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("cynova.json");
        std::fs::write(&path, r#"{"fileName": "run.json", "flakyWindow": 5}"#).unwrap();

        let options = CyNovaOptions::load(&path).unwrap();
        assert_eq!(options.file_name, "run.json");
        assert_eq!(options.flaky_window, 5);
    }

    #[test]
    fn test_zero_window_rejected() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("cynova.toml");
        std::fs::write(&path, "flakyWindow = 0\n").unwrap();
        assert!(matches!(
            CyNovaOptions::load(&path),
            Err(Error::InvalidConfig(_))
        ));
    }
}
