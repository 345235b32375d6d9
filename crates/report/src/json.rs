//! Summary JSON output

use std::path::{Path, PathBuf};
use tracing::info;

use cynova_common::{CyNovaRun, Result};

/// Write `run` as pretty JSON to `dir/file_name`, creating `dir` as needed
pub fn write_json(run: &CyNovaRun, dir: &Path, file_name: &str) -> Result<PathBuf> {
    std::fs::create_dir_all(dir)?;

    let path = dir.join(file_name);
    let json = serde_json::to_string_pretty(run)?;
    std::fs::write(&path, json)?;

    info!("[CyNova] Report written: {}", path.display());
    Ok(path)
}

/// Load a previously written summary
pub fn read_summary(path: &Path) -> Result<CyNovaRun> {
    let content = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&content)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use cynova_common::{Error, RunTotals, SpecResult};
    use tempfile::TempDir;

    #[test]
    fn test_write_creates_nested_dirs() {
        let tmp = TempDir::new().unwrap();
        let dir = tmp.path().join("a").join("b");
        let mut run = CyNovaRun::new(RunTotals {
            tests: 2,
            passed: 1,
            failed: 1,
            ..Default::default()
        });
        run.specs.push(SpecResult {
            spec_relative: "cypress/e2e/x.cy.ts".into(),
            ..Default::default()
        });

        let path = write_json(&run, &dir, "cynova-summary.json").unwrap();
        assert_eq!(path, dir.join("cynova-summary.json"));

        let back = read_summary(&path).unwrap();
        assert_eq!(back, run);

        let raw: serde_json::Value = serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(raw["tool"], "CyNova");
        assert_eq!(raw["specs"][0]["specRelative"], "cypress/e2e/x.cy.ts");
    }

    #[test]
    fn test_write_into_file_fails() {
        let tmp = TempDir::new().unwrap();
        let blocker = tmp.path().join("reports");
        std::fs::write(&blocker, "").unwrap();

        let err = write_json(&CyNovaRun::new(RunTotals::default()), &blocker, "s.json").unwrap_err();
        assert!(matches!(err, Error::Io(_)));
    }

    #[test]
    fn test_read_rejects_garbage() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("s.json");
        std::fs::write(&path, "{\"tool\":").unwrap();
        assert!(matches!(read_summary(&path), Err(Error::Serialization(_))));
    }
}
