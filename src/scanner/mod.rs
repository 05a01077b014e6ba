//! File scanner for discovering wafer summary workbooks.
//!
//! This module walks the input directory and keeps the files whose
//! name contains the marker and whose extension is a workbook type.

use crate::error::{Result, YieldError};
use std::path::{Path, PathBuf};
use tracing::{debug, info};
use walkdir::{DirEntry, WalkDir};

/// Prefix Office gives to lock files of open workbooks.
const LOCK_FILE_PREFIX: &str = "~$";

/// Configuration for file scanning.
#[derive(Debug, Clone)]
pub struct ScanConfig {
    /// Substring the file name must contain.
    pub marker: String,
    /// Workbook extensions to include, without the dot.
    pub extensions: Vec<String>,
    /// Directory names that are never entered.
    pub excludes: Vec<String>,
    /// Maximum number of files to return.
    pub max_files: Option<usize>,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self::from(&crate::config::InputConfig::default())
    }
}

impl From<&crate::config::InputConfig> for ScanConfig {
    fn from(config: &crate::config::InputConfig) -> Self {
        Self {
            marker: config.marker.clone(),
            extensions: config.extensions.clone(),
            excludes: config.excludes.clone(),
            max_files: config.max_files,
        }
    }
}

/// A discovered workbook.
#[derive(Debug, Clone)]
pub struct ScannedFile {
    /// Absolute or root-joined path used to open the file.
    pub path: PathBuf,
    /// Path relative to the scan root, for display.
    pub relative: String,
    /// File size in bytes.
    pub size: u64,
}

/// File scanner for discovering input workbooks.
pub struct FileScanner {
    config: ScanConfig,
    root: PathBuf,
}

impl FileScanner {
    /// Create a new file scanner.
    pub fn new(root: PathBuf, config: ScanConfig) -> Self {
        Self { config, root }
    }

    /// Scan for all matching workbooks in listing order.
    ///
    /// Directory entries are visited sorted by name, so the result is stable
    /// across runs on the same tree.
    pub fn scan(&self) -> Result<Vec<ScannedFile>> {
        if !self.root.is_dir() {
            return Err(YieldError::InputDirectory(self.root.clone()));
        }

        let mut files = Vec::new();

        let walker = WalkDir::new(&self.root)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|entry| entry.depth() == 0 || !self.is_excluded_dir(entry));

        for entry in walker {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    debug!("Cannot read directory entry: {}", e);
                    continue;
                }
            };

            if !entry.file_type().is_file() || !self.matches(entry.path()) {
                continue;
            }

            if let Some(max) = self.config.max_files {
                if files.len() >= max {
                    break;
                }
            }

            let size = entry.metadata().map(|m| m.len()).unwrap_or(0);
            let relative = entry
                .path()
                .strip_prefix(&self.root)
                .unwrap_or(entry.path())
                .to_string_lossy()
                .to_string();

            debug!("Matched {}", relative);
            files.push(ScannedFile {
                path: entry.into_path(),
                relative,
                size,
            });
        }

        info!(
            "Found {} files matching '{}' in {}",
            files.len(),
            self.config.marker,
            self.root.display()
        );
        Ok(files)
    }

    /// Check if a file name matches the marker and extension criteria.
    pub fn matches(&self, path: &Path) -> bool {
        let name = match path.file_name().and_then(|n| n.to_str()) {
            Some(name) => name,
            None => return false,
        };

        if name.starts_with(LOCK_FILE_PREFIX) || !name.contains(&self.config.marker) {
            return false;
        }

        let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");
        self.config
            .extensions
            .iter()
            .any(|allowed| allowed.trim_start_matches('.').eq_ignore_ascii_case(ext))
    }

    /// Hidden and explicitly excluded directories are skipped.
    fn is_excluded_dir(&self, entry: &DirEntry) -> bool {
        if !entry.file_type().is_dir() {
            return false;
        }

        let name = entry.file_name().to_string_lossy();
        name.starts_with('.') || self.config.excludes.iter().any(|pattern| name == pattern.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn touch(dir: &Path, name: &str) {
        if let Some(parent) = dir.join(name).parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(dir.join(name), b"not really a workbook").unwrap();
    }

    fn names(files: &[ScannedFile]) -> Vec<String> {
        files.iter().map(|f| f.relative.replace('\\', "/")).collect()
    }

    #[test]
    fn test_matches_marker_and_extension() {
        let scanner = FileScanner::new(PathBuf::from("."), ScanConfig::default());

        assert!(scanner.matches(Path::new("Wafer_Summary_1.xlsx")));
        assert!(scanner.matches(Path::new("lot7_Wafer_Summary.XLS")));
        assert!(!scanner.matches(Path::new("other.xlsx")));
        assert!(!scanner.matches(Path::new("Wafer_Summary_1.csv")));
        assert!(!scanner.matches(Path::new("~$Wafer_Summary_1.xlsx")));
        assert!(!scanner.matches(Path::new("wafer_summary_1.xlsx")));
    }

    #[test]
    fn test_scan_skips_non_matching_files() {
        let dir = TempDir::new().unwrap();
        touch(dir.path(), "Wafer_Summary_1.xlsx");
        touch(dir.path(), "Wafer_Summary_2.xlsx");
        touch(dir.path(), "other.xlsx");
        touch(dir.path(), "~$Wafer_Summary_1.xlsx");

        let scanner = FileScanner::new(dir.path().to_path_buf(), ScanConfig::default());
        let files = scanner.scan().unwrap();

        assert_eq!(names(&files), vec!["Wafer_Summary_1.xlsx", "Wafer_Summary_2.xlsx"]);
    }

    #[test]
    fn test_scan_is_recursive_and_skips_excluded_dirs() {
        let dir = TempDir::new().unwrap();
        touch(dir.path(), "lot1/Wafer_Summary_A.xlsx");
        touch(dir.path(), "lot2/Wafer_Summary_B.xls");
        touch(dir.path(), ".cache/Wafer_Summary_C.xlsx");
        touch(dir.path(), "target/Wafer_Summary_D.xlsx");

        let scanner = FileScanner::new(dir.path().to_path_buf(), ScanConfig::default());
        let files = scanner.scan().unwrap();

        assert_eq!(
            names(&files),
            vec!["lot1/Wafer_Summary_A.xlsx", "lot2/Wafer_Summary_B.xls"]
        );
    }

    #[test]
    fn test_scan_respects_max_files() {
        let dir = TempDir::new().unwrap();
        for i in 1..=5 {
            touch(dir.path(), &format!("Wafer_Summary_{}.xlsx", i));
        }

        let config = ScanConfig {
            max_files: Some(2),
            ..ScanConfig::default()
        };
        let files = FileScanner::new(dir.path().to_path_buf(), config).scan().unwrap();
        assert_eq!(files.len(), 2);

        let config = ScanConfig {
            max_files: Some(0),
            ..ScanConfig::default()
        };
        let files = FileScanner::new(dir.path().to_path_buf(), config).scan().unwrap();
        assert!(files.is_empty());
    }

    #[test]
    fn test_scan_empty_directory() {
        let dir = TempDir::new().unwrap();
        let files = FileScanner::new(dir.path().to_path_buf(), ScanConfig::default())
            .scan()
            .unwrap();
        assert!(files.is_empty());
    }

    #[test]
    fn test_scan_missing_directory() {
        let scanner = FileScanner::new(PathBuf::from("/no/such/wafer/dir"), ScanConfig::default());
        assert!(matches!(scanner.scan(), Err(YieldError::InputDirectory(_))));
    }
}
