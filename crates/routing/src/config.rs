//! Run configuration
//!
//! A run is described by a JSON document with `paths`, `outputs` and
//! `options` sections. Relative paths resolve against the directory holding
//! the configuration file.

use crate::output::LayoutKind;
use crate::scaling::OutputUnits;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use uhroute_core::io::write_json;
use uhroute_core::{Error, Result};

/// A list of files, or one path that is either a file or a directory of
/// `*.json` files taken in name order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FileSet {
    List(Vec<PathBuf>),
    Single(PathBuf),
}

impl FileSet {
    fn rebase(&mut self, base: &Path) {
        match self {
            FileSet::List(paths) => paths.iter_mut().for_each(|p| *p = rebase(base, p)),
            FileSet::Single(p) => *p = rebase(base, p),
        }
    }

    /// Expand into the ordered list of files
    pub fn resolve(&self) -> Result<Vec<PathBuf>> {
        match self {
            FileSet::List(paths) => Ok(paths.clone()),
            FileSet::Single(p) if p.is_dir() => {
                let mut files = Vec::new();
                for entry in std::fs::read_dir(p)? {
                    let path = entry?.path();
                    if path.extension().is_some_and(|e| e == "json") {
                        files.push(path);
                    }
                }
                files.sort();
                Ok(files)
            }
            FileSet::Single(p) => Ok(vec![p.clone()]),
        }
    }
}

fn rebase(base: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        base.join(path)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PathsConfig {
    pub uh_files: FileSet,
    pub flux_files: FileSet,
    #[serde(default)]
    pub grid_file: Option<PathBuf>,
    #[serde(default)]
    pub out_path: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub initial_state: Option<PathBuf>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OutputsConfig {
    /// `flat`, `grid` or `none`; flat when absent
    #[serde(default)]
    pub layout: Option<LayoutKind>,
    /// `volume` or `mass`; volume when absent
    #[serde(default)]
    pub units: Option<OutputUnits>,
    /// Timestep labels (or parts of them) at which state is saved
    #[serde(default)]
    pub state_at: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub case_name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptionsConfig {
    #[serde(default)]
    pub verbose: bool,
    /// 0 = all cores, 1 = sequential, n = dedicated pool
    #[serde(default = "default_threads")]
    pub threads: usize,
}

fn default_threads() -> usize {
    0
}

impl Default for OptionsConfig {
    fn default() -> Self {
        Self {
            verbose: false,
            threads: default_threads(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunConfig {
    pub paths: PathsConfig,
    #[serde(default)]
    pub outputs: OutputsConfig,
    #[serde(default)]
    pub options: OptionsConfig,
}

/// Paths after validation
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedPaths {
    pub uh_files: Vec<PathBuf>,
    pub flux_files: Vec<PathBuf>,
    pub grid_file: PathBuf,
    pub out_path: PathBuf,
    pub initial_state: Option<PathBuf>,
}

impl RunConfig {
    /// Read a configuration file and make its paths absolute
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| {
            Error::Configuration(format!("cannot read {}: {}", path.display(), e))
        })?;
        let mut config: RunConfig = serde_json::from_str(&text).map_err(|e| {
            Error::Configuration(format!("invalid configuration {}: {}", path.display(), e))
        })?;

        let base = match path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => PathBuf::from("."),
        };
        let base = base.canonicalize().unwrap_or(base);
        config.rebase(&base);
        Ok(config)
    }

    /// Resolve every relative path against `base`
    pub fn rebase(&mut self, base: &Path) {
        self.paths.uh_files.rebase(base);
        self.paths.flux_files.rebase(base);
        for p in [
            &mut self.paths.grid_file,
            &mut self.paths.out_path,
            &mut self.paths.initial_state,
        ]
        .into_iter()
        .flatten()
        {
            *p = rebase(base, p);
        }
    }

    /// Check required resources and expand file sets.
    ///
    /// Every failure here is a `Configuration` error.
    pub fn resolve_paths(&self) -> Result<ResolvedPaths> {
        let grid_file = self
            .paths
            .grid_file
            .clone()
            .ok_or_else(|| Error::Configuration("required file not provided: grid_file".into()))?;
        let out_path = self
            .paths
            .out_path
            .clone()
            .ok_or_else(|| Error::Configuration("required path not provided: out_path".into()))?;

        if let Some(state) = &self.paths.initial_state {
            if !state.exists() {
                return Err(Error::Configuration(format!(
                    "initial state file {} does not exist",
                    state.display()
                )));
            }
        }

        let uh_files = self.paths.uh_files.resolve()?;
        if uh_files.is_empty() {
            return Err(Error::Configuration("no unit hydrograph files found".into()));
        }
        let flux_files = self.paths.flux_files.resolve()?;

        Ok(ResolvedPaths {
            uh_files,
            flux_files,
            grid_file,
            out_path,
            initial_state: self.paths.initial_state.clone(),
        })
    }

    pub fn layout(&self) -> LayoutKind {
        self.outputs.layout.unwrap_or_else(|| {
            tracing::warn!("outputs.layout not set, output layout will be flat");
            LayoutKind::Flat
        })
    }

    pub fn units(&self) -> OutputUnits {
        self.outputs.units.unwrap_or_else(|| {
            tracing::warn!("outputs.units not set, output units will be volume");
            OutputUnits::Volume
        })
    }

    /// Whether state should be saved after the timestep labelled `label`
    pub fn captures_state(&self, label: &str) -> bool {
        self.outputs.state_at.iter().any(|s| label.contains(s.as_str()))
    }

    /// Configuration that resumes from `state_file` with the remaining flux files
    pub fn restart(&self, state_file: &Path, remaining: &[PathBuf]) -> Self {
        let mut next = self.clone();
        next.paths.flux_files = FileSet::List(remaining.to_vec());
        next.paths.initial_state = Some(state_file.to_path_buf());
        next
    }

    pub fn write(&self, path: &Path) -> Result<()> {
        write_json(self, path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINIMAL: &str = r#"{
        "paths": {
            "uh_files": ["uh/a.json", "uh/b.json"],
            "flux_files": "flux",
            "grid_file": "grid.json",
            "out_path": "out"
        }
    }"#;

    #[test]
    fn test_defaults() {
        let config: RunConfig = serde_json::from_str(MINIMAL).unwrap();
        assert_eq!(config.outputs.layout, None);
        assert_eq!(config.layout(), LayoutKind::Flat);
        assert_eq!(config.units(), OutputUnits::Volume);
        assert_eq!(config.options.threads, 0);
        assert!(!config.captures_state("anything"));
    }

    #[test]
    fn test_load_rebases_relative_paths() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("run.json");
        std::fs::write(&path, MINIMAL).unwrap();

        let config = RunConfig::load(&path).unwrap();
        let base = dir.path().canonicalize().unwrap();
        assert_eq!(config.paths.grid_file, Some(base.join("grid.json")));
        assert_eq!(config.paths.flux_files, FileSet::Single(base.join("flux")));
        match &config.paths.uh_files {
            FileSet::List(files) => assert_eq!(files[1], base.join("uh/b.json")),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_missing_required_paths() {
        let json = r#"{"paths": {"uh_files": [], "flux_files": []}}"#;
        let config: RunConfig = serde_json::from_str(json).unwrap();
        let err = config.resolve_paths().unwrap_err();
        assert!(matches!(err, Error::Configuration(ref m) if m.contains("grid_file")));
    }

    #[test]
    fn test_missing_initial_state_is_fatal() {
        let mut config: RunConfig = serde_json::from_str(MINIMAL).unwrap();
        config.paths.initial_state = Some(PathBuf::from("/nonexistent/state.json"));
        assert!(matches!(config.resolve_paths(), Err(Error::Configuration(_))));
    }

    #[test]
    fn test_directory_file_set_is_sorted() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["b.json", "a.json", "notes.txt", "c.json"] {
            std::fs::write(dir.path().join(name), "{}").unwrap();
        }
        let files = FileSet::Single(dir.path().to_path_buf()).resolve().unwrap();
        let names: Vec<_> = files
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["a.json", "b.json", "c.json"]);
    }

    #[test]
    fn test_state_labels_and_restart() {
        let mut config: RunConfig = serde_json::from_str(MINIMAL).unwrap();
        config.outputs.state_at = vec!["2001-01-01-03".into()];
        assert!(config.captures_state("rasm.2001-01-01-03"));
        assert!(!config.captures_state("rasm.2001-01-01-04"));

        let next = config.restart(Path::new("/out/state_x.json"), &[PathBuf::from("/f/4.json")]);
        assert_eq!(next.paths.initial_state, Some(PathBuf::from("/out/state_x.json")));
        assert_eq!(next.paths.flux_files, FileSet::List(vec![PathBuf::from("/f/4.json")]));
        assert_eq!(next.outputs, config.outputs);
    }
}
