use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};

use crate::cli::Args;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CliConfig {
    #[serde(default = "CliConfig::default_store_root")]
    pub store_root: String,
    #[serde(default = "CliConfig::default_project")]
    pub project: String,
    #[serde(default = "CliConfig::default_log_level")]
    pub log_level: String,
    #[serde(default)]
    pub json_logs: bool,
    /// Overrides the project's own environment setting.
    #[serde(default)]
    pub environment: Option<String>,
}

impl Default for CliConfig {
    fn default() -> Self {
        Self {
            store_root: Self::default_store_root(),
            project: Self::default_project(),
            log_level: Self::default_log_level(),
            json_logs: false,
            environment: None,
        }
    }
}

impl CliConfig {
    fn default_store_root() -> String {
        ".bistool".to_string()
    }

    fn default_project() -> String {
        "default".to_string()
    }

    fn default_log_level() -> String {
        "info".to_string()
    }

    pub fn store_root(&self) -> PathBuf {
        PathBuf::from(&self.store_root)
    }

    /// Command-line flags win over the file.
    pub fn apply_args(mut self, args: &Args) -> Self {
        if let Some(root) = &args.store_root {
            self.store_root = root.display().to_string();
        }
        if let Some(project) = &args.project {
            self.project = project.clone();
        }
        if let Some(env) = &args.env {
            self.environment = Some(env.clone());
        }
        if let Some(level) = &args.log_level {
            self.log_level = level.clone();
        }
        self.json_logs |= args.json_logs;
        self
    }
}

pub fn load_config(path: Option<&Path>) -> Result<CliConfig> {
    match path {
        None => Ok(CliConfig::default()),
        Some(p) => {
            let raw = fs::read_to_string(p).with_context(|| format!("reading config {}", p.display()))?;
            let mut cfg: CliConfig =
                serde_json::from_str(&raw).map_err(|e| anyhow!("invalid config json: {e}"))?;
            let defaults = CliConfig::default();
            if cfg.store_root.trim().is_empty() {
                cfg.store_root = defaults.store_root;
            }
            if cfg.project.trim().is_empty() {
                cfg.project = defaults.project;
            }
            if cfg.log_level.trim().is_empty() {
                cfg.log_level = defaults.log_level;
            }
            Ok(cfg)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    fn write_config(body: &str) -> (tempfile::TempDir, PathBuf) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bistool.json");
        fs::write(&path, body).unwrap();
        (dir, path)
    }

    #[test]
    fn test_missing_path_gives_defaults() {
        let cfg = load_config(None).unwrap();
        assert_eq!(cfg, CliConfig::default());
        assert_eq!(cfg.store_root(), PathBuf::from(".bistool"));
    }

    #[test]
    fn test_blank_fields_fall_back() {
        let (_dir, path) = write_config(r#"{"storeRoot": " ", "project": "shop", "logLevel": ""}"#);
        let cfg = load_config(Some(&path)).unwrap();
        assert_eq!(cfg.store_root, ".bistool");
        assert_eq!(cfg.project, "shop");
        assert_eq!(cfg.log_level, "info");
    }

    #[test]
    fn test_invalid_json_is_an_error() {
        let (_dir, path) = write_config("{");
        let err = load_config(Some(&path)).unwrap_err();
        assert!(err.to_string().contains("invalid config json"));
    }

    #[test]
    fn test_args_override_file() {
        let (_dir, path) = write_config(r#"{"project": "shop", "environment": "dev"}"#);
        let args = Args::parse_from(["bistool", "--env", "prod", "--json-logs", "sessions"]);
        let cfg = load_config(Some(&path)).unwrap().apply_args(&args);
        assert_eq!(cfg.project, "shop");
        assert_eq!(cfg.environment.as_deref(), Some("prod"));
        assert!(cfg.json_logs);
    }
}
