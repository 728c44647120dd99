//! Implementation of the `wavesmith init` command.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use tokio::fs;

use crate::cli::output::{output, CommandOutput};
use crate::domain::models::Config;
use crate::infrastructure::config::loader::CONFIG_DIR;

#[derive(Args, Debug)]
pub struct InitArgs {
    /// Overwrite an existing configuration
    #[arg(long, short)]
    pub force: bool,

    /// Target directory (defaults to current directory)
    #[arg(default_value = ".")]
    pub path: PathBuf,
}

#[derive(Debug, serde::Serialize)]
pub struct InitOutput {
    pub success: bool,
    pub message: String,
    pub config_path: PathBuf,
}

impl CommandOutput for InitOutput {
    fn to_human(&self) -> String {
        if self.success {
            format!("{}\nConfig written to {}", self.message, self.config_path.display())
        } else {
            self.message.clone()
        }
    }
}

const CONFIG_HEADER: &str = "\
# wavesmith configuration
# Precedence: defaults < this file < local.yaml < WAVESMITH_* env vars
# (nested keys use `__`, e.g. WAVESMITH_RESOURCES__MAX_WORKERS=4).
";

/// Write the default config into the project.
pub async fn execute(args: InitArgs, json_mode: bool) -> Result<()> {
    let dir = args.path.join(CONFIG_DIR);
    let config_path = dir.join("config.yaml");

    if config_path.exists() && !args.force {
        let output_data = InitOutput {
            success: false,
            message: "Project already initialized. Use --force to overwrite.".to_string(),
            config_path,
        };
        output(&output_data, json_mode);
        return Ok(());
    }

    fs::create_dir_all(&dir)
        .await
        .with_context(|| format!("Failed to create {}", dir.display()))?;

    let yaml = serde_yaml::to_string(&Config::default()).context("Failed to render default config")?;
    fs::write(&config_path, format!("{CONFIG_HEADER}{yaml}"))
        .await
        .with_context(|| format!("Failed to write {}", config_path.display()))?;

    let output_data = InitOutput {
        success: true,
        message: if args.force {
            "Configuration reset to defaults.".to_string()
        } else {
            "Project initialized.".to_string()
        },
        config_path,
    };
    output(&output_data, json_mode);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::config::ConfigLoader;

    #[tokio::test]
    async fn test_init_writes_loadable_config() {
        let dir = tempfile::tempdir().unwrap();
        execute(
            InitArgs {
                force: false,
                path: dir.path().to_path_buf(),
            },
            true,
        )
        .await
        .unwrap();

        let path = dir.path().join(CONFIG_DIR).join("config.yaml");
        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.starts_with("# wavesmith configuration"));

        let config = ConfigLoader::load_from_file(&path).unwrap();
        assert_eq!(config.resources.bounds.max_workers, 3);
    }

    #[tokio::test]
    async fn test_init_keeps_existing_without_force() {
        let dir = tempfile::tempdir().unwrap();
        let base = dir.path().join(CONFIG_DIR);
        std::fs::create_dir_all(&base).unwrap();
        std::fs::write(base.join("config.yaml"), "logging:\n  level: warn\n").unwrap();

        let args = InitArgs {
            force: false,
            path: dir.path().to_path_buf(),
        };
        execute(args, true).await.unwrap();
        let text = std::fs::read_to_string(base.join("config.yaml")).unwrap();
        assert_eq!(text, "logging:\n  level: warn\n");

        let args = InitArgs {
            force: true,
            path: dir.path().to_path_buf(),
        };
        execute(args, true).await.unwrap();
        let text = std::fs::read_to_string(base.join("config.yaml")).unwrap();
        assert!(text.contains("max_workers"));
    }
}
