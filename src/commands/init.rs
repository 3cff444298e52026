use anyhow::{bail, Result};
use serde::Serialize;
use std::path::{Path, PathBuf};

use crate::config::{write_config_atomic, Config};

pub struct InitInputs {
    pub package_dir: Option<String>,
    pub force: bool,
}

#[derive(Debug, Serialize)]
pub struct InitResult {
    pub config_path: PathBuf,
    pub package_dir: PathBuf,
    pub certificate: String,
    pub inf: String,
}

pub fn cmd_init(inputs: InitInputs, config_path: &Path) -> Result<InitResult> {
    let mut config = Config::default();
    if let Some(dir) = inputs.package_dir {
        if dir.trim().is_empty() {
            bail!("--package-dir must not be empty");
        }
        config.package.dir = PathBuf::from(dir);
    }

    write_config_atomic(config_path, &config, inputs.force)?;

    Ok(InitResult {
        config_path: config_path.to_path_buf(),
        package_dir: config.package.dir,
        certificate: config.package.certificate,
        inf: config.package.inf,
    })
}

pub fn format_init_human(result: &InitResult) -> String {
    [
        format!("Config written to {}", result.config_path.display()),
        format!("Package dir: {}", result.package_dir.display()),
        format!("Certificate: {}", result.certificate),
        format!("Driver INF: {}", result.inf),
    ]
    .join("\n")
}
