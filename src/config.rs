use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::paths::expand_tilde;

pub const DEFAULT_CERTIFICATE: &str = "TailLight.cer";
pub const DEFAULT_INF: &str = "TailLight.inf";
pub const DEFAULT_CERTMGR: &str = "certmgr.exe";
pub const DEFAULT_PNPUTIL: &str = "PNPUTIL";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub package: PackageConfig,
    #[serde(default)]
    pub tools: ToolsConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PackageConfig {
    pub dir: PathBuf,
    pub certificate: String,
    pub inf: String,
}

impl Default for PackageConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("."),
            certificate: DEFAULT_CERTIFICATE.to_string(),
            inf: DEFAULT_INF.to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolsConfig {
    pub certmgr: String,
    pub pnputil: String,
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            certmgr: DEFAULT_CERTMGR.to_string(),
            pnputil: DEFAULT_PNPUTIL.to_string(),
        }
    }
}

/// Config after tilde expansion and validation. This is what the installer
/// consumes.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedConfig {
    pub package_dir: PathBuf,
    pub certificate: String,
    pub inf: String,
    pub certmgr: String,
    pub pnputil: String,
}

impl Default for ResolvedConfig {
    fn default() -> Self {
        Self {
            package_dir: PathBuf::from("."),
            certificate: DEFAULT_CERTIFICATE.to_string(),
            inf: DEFAULT_INF.to_string(),
            certmgr: DEFAULT_CERTMGR.to_string(),
            pnputil: DEFAULT_PNPUTIL.to_string(),
        }
    }
}

pub fn default_config_path() -> Result<PathBuf> {
    let proj = directories::ProjectDirs::from("", "", "taillight-install")
        .context("could not determine config directory")?;
    Ok(proj.config_dir().join("config.toml"))
}

/// Only an explicitly passed path is read, and it must exist. Without one the
/// built-in defaults apply, even if `init` wrote a file to the default path.
pub fn load_config_or_default(explicit: Option<&Path>) -> Result<ResolvedConfig> {
    let Some(path) = explicit else {
        tracing::debug!("no --config given, using defaults");
        return Ok(ResolvedConfig::default());
    };
    if !path.exists() {
        bail!("config not found at {}", path.display());
    }
    tracing::debug!(path = %path.display(), "loading config");
    load_config(path)
}

pub fn load_config(path: &Path) -> Result<ResolvedConfig> {
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read config from {}", path.display()))?;
    parse_config(&contents)
}

pub fn parse_config(contents: &str) -> Result<ResolvedConfig> {
    let raw: Config = toml::from_str(contents).context("failed to parse config TOML")?;
    resolve(raw)
}

fn resolve(raw: Config) -> Result<ResolvedConfig> {
    let fields = [
        ("package.certificate", &raw.package.certificate),
        ("package.inf", &raw.package.inf),
        ("tools.certmgr", &raw.tools.certmgr),
        ("tools.pnputil", &raw.tools.pnputil),
    ];
    for (key, value) in fields {
        if value.trim().is_empty() {
            bail!("{} must not be empty", key);
        }
    }

    let package_dir = expand_tilde(raw.package.dir.to_str().unwrap_or(""));
    if package_dir.as_os_str().is_empty() {
        bail!("package.dir must not be empty");
    }

    Ok(ResolvedConfig {
        package_dir,
        certificate: raw.package.certificate,
        inf: raw.package.inf,
        certmgr: raw.tools.certmgr,
        pnputil: raw.tools.pnputil,
    })
}

pub fn write_config_atomic(path: &Path, config: &Config, force: bool) -> Result<()> {
    if path.exists() && !force {
        bail!(
            "config already exists at {}\nUse --force to overwrite.",
            path.display()
        );
    }

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create config directory {}", parent.display()))?;
    }

    let content = toml::to_string_pretty(config).context("failed to serialize config")?;

    let tmp_path = path.with_extension("toml.tmp");
    std::fs::write(&tmp_path, &content)
        .with_context(|| format!("failed to write temp config to {}", tmp_path.display()))?;
    std::fs::rename(&tmp_path, path)
        .with_context(|| format!("failed to rename config to {}", path.display()))?;

    Ok(())
}
