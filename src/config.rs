use std::{fs::read_to_string, path::Path, path::PathBuf};

use anyhow::{anyhow, Context};
use serde::Deserialize;

fn default_rgi_data_dir() -> PathBuf {
    PathBuf::from("data/rgi/raw")
}

fn default_show_progress() -> bool {
    true
}

#[derive(Deserialize, Debug, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// Root directory of the RGI 6.0 regional shapefiles.
    #[serde(default = "default_rgi_data_dir")]
    pub rgi_data_dir: PathBuf,
    #[serde(default = "default_show_progress")]
    pub show_progress: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            rgi_data_dir: default_rgi_data_dir(),
            show_progress: default_show_progress(),
        }
    }
}

impl Config {
    pub fn from_yaml(contents: &str) -> anyhow::Result<Self> {
        serde_yaml::from_str(contents).context("Parsing config")
    }

    pub fn load(filepath: &Path) -> anyhow::Result<Self> {
        if !filepath.exists() {
            return Err(anyhow!("Config file {:?} not found", filepath));
        }
        let contents = read_to_string(filepath)?;
        Self::from_yaml(&contents)
    }
}
