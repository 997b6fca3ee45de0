use crate::error::{GeneratorError, Result};
use crate::SymbolRendererKind;
use serde::{Deserialize, Serialize};
use std::fs;

#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfigFile {
    pub php_binary: Option<String>,
    pub lint: Option<bool>,
    pub lint_timeout_secs: Option<u64>,
    pub namespace: Option<String>,
    pub output_directory: Option<String>,
    pub symbol_renderer: Option<SymbolRendererKind>,
}

pub fn load(config_path: &str) -> Result<ConfigFile> {
    let config_content = fs::read_to_string(config_path).map_err(|e| {
        GeneratorError::FileNotFound {
            path: format!("Config file {}: {}", config_path, e),
        }
    })?;
    let config = parse(config_path, &config_content)?;
    log::info!("Loaded configuration from {}", config_path);
    Ok(config)
}

fn parse(config_path: &str, config_content: &str) -> Result<ConfigFile> {
    if config_path.ends_with(".json") {
        serde_json::from_str(config_content).map_err(|e| GeneratorError::InvalidFormat {
            message: format!("Invalid JSON config: {}", e),
        })
    } else if config_path.ends_with(".toml") {
        toml::from_str(config_content).map_err(|e| GeneratorError::InvalidFormat {
            message: format!("Invalid TOML config: {}", e),
        })
    } else {
        Err(GeneratorError::InvalidFormat {
            message: "Config file must be .json or .toml format".to_string(),
        })
    }
}
