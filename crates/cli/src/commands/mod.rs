pub mod ask;
pub mod config_cmd;
pub mod serve;

use std::path::PathBuf;

use kbchat_config::AppConfig;

/// Load the explicit config file if given, else search the default paths.
pub fn load_config(path: Option<PathBuf>) -> Result<AppConfig, Box<dyn std::error::Error>> {
    let config = match path {
        Some(path) => {
            let mut config = AppConfig::load_from(&path)?;
            config.apply_env();
            config.validate()?;
            config
        }
        None => AppConfig::load()?,
    };
    Ok(config)
}
