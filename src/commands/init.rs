//! Init command implementation

use crate::config::Config;
use crate::error::{Error, Result};
use crate::target::TargetDb;
use std::path::PathBuf;
use tracing::info;

#[derive(Debug, Clone)]
pub struct InitOptions {
    pub base_dir: PathBuf,
    pub config_path: PathBuf,
    pub force: bool,
}

/// Write a default configuration and create the target schema
pub async fn cmd_init(options: InitOptions) -> Result<Config> {
    let InitOptions {
        base_dir,
        config_path,
        force,
    } = options;

    if config_path.exists() && !force {
        return Err(Error::Config(format!(
            "Config already exists at {}. Use --force to overwrite.",
            config_path.display()
        )));
    }

    let mut config = Config::default();
    config.paths.base_dir = base_dir;
    config.paths.config_file = config_path;
    config.validate()?;
    config.save()?;

    let db = TargetDb::connect(&config).await?;
    if !db.is_initialized().await? {
        db.init_schema().await?;
    }
    db.close().await;

    info!("Initialized cmg-migrate in {:?}", config.paths.base_dir);
    Ok(config)
}
