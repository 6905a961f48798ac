mod types;

pub use types::*;

use anyhow::{Context, Result};
use std::path::Path;

/// Load configuration from a TOML file
pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {:?}", path))?;

    let config: Config = toml::from_str(&content)
        .with_context(|| format!("Failed to parse config file: {:?}", path))?;

    validate_config(&config)?;

    Ok(config)
}

/// Load config from default locations or return default config
pub fn load_config_or_default(custom_path: Option<&Path>) -> Result<Config> {
    if let Some(path) = custom_path {
        return load_config(path);
    }

    // Try default locations
    let default_paths = [
        "./config.toml",
        "./storyreel.toml",
        "~/.config/storyreel/config.toml",
        "/etc/storyreel/config.toml",
    ];

    for path_str in default_paths {
        let path = shellexpand::tilde(path_str);
        let path = Path::new(path.as_ref());
        if path.exists() {
            return load_config(path);
        }
    }

    Ok(Config::default())
}

/// Validate configuration
fn validate_config(config: &Config) -> Result<()> {
    if config.pipeline.max_concurrent_images == 0
        || config.pipeline.max_concurrent_audio == 0
        || config.pipeline.max_concurrent_renders == 0
    {
        anyhow::bail!("Concurrency ceilings must be at least 1");
    }

    if config.render.width % 2 != 0 || config.render.height % 2 != 0 {
        anyhow::bail!(
            "Output resolution {}x{} must have even dimensions for yuv420p",
            config.render.width,
            config.render.height
        );
    }

    if config.render.fps == 0 {
        anyhow::bail!("Frame rate cannot be 0");
    }

    if config.render.max_zoom <= 1.0 {
        anyhow::bail!("max_zoom must be greater than 1.0");
    }

    Ok(())
}
