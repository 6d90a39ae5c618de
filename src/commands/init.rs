use crate::config::{Config, CONFIG_FILE};
use anyhow::{bail, Context, Result};
use std::path::Path;

pub fn run(force: bool) -> Result<()> {
    write_config(Path::new(CONFIG_FILE), force)
}

fn write_config(path: &Path, force: bool) -> Result<()> {
    if path.exists() && !force {
        bail!(
            "{} already exists, pass --force to overwrite",
            path.display()
        );
    }
    let rendered = Config::default_toml()?;
    std::fs::write(path, rendered)
        .with_context(|| format!("failed to write {}", path.display()))?;
    println!("wrote {}", path.display());
    Ok(())
}
