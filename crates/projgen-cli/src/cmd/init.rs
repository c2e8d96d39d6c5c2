use anyhow::Context;
use projgen_core::{config::Config, io, paths};
use std::path::Path;

pub fn run(root: &Path) -> anyhow::Result<()> {
    println!("Initializing projgen in: {}", root.display());

    let config_path = paths::config_path(root);
    let config = if config_path.exists() {
        println!("  exists:  {}", paths::CONFIG_FILE);
        Config::load(root).context("failed to read projgen.yaml")?
    } else {
        let config = Config::default();
        config.save(root).context("failed to write projgen.yaml")?;
        println!("  created: {}", paths::CONFIG_FILE);
        config
    };

    let projects = config.projects_path(root);
    io::ensure_dir(&projects).with_context(|| format!("failed to create {}", projects.display()))?;
    println!("  ready:   {}", projects.display());

    for warning in config.validate() {
        println!("  {:?}: {}", warning.level, warning.message);
    }
    Ok(())
}
