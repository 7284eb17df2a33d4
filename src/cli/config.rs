use crate::config::generate::generate_starter_config;
use std::fs;
use std::path::PathBuf;

pub fn init(stdout: bool) -> Result<(), Box<dyn std::error::Error>> {
    let config_content = generate_starter_config();

    if stdout {
        print!("{}", config_content);
        return Ok(());
    }

    let config_path = user_config_path()
        .unwrap_or_else(|| PathBuf::from("/etc/cwsource/config.yml"));

    if config_path.exists() {
        return Err(format!(
            "config file already exists at {}; remove it first or use --stdout",
            config_path.display()
        )
        .into());
    }

    if let Some(parent) = config_path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(&config_path, config_content)?;

    println!("Config file written to {}", config_path.display());
    Ok(())
}

/// `~/.config/cwsource/config.yml`, if its directory can be created.
fn user_config_path() -> Option<PathBuf> {
    let user_config = dirs::home_dir()?.join(".config/cwsource/config.yml");
    let parent = user_config.parent()?;

    match fs::create_dir_all(parent) {
        Ok(()) => Some(user_config),
        Err(e) => {
            eprintln!("Warning: could not create {}: {}", parent.display(), e);
            eprintln!("Falling back to /etc/cwsource/config.yml");
            None
        }
    }
}
