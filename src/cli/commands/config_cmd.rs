//! Configuration command.

use console::style;

use resdex_scrape::Settings;

/// Print the effective settings.
pub fn cmd_config(settings: &Settings) -> anyhow::Result<()> {
    let source = settings
        .source_path
        .as_ref()
        .map(|p| p.display().to_string())
        .unwrap_or_else(|| "defaults".to_string());
    eprintln!("{} Source: {} (plus RESDEX_* overrides)", style("→").dim(), source);

    print!("{}", settings.to_toml()?);
    Ok(())
}
