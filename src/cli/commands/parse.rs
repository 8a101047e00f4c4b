//! Capture validation command.

use console::style;

use resdex_scrape::{SessionDescriptor, Settings};

use crate::cli::helpers::{error, read_capture, success};

/// Parse a capture without sending anything and print the redacted
/// descriptor.
pub fn cmd_parse(settings: &Settings, capture: &str) -> anyhow::Result<()> {
    let raw = read_capture(capture)?;

    match SessionDescriptor::parse(&raw, &settings.session) {
        Ok(descriptor) => {
            eprintln!(
                "{} Capture is usable ({} product, {} cookies)",
                success(),
                style(format!("{:?}", descriptor.flavor).to_lowercase()).bold(),
                descriptor.cookie_names().len()
            );
            println!("{}", serde_json::to_string_pretty(&descriptor.redacted())?);
            Ok(())
        }
        Err(e) => {
            eprintln!("{} {}", error(), e);
            Err(e.into())
        }
    }
}
