//! Shared helper functions for CLI commands.

use std::io::Read;
use std::path::Path;

use console::{style, StyledObject};

pub fn success() -> StyledObject<&'static str> {
    style("✓").green()
}

pub fn error() -> StyledObject<&'static str> {
    style("✗").red()
}

pub fn arrow() -> StyledObject<&'static str> {
    style("→").cyan()
}

/// Read a captured request from a file, or from stdin when `source` is "-".
pub fn read_capture(source: &str) -> anyhow::Result<String> {
    let raw = if source == "-" {
        let mut buf = String::new();
        std::io::stdin().read_to_string(&mut buf)?;
        buf
    } else {
        let path = Path::new(source);
        if !path.exists() {
            anyhow::bail!("Capture file not found: {}", path.display());
        }
        std::fs::read_to_string(path)?
    };

    if raw.trim().is_empty() {
        anyhow::bail!("Capture is empty");
    }
    Ok(raw)
}

/// Write `contents` to `path`, or to stdout when no path is given.
pub fn write_output(path: Option<&Path>, contents: &str) -> anyhow::Result<()> {
    match path {
        Some(path) => {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                std::fs::create_dir_all(parent)?;
            }
            std::fs::write(path, contents)?;
            eprintln!("  {} Wrote {}", style("→").dim(), path.display());
        }
        None => println!("{}", contents),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_read_capture_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "curl 'https://x.example.com/search'").unwrap();
        let raw = read_capture(file.path().to_str().unwrap()).unwrap();
        assert!(raw.starts_with("curl"));
    }

    #[test]
    fn test_read_capture_missing_or_empty() {
        assert!(read_capture("/nonexistent/capture.txt").is_err());
        let file = tempfile::NamedTempFile::new().unwrap();
        assert!(read_capture(file.path().to_str().unwrap()).is_err());
    }

    #[test]
    fn test_write_output_creates_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out").join("result.json");
        write_output(Some(&path), "{}").unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "{}");
    }
}
