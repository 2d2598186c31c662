//! Configuration commands.

use std::io::Write;
use std::path::Path;

use crate::config::ClientConfig;
use crate::error::ClientResult;

/// Dump the current configuration to stdout.
pub fn dump(config: &ClientConfig, path: &Path) -> ClientResult<()> {
    write_dump(config, path, &mut std::io::stdout().lock())
}

/// Show the configuration file path.
pub fn path(path: &Path) -> ClientResult<()> {
    println!("config: {}", path.display());
    Ok(())
}

fn write_dump(config: &ClientConfig, path: &Path, out: &mut impl Write) -> ClientResult<()> {
    writeln!(out, "# config.toml ({})", path.display())?;
    writeln!(out, "{}", config.to_toml()?)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dump_includes_path_and_values() {
        let mut config = ClientConfig::default();
        config.exclude = vec!["Lunch".to_string()];

        let mut out = Vec::new();
        write_dump(&config, Path::new("/home/me/.config/agenda/config.toml"), &mut out).unwrap();
        let text = String::from_utf8(out).unwrap();

        assert!(text.starts_with("# config.toml (/home/me/.config/agenda/config.toml)"));
        assert!(text.contains("Lunch"));
        assert!(text.contains("[window]"));
        assert!(text.contains("[auth]"));
    }
}
