use anyhow::{Context, Result};

use crate::config::LogConfig;

/// Install the global logger: stderr plus an optional append-only log file.
///
/// Fails if a logger is already installed.
pub fn init_logging(config: &LogConfig) -> Result<()> {
    let mut dispatch = fern::Dispatch::new()
        .format(|out, message, record| {
            out.finish(format_args!(
                "[{} {} {}] {}",
                chrono::Local::now().format("%Y-%m-%d %H:%M:%S%.3f"),
                record.level(),
                record.target(),
                message
            ))
        })
        .level(config.level)
        .chain(std::io::stderr());

    if let Some(path) = &config.log_file {
        let file = fern::log_file(path)
            .with_context(|| format!("Failed to open log file: {}", path.display()))?;
        dispatch = dispatch.chain(file);
    }

    dispatch
        .apply()
        .context("A global logger is already installed")?;
    Ok(())
}

/// Shorten a secret for log output
pub(crate) fn redact(secret: &str) -> String {
    let prefix: String = secret.chars().take(6).collect();
    if prefix.len() < secret.len() {
        format!("{}...", prefix)
    } else {
        "***".to_string()
    }
}
