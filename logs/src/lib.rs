//! Colored, leveled logging setup shared by `retargetd` and its tests.
//!
//! Wraps `env_logger` with a `time`-stamped, `ansi_term`-colored line format and an
//! `RUST_LOG`-style filter string, so every binary in the workspace configures its output
//! the same way instead of reaching for `env_logger::init()` directly.

extern crate ansi_term;
extern crate env_logger;
extern crate log;
extern crate time;

use std::env;
use std::io::Write;
use ansi_term::Colour;
use env_logger::Builder;
use log::Level;

/// Logging setup requested by a host binary's configuration/CLI layer.
#[derive(Debug, Clone)]
pub struct LogConfig {
	/// `RUST_LOG`-style filter string, e.g. `"retarget=debug,retargetd=info"`. Falls back
	/// to the `RUST_LOG` environment variable, then to `"info"`, when empty.
	pub mode: Option<String>,
	/// Whether to colorize level tags. The host CLI is expected to turn this off when
	/// writing to a file or a non-interactive pipe.
	pub color: bool,
}

impl Default for LogConfig {
	fn default() -> Self {
		LogConfig { mode: None, color: true }
	}
}

/// Installs the process-wide logger. Safe to call at most once; a second call returns an
/// error rather than panicking, matching `env_logger`'s own `try_init` behavior.
pub fn init(config: LogConfig) -> Result<(), String> {
	let filter = config
		.mode
		.clone()
		.or_else(|| env::var("RUST_LOG").ok())
		.unwrap_or_else(|| "info".to_owned());

	let color = config.color;

	let mut builder = Builder::new();
	builder.parse(&filter);
	builder.format(move |buf, record| {
		let timestamp = time::now().strftime("%Y-%m-%d %H:%M:%S%.3f").expect("static strftime format is always valid");
		let level = if color { colored_level(record.level()) } else { record.level().to_string() };
		writeln!(buf, "{} {} {} {}", timestamp, level, record.target(), record.args())
	});

	builder.try_init().map_err(|e| e.to_string())
}

fn colored_level(level: Level) -> String {
	match level {
		Level::Error => Colour::Red.bold().paint("ERROR").to_string(),
		Level::Warn => Colour::Yellow.bold().paint("WARN").to_string(),
		Level::Info => Colour::Green.paint("INFO").to_string(),
		Level::Debug => Colour::Blue.paint("DEBUG").to_string(),
		Level::Trace => Colour::Purple.paint("TRACE").to_string(),
	}
}

#[cfg(test)]
mod tests {
	use super::LogConfig;

	#[test]
	fn default_config_falls_back_to_info() {
		let config = LogConfig::default();
		assert!(config.mode.is_none());
		assert!(config.color);
	}
}
