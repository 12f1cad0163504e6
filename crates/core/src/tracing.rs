//! Logging setup shared by the command-line tool.
//!
//! `RUST_LOG` overrides the default level when set.

use thiserror::Error;
use tracing::Level;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Debug, Error)]
pub enum TracingError {
	#[error("failed to set global tracing subscriber: {0}")]
	SetGlobalSubscriber(#[from] tracing::subscriber::SetGlobalDefaultError),

	#[error("failed to parse env filter: {0}")]
	EnvFilter(#[from] tracing_subscriber::filter::ParseError),
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogFormat {
	/// Single-line human-readable output.
	#[default]
	Compact,
	Json,
}

#[derive(Debug, Clone)]
pub struct TracingConfig {
	pub default_level: Level,
	pub format: LogFormat,
	/// Include file and line of each event.
	pub include_location: bool,
	/// Directive used instead of `RUST_LOG` and the default level.
	pub env_filter: Option<String>,
}

impl Default for TracingConfig {
	fn default() -> Self {
		Self {
			default_level: Level::WARN,
			format: LogFormat::Compact,
			include_location: false,
			env_filter: None,
		}
	}
}

impl TracingConfig {
	/// Verbose settings for `--debug`.
	#[must_use]
	pub fn debug() -> Self {
		Self {
			default_level: Level::DEBUG,
			include_location: true,
			..Self::default()
		}
	}

	#[must_use]
	pub fn with_format(mut self, format: LogFormat) -> Self {
		self.format = format;
		self
	}

	#[must_use]
	pub fn with_env_filter(mut self, filter: impl Into<String>) -> Self {
		self.env_filter = Some(filter.into());
		self
	}

	fn filter(&self) -> Result<EnvFilter, TracingError> {
		if let Some(filter) = &self.env_filter {
			return Ok(EnvFilter::try_new(filter)?);
		}

		Ok(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
			EnvFilter::new(format!(
				"rsu_timetable={level},rsu_timetable_core={level}",
				level = self.default_level
			))
		}))
	}
}

/// Installs the global subscriber. Logs go to stderr so that calendar output
/// on stdout stays clean.
///
/// # Errors
///
/// Fails if a subscriber is already installed or the filter directive is
/// invalid.
pub fn init_tracing(config: &TracingConfig) -> Result<(), TracingError> {
	let filter = config.filter()?;
	let layer = fmt::layer()
		.with_writer(std::io::stderr)
		.with_file(config.include_location)
		.with_line_number(config.include_location);

	match config.format {
		LogFormat::Compact => {
			let subscriber = tracing_subscriber::registry()
				.with(filter)
				.with(layer.compact().without_time());
			tracing::subscriber::set_global_default(subscriber)?;
		}
		LogFormat::Json => {
			let subscriber = tracing_subscriber::registry().with(filter).with(layer.json());
			tracing::subscriber::set_global_default(subscriber)?;
		}
	}

	Ok(())
}
