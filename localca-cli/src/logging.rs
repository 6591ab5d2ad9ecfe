use anyhow::anyhow;
use tracing_subscriber::filter::LevelFilter;

const DEFAULT_LOG_LEVEL: &str = "warn";

/// Log to stderr at `level`, or [`DEFAULT_LOG_LEVEL`] when none is given.
pub fn init(level: Option<&str>) -> anyhow::Result<()> {
	let level = resolve_log_level(level)?;
	tracing_subscriber::fmt()
		.with_max_level(level)
		.with_target(false)
		.with_writer(std::io::stderr)
		.try_init()
		.map_err(|err| anyhow!("initialize logging subscriber: {err}"))?;
	Ok(())
}

fn resolve_log_level(level: Option<&str>) -> anyhow::Result<LevelFilter> {
	let raw_level = level.unwrap_or(DEFAULT_LOG_LEVEL);
	let normalized = raw_level.trim().to_ascii_lowercase();

	normalized.parse::<LevelFilter>().map_err(|_| {
		anyhow!(
			"invalid log level `{raw_level}`; expected one of trace, debug, info, warn, error, off"
		)
	})
}
