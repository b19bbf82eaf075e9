use std::path::Path;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::global::config::{LogType, LoggingConfig};
use crate::global::error::AppError;

/// Install the global subscriber.
///
/// `RUST_LOG` wins over the configured level. With `LogType::File` a second,
/// non-blocking layer writes to `log_file`; keep the returned guard alive or
/// buffered lines are lost on exit.
pub fn init_tracing(config: &LoggingConfig) -> Result<Option<WorkerGuard>, AppError> {
    let level = level_directive(&config.log_level);
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| format!("mongo_gateway={},tower_http={},info", level, level).into());

    let (file_layer, guard) = match config.log_type {
        LogType::Default => (None, None),
        LogType::File => {
            let path = Path::new(&config.log_file);
            let directory = path.parent().filter(|p| !p.as_os_str().is_empty()).unwrap_or(Path::new("."));
            let file_name = path
                .file_name()
                .ok_or_else(|| AppError::Logging(format!("log_file '{}' has no file name", config.log_file)))?;

            let appender = tracing_appender::rolling::never(directory, file_name);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = fmt::layer().with_ansi(false).with_writer(writer);
            (Some(layer), Some(guard))
        }
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer())
        .with(file_layer)
        .try_init()
        .map_err(|e| AppError::Logging(e.to_string()))?;

    Ok(guard)
}

/// Map a configured level onto a filter directive, unknown values mean `info`
fn level_directive(level: &str) -> &'static str {
    match level.trim().to_ascii_lowercase().as_str() {
        "trace" => "trace",
        "debug" => "debug",
        "warn" | "warning" => "warn",
        "error" => "error",
        _ => "info",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_levels_pass_through() {
        assert_eq!(level_directive("debug"), "debug");
        assert_eq!(level_directive("WARN"), "warn");
        assert_eq!(level_directive(" error "), "error");
    }

    #[test]
    fn unknown_level_falls_back_to_info() {
        assert_eq!(level_directive("verbose"), "info");
        assert_eq!(level_directive(""), "info");
    }
}
