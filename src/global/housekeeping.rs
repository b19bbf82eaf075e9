use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, TimeDelta, Utc};
use tracing::debug;

use crate::global::error::AppError;

/// What a rotation pass did
#[derive(Debug, Default)]
pub struct RotationReport {
    /// Archives older than the retention window that were deleted
    pub removed: Vec<PathBuf>,
    /// Where the previous live log file was moved to
    pub archived: Option<PathBuf>,
}

/// Retention window for a configured number of days
pub fn retention_window(days: u64) -> Result<TimeDelta, AppError> {
    i64::try_from(days)
        .ok()
        .and_then(TimeDelta::try_days)
        .ok_or_else(|| AppError::Logging(format!("retention of {} days is out of range", days)))
}

/// Prepare the log directory for a new run.
///
/// Archives are named `<log file name>.<unix seconds>` next to the live file.
/// Those older than `retention` are deleted, then the live file (if any) is
/// renamed to a fresh archive so the new run starts with an empty log.
pub fn rotate_log_files(
    log_file: &Path,
    retention: TimeDelta,
    now: DateTime<Utc>,
) -> Result<RotationReport, AppError> {
    if retention < TimeDelta::zero() {
        return Err(AppError::Logging(format!("negative log retention {}", retention)));
    }
    let cutoff = now
        .checked_sub_signed(retention)
        .ok_or_else(|| AppError::Logging(format!("log retention {} reaches before the earliest date", retention)))?
        .timestamp();

    let directory = log_file.parent().filter(|p| !p.as_os_str().is_empty()).unwrap_or(Path::new("."));
    let base_name = log_file
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| AppError::Logging(format!("invalid log file path {}", log_file.display())))?;

    fs::create_dir_all(directory).map_err(|e| io_error("create", directory, e))?;

    let mut report = RotationReport::default();

    let entries = fs::read_dir(directory).map_err(|e| io_error("read", directory, e))?;
    for entry in entries {
        let entry = entry.map_err(|e| io_error("read", directory, e))?;
        let name = entry.file_name();
        let Some(stamp) = name.to_str().and_then(|n| archive_timestamp(base_name, n)) else {
            continue;
        };

        if stamp < cutoff {
            let path = entry.path();
            fs::remove_file(&path).map_err(|e| io_error("remove", &path, e))?;
            debug!(path = %path.display(), "Removed expired log archive");
            report.removed.push(path);
        }
    }

    if log_file.exists() {
        let archive = directory.join(format!("{}.{}", base_name, now.timestamp()));
        fs::rename(log_file, &archive).map_err(|e| io_error("rename", log_file, e))?;
        report.archived = Some(archive);
    }

    Ok(report)
}

/// Unix timestamp of `<base>.<seconds>`, `None` for anything else
fn archive_timestamp(base_name: &str, file_name: &str) -> Option<i64> {
    file_name
        .strip_prefix(base_name)?
        .strip_prefix('.')?
        .parse::<i64>()
        .ok()
}

fn io_error(action: &str, path: &Path, e: std::io::Error) -> AppError {
    AppError::Logging(format!("failed to {} {}: {}", action, path.display(), e))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scratch_dir() -> PathBuf {
        let dir = std::env::temp_dir().join(format!("mongo-gateway-logs-{}", uuid::Uuid::new_v4()));
        fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn parses_archive_suffix() {
        assert_eq!(archive_timestamp("app.log", "app.log.1700000000"), Some(1_700_000_000));
        assert_eq!(archive_timestamp("app.log", "app.log"), None);
        assert_eq!(archive_timestamp("app.log", "app.log.gz"), None);
        assert_eq!(archive_timestamp("app.log", "other.log.1700000000"), None);
    }

    #[test]
    fn removes_expired_archives_and_archives_live_file() {
        let dir = scratch_dir();
        let log_file = dir.join("app.log");
        let now = Utc::now();

        let old = dir.join(format!("app.log.{}", (now - TimeDelta::days(3)).timestamp()));
        let recent = dir.join(format!("app.log.{}", (now - TimeDelta::hours(2)).timestamp()));
        let unrelated = dir.join("notes.txt");
        for path in [&old, &recent, &unrelated, &log_file] {
            fs::write(path, "line\n").unwrap();
        }

        let report = rotate_log_files(&log_file, TimeDelta::days(1), now).unwrap();

        assert_eq!(report.removed, vec![old.clone()]);
        assert!(!old.exists());
        assert!(recent.exists());
        assert!(unrelated.exists());
        assert!(!log_file.exists());

        let archived = report.archived.unwrap();
        assert_eq!(archived, dir.join(format!("app.log.{}", now.timestamp())));
        assert_eq!(fs::read_to_string(archived).unwrap(), "line\n");

        fs::remove_dir_all(dir).unwrap();
    }

    #[test]
    fn creates_missing_directory() {
        let dir = scratch_dir().join("nested");
        let log_file = dir.join("app.log");

        let report = rotate_log_files(&log_file, TimeDelta::days(1), Utc::now()).unwrap();

        assert!(dir.is_dir());
        assert!(report.removed.is_empty());
        assert!(report.archived.is_none());

        fs::remove_dir_all(dir.parent().unwrap()).unwrap();
    }

    #[test]
    fn retention_window_rejects_overflowing_days() {
        assert_eq!(retention_window(7).unwrap(), TimeDelta::days(7));
        assert!(matches!(retention_window(u64::MAX), Err(AppError::Logging(_))));
        assert!(matches!(retention_window(i64::MAX as u64), Err(AppError::Logging(_))));
    }

    #[test]
    fn huge_retention_errors_instead_of_panicking() {
        let dir = scratch_dir();
        let log_file = dir.join("app.log");

        let err = rotate_log_files(&log_file, TimeDelta::days(100_000_000), Utc::now()).unwrap_err();
        assert!(matches!(err, AppError::Logging(_)));

        fs::remove_dir_all(dir).unwrap();
    }

    #[test]
    fn negative_retention_keeps_fresh_archives() {
        let dir = scratch_dir();
        let log_file = dir.join("app.log");
        let now = Utc::now();
        let fresh = dir.join(format!("app.log.{}", (now - TimeDelta::minutes(5)).timestamp()));
        fs::write(&fresh, "line\n").unwrap();

        let err = rotate_log_files(&log_file, TimeDelta::days(-1), now).unwrap_err();
        assert!(matches!(err, AppError::Logging(_)));
        assert!(fresh.exists());

        fs::remove_dir_all(dir).unwrap();
    }
}
