use std::path::PathBuf;

use flexi_logger::{Cleanup, Criterion, Duplicate, FileSpec, Logger, LoggerHandle, Naming};

const LOG_BASENAME: &str = "stabilizer";
const ROTATE_SIZE_BYTES: u64 = 1024 * 1024;
const KEEP_LOG_FILES: usize = 5;

/// Installs the process-wide logger.
///
/// `spec` follows the flexi_logger / `RUST_LOG` syntax, e.g. `"info"` or
/// `"warn,stabilizer=debug"`. Warnings are mirrored to stderr, everything to stdout,
/// and log files are size-rotated under `directory`.
///
/// The returned handle must be kept alive for the lifetime of the program.
pub fn setup_logging(spec: &str, directory: impl Into<PathBuf>) -> LoggerHandle {
    Logger::try_with_env_or_str(spec)
        .unwrap_or_else(|e| panic!("Invalid log spec {:?}: {}", spec, e))
        .log_to_file(
            FileSpec::default()
                .directory(directory.into())
                .basename(LOG_BASENAME),
        )
        .duplicate_to_stderr(Duplicate::Warn)
        .duplicate_to_stdout(Duplicate::All)
        .rotate(
            Criterion::Size(ROTATE_SIZE_BYTES),
            Naming::Timestamps,
            Cleanup::KeepLogFiles(KEEP_LOG_FILES),
        )
        .start()
        .unwrap_or_else(|e| panic!("Logger initialization failed with {}", e))
}
