//! Log output and progress bars for the CLI.
//!
//! On a terminal, events are printed compactly above any live progress bars. Anywhere else they
//! are written as JSON lines through a non-blocking writer, and colour is turned off for the rest
//! of the process.

use std::io::IsTerminal;
use std::str::FromStr;
use std::sync::atomic::{AtomicBool, Ordering};

use tracing_appender::non_blocking::WorkerGuard;
use tracing_indicatif::IndicatifLayer;
use tracing_indicatif::style::ProgressStyle;
use tracing_subscriber::filter::{EnvFilter, LevelFilter};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{Layer, fmt};

use super::LogArgs;

//================================================================================================
// Statics
//================================================================================================

/// Whether ANSI escape codes may be written.
pub static ANSI: AtomicBool = AtomicBool::new(true);

//================================================================================================
// Modules
//================================================================================================

/// ANSI escape codes used in plain (non-log) output.
pub mod ansi {
    /// Magenta text.
    pub const MAGENTA: &str = "\x1b[35m";
    /// Red text.
    pub const RED: &str = "\x1b[31m";
    /// Green text.
    pub const GREEN: &str = "\x1b[32m";
    /// Reset styling.
    pub const RESET: &str = "\x1b[0m";
}

//================================================================================================
// Macros
//================================================================================================

/// Logs a fatal error.
#[macro_export]
macro_rules! fatal {
    ($error:expr) => {{
        use $crate::cli::logging::{ANSI, ansi};
        let ansi = ANSI.load(std::sync::atomic::Ordering::SeqCst);
        tracing::error!(
            fatal = true,
            "{}FATAL{} {:#}",
            if ansi { ansi::MAGENTA } else { "" },
            if ansi { ansi::RESET } else { "" },
            $error
        );
    }};
}

//================================================================================================
// Functions
//================================================================================================

/// Initializes the global tracing subscriber.
///
/// The returned guard flushes the non-blocking writer when dropped, so it must live until exit.
pub fn init_global_subscriber(args: LogArgs) -> WorkerGuard {
    let level = log_level(args);
    let env_filter = EnvFilter::from_default_env().add_directive(level.into());

    let (non_blocking, guard) = tracing_appender::non_blocking(std::io::stderr());

    let progress_layer = IndicatifLayer::new().with_progress_style(
        ProgressStyle::with_template("{prefix:.bold.dim} {spinner} {wide_msg}")
            .unwrap_or(ProgressStyle::default_spinner()),
    );

    let fmt = if std::io::stderr().is_terminal() {
        fmt::layer()
            .without_time()
            .with_writer(progress_layer.get_stderr_writer())
            .with_target(level >= LevelFilter::DEBUG)
            .compact()
            .boxed()
    } else {
        ANSI.store(false, Ordering::SeqCst);
        fmt::layer()
            .with_ansi(false)
            .json()
            .with_current_span(true)
            .with_writer(non_blocking)
            .boxed()
    };

    tracing_subscriber::registry()
        .with(fmt)
        .with(env_filter)
        .with(progress_layer)
        .init();

    guard
}

/// Wraps `text` in `colour` when colour output is enabled.
pub(crate) fn paint(text: &str, colour: &str) -> String {
    if ANSI.load(Ordering::SeqCst) {
        format!("{colour}{text}{}", ansi::RESET)
    } else {
        text.to_owned()
    }
}

fn log_level(args: LogArgs) -> LevelFilter {
    match args.quiet {
        0 => (),
        1 => return LevelFilter::WARN,
        _ => return LevelFilter::ERROR,
    }

    let from_env = std::env::var(EnvFilter::DEFAULT_ENV)
        .ok()
        .and_then(|var| LevelFilter::from_str(&var).ok());
    if let Some(level) = from_env {
        return level;
    }

    match args.verbosity {
        0 => LevelFilter::INFO,
        1 => LevelFilter::DEBUG,
        _ => LevelFilter::TRACE,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quiet_overrides_verbosity() {
        let args = LogArgs {
            verbosity: 2,
            quiet: 1,
        };
        assert_eq!(log_level(args), LevelFilter::WARN);
        let args = LogArgs {
            verbosity: 0,
            quiet: 3,
        };
        assert_eq!(log_level(args), LevelFilter::ERROR);
    }
}
