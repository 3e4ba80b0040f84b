//! Logging setup.
//!
//! Everything in the crate logs through `tracing`. The binary writes to
//! stderr so `--json` output on stdout stays machine-readable. The HTTP and
//! database crates underneath are held at `warn` unless the user asks for
//! trace output.

use tracing::Level;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Crates whose own logging is only interesting at trace verbosity.
const TRANSPORT_CRATES: &[&str] = &["reqwest", "hyper", "hyper_util", "rustls", "rusqlite"];

/// Verbosity level for logging output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Verbosity {
    /// Errors only.
    Quiet,
    /// Info and above.
    #[default]
    Normal,
    /// Debug and above.
    Verbose,
    /// Everything, including the transport crates.
    Trace,
}

impl Verbosity {
    /// Verbosity for `--quiet` and a count of `-v` flags. Quiet wins.
    #[must_use]
    pub fn from_flags(quiet: bool, verbose: u8) -> Self {
        match (quiet, verbose) {
            (true, _) => Self::Quiet,
            (false, 0) => Self::Normal,
            (false, 1) => Self::Verbose,
            (false, _) => Self::Trace,
        }
    }

    /// Convert verbosity to a tracing level.
    #[must_use]
    pub fn to_level_filter(&self) -> Level {
        match self {
            Self::Quiet => Level::ERROR,
            Self::Normal => Level::INFO,
            Self::Verbose => Level::DEBUG,
            Self::Trace => Level::TRACE,
        }
    }

    /// Filter directives used when `RUST_LOG` is not set.
    #[must_use]
    pub fn directives(&self) -> String {
        let transport = match self {
            Self::Trace => Level::DEBUG,
            Self::Quiet => Level::ERROR,
            Self::Normal | Self::Verbose => Level::WARN,
        };
        let mut directives = vec![format!("tapak={}", self.to_level_filter())];
        directives.extend(
            TRANSPORT_CRATES
                .iter()
                .map(|name| format!("{name}={transport}")),
        );
        directives.join(",")
    }
}

/// Initialize the logging system.
///
/// Call once at startup. `RUST_LOG` takes precedence over `verbosity`.
///
/// # Examples
///
/// ```no_run
/// use tapak::{init_logging, logging::Verbosity};
///
/// init_logging(Verbosity::from_flags(false, 1));
/// ```
pub fn init_logging(verbosity: Verbosity) {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(verbosity.directives()));

    let subscriber = tracing_subscriber::registry().with(env_filter).with(
        fmt::layer()
            .with_writer(std::io::stderr)
            .with_target(verbosity == Verbosity::Trace)
            .with_thread_ids(false)
            .with_file(false)
            .with_line_number(false),
    );

    // Already-installed subscriber is fine.
    let _ = subscriber.try_init();
}

/// Route crate warnings into the test harness output.
#[cfg(test)]
pub(crate) fn init_test_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("tapak=warn")
        .with_test_writer()
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_flags() {
        assert_eq!(Verbosity::from_flags(false, 0), Verbosity::Normal);
        assert_eq!(Verbosity::from_flags(false, 1), Verbosity::Verbose);
        assert_eq!(Verbosity::from_flags(false, 4), Verbosity::Trace);
        assert_eq!(Verbosity::from_flags(true, 3), Verbosity::Quiet);
    }

    #[test]
    fn test_verbosity_to_level() {
        assert_eq!(Verbosity::Quiet.to_level_filter(), Level::ERROR);
        assert_eq!(Verbosity::Normal.to_level_filter(), Level::INFO);
        assert_eq!(Verbosity::Verbose.to_level_filter(), Level::DEBUG);
        assert_eq!(Verbosity::Trace.to_level_filter(), Level::TRACE);
    }

    #[test]
    fn test_transport_crates_held_back_until_trace() {
        let verbose = Verbosity::Verbose.directives();
        assert!(verbose.starts_with("tapak=DEBUG"));
        assert!(verbose.contains("reqwest=WARN"));

        let trace = Verbosity::Trace.directives();
        assert!(trace.contains("tapak=TRACE"));
        assert!(trace.contains("hyper=DEBUG"));

        assert!(Verbosity::Quiet.directives().contains("rusqlite=ERROR"));
    }

    #[test]
    fn test_directives_parse() {
        for verbosity in [
            Verbosity::Quiet,
            Verbosity::Normal,
            Verbosity::Verbose,
            Verbosity::Trace,
        ] {
            assert!(EnvFilter::try_new(verbosity.directives()).is_ok());
        }
    }

    #[test]
    fn test_init_logging_is_idempotent() {
        init_logging(Verbosity::Quiet);
        init_logging(Verbosity::Trace);
    }
}
