//! Minimal CLI bootstrap. Deliberately not a `clap` surface: the core only
//! needs *some* struct to construct a server with, and flag validation
//! beyond what's listed here is out of scope.

use crate::queue::DEFAULT_CAPACITY;

/// Options the binary entry point parses before constructing a server.
#[derive(Debug, Clone)]
pub struct Options {
    pub num_request_threads: usize,
    pub num_worker_threads: usize,
    pub queue_capacity: usize,
    pub log_file: Option<String>,
    pub log_level: Option<String>,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            num_request_threads: 4,
            num_worker_threads: 4,
            queue_capacity: DEFAULT_CAPACITY,
            log_file: None,
            log_level: None,
        }
    }
}

/// What went wrong while parsing CLI arguments, mapped to an exit code by
/// `main.rs` (1: invalid value, 2: incompatible flags).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OptionsError {
    InvalidValue { flag: String, value: String },
    MissingValue { flag: String },
    Unknown { flag: String },
}

impl std::fmt::Display for OptionsError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidValue { flag, value } => {
                write!(f, "invalid value {value:?} for {flag}")
            }
            Self::MissingValue { flag } => write!(f, "{flag} requires a value"),
            Self::Unknown { flag } => write!(f, "unknown flag {flag}"),
        }
    }
}

impl std::error::Error for OptionsError {}

impl Options {
    /// Parse `--numRequestThreads N`, `--numWorkerThreads N`,
    /// `--queueCapacity N`, `--log-file PATH`, and `--log-level LEVEL` from
    /// an argument iterator (typically `std::env::args().skip(1)`).
    ///
    /// # Errors
    ///
    /// Returns [`OptionsError`] on an unrecognized flag, a flag missing its
    /// value, or a value that fails to parse as the expected type.
    pub fn parse_args(args: impl IntoIterator<Item = String>) -> Result<Self, OptionsError> {
        let mut options = Self::default();
        let mut iter = args.into_iter();

        while let Some(flag) = iter.next() {
            match flag.as_str() {
                "--numRequestThreads" => options.num_request_threads = parse_usize(&flag, &mut iter)?,
                "--numWorkerThreads" => options.num_worker_threads = parse_usize(&flag, &mut iter)?,
                "--queueCapacity" => options.queue_capacity = parse_usize(&flag, &mut iter)?,
                "--log-file" => {
                    options.log_file = Some(next_value(&flag, &mut iter)?);
                }
                "--log-level" => {
                    options.log_level = Some(next_value(&flag, &mut iter)?);
                }
                other => {
                    return Err(OptionsError::Unknown {
                        flag: other.to_string(),
                    })
                }
            }
        }

        Ok(options)
    }
}

fn next_value(flag: &str, iter: &mut impl Iterator<Item = String>) -> Result<String, OptionsError> {
    iter.next().ok_or_else(|| OptionsError::MissingValue {
        flag: flag.to_string(),
    })
}

fn parse_usize(flag: &str, iter: &mut impl Iterator<Item = String>) -> Result<usize, OptionsError> {
    let value = next_value(flag, iter)?;
    value.parse().map_err(|_| OptionsError::InvalidValue {
        flag: flag.to_string(),
        value,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(items: &[&str]) -> Vec<String> {
        items.iter().map(ToString::to_string).collect()
    }

    #[test]
    fn defaults_when_no_args_given() {
        let options = Options::parse_args(Vec::new()).unwrap();
        assert_eq!(options.num_request_threads, 4);
        assert_eq!(options.num_worker_threads, 4);
        assert_eq!(options.queue_capacity, DEFAULT_CAPACITY);
    }

    #[test]
    fn overrides_thread_counts() {
        let options = Options::parse_args(args(&["--numRequestThreads", "2", "--numWorkerThreads", "8"])).unwrap();
        assert_eq!(options.num_request_threads, 2);
        assert_eq!(options.num_worker_threads, 8);
    }

    #[test]
    fn unknown_flag_is_an_error() {
        let err = Options::parse_args(args(&["--bogus"])).unwrap_err();
        assert_eq!(
            err,
            OptionsError::Unknown {
                flag: "--bogus".into()
            }
        );
    }

    #[test]
    fn non_numeric_value_is_invalid_value() {
        let err = Options::parse_args(args(&["--numRequestThreads", "nope"])).unwrap_err();
        assert!(matches!(err, OptionsError::InvalidValue { .. }));
    }

    #[test]
    fn flag_missing_its_value_is_an_error() {
        let err = Options::parse_args(args(&["--log-file"])).unwrap_err();
        assert_eq!(
            err,
            OptionsError::MissingValue {
                flag: "--log-file".into()
            }
        );
    }

    #[test]
    fn log_file_and_log_level_are_captured() {
        let options = Options::parse_args(args(&["--log-file", "/tmp/x.log", "--log-level", "debug"])).unwrap();
        assert_eq!(options.log_file.as_deref(), Some("/tmp/x.log"));
        assert_eq!(options.log_level.as_deref(), Some("debug"));
    }
}
