// Copyright 2026 The ChromiumOS Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! Facilities for sending log messages to the process's diagnostic stream.
//!
//! Every function exported by this module is thread-safe. Until `syslog::init()` or
//! `syslog::init_with()` is called, records sent through the `log` macros are dropped.
//!
//! # Examples
//!
//! ```
//! use log::{error, warn};
//! use base::syslog;
//!
//! if let Err(e) = syslog::init() {
//!     println!("failed to initiailize syslog: {}", e);
//!     return;
//! }
//! warn!("this is your {} warning", "final");
//! error!("something went horribly wrong: {}", "out of RAMs");
//! ```

use std::env;
use std::ffi::OsStr;
use std::ffi::OsString;
use std::io;
use std::io::stderr;
use std::io::Write;
use std::path::PathBuf;
use std::sync::Mutex;
use std::sync::OnceLock;

use env_logger::filter::Builder as FilterBuilder;
use env_logger::filter::Filter;
use remain::sorted;
use serde::Deserialize;
use serde::Serialize;
use thiserror::Error as ThisError;

/// Errors returned by `syslog::init()`.
#[sorted]
#[derive(ThisError, Debug)]
pub enum Error {
    /// Another logger was installed before ours.
    #[error("another logger is already installed")]
    LoggerAlreadySet,
    /// Initialization has previously failed and can not be retried.
    #[error("initialization previously failed and cannot be retried")]
    Poisoned,
}

fn get_proc_name() -> Option<String> {
    env::args_os()
        .next()
        .map(PathBuf::from)
        .and_then(|s| s.file_name().map(OsStr::to_os_string))
        .map(OsString::into_string)
        .and_then(Result::ok)
}

/// Serializable part of the logging configuration.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogArgs {
    /// A filter in `RUST_LOG` syntax, e.g. `info` or `file_map=debug,warn`.
    pub filter: String,
    /// Echo records to `std::io::stderr()`.
    pub stderr: bool,
    /// Name prefixed to every record.
    pub proc_name: String,
}

impl Default for LogArgs {
    fn default() -> Self {
        Self {
            filter: String::from("info"),
            stderr: true,
            proc_name: get_proc_name().unwrap_or_else(|| String::from("file_map")),
        }
    }
}

#[derive(Default)]
pub struct LogConfig {
    pub log_args: LogArgs,
    /// Extra sink every record is copied to.
    pub pipe: Option<Box<dyn Write + Send>>,
}

/// The installed logger.
pub struct State {
    filter: Filter,
    stderr: bool,
    proc_name: String,
    pipe: Option<Mutex<Box<dyn Write + Send>>>,
}

impl State {
    /// Builds a logger from `cfg`. Unknown filter directives are reported by env_logger and
    /// otherwise ignored.
    pub fn new(cfg: LogConfig) -> Self {
        State {
            filter: FilterBuilder::new().parse(&cfg.log_args.filter).build(),
            stderr: cfg.log_args.stderr,
            proc_name: cfg.log_args.proc_name,
            pipe: cfg.pipe.map(Mutex::new),
        }
    }

    fn format(&self, record: &log::Record) -> io::Result<Vec<u8>> {
        let mut buf = Vec::with_capacity(256);
        match (record.file(), record.line()) {
            (Some(file), Some(line)) => write!(
                &mut buf,
                "[{}:{}:{}:{}] ",
                self.proc_name,
                record.level(),
                file,
                line
            )?,
            _ => write!(&mut buf, "[{}:{}] ", self.proc_name, record.level())?,
        }
        writeln!(&mut buf, "{}", record.args())?;
        Ok(buf)
    }
}

impl log::Log for State {
    fn enabled(&self, metadata: &log::Metadata) -> bool {
        self.filter.enabled(metadata)
    }

    fn log(&self, record: &log::Record) {
        if !self.filter.matches(record) {
            return;
        }
        let buf = match self.format(record) {
            Ok(buf) => buf,
            Err(e) => {
                // Don't use warn macro to avoid potential recursion issues after macro expansion.
                let _ = writeln!(
                    stderr(),
                    "[{}]:WARNING: Failed to log with err: {:?}",
                    self.proc_name,
                    e
                );
                return;
            }
        };
        if let Some(pipe) = &self.pipe {
            let mut pipe = pipe.lock().unwrap_or_else(|e| e.into_inner());
            let _ = pipe.write_all(&buf);
        }
        if self.stderr {
            let _ = stderr().write_all(&buf);
        }
    }

    fn flush(&self) {
        if let Some(pipe) = &self.pipe {
            let mut pipe = pipe.lock().unwrap_or_else(|e| e.into_inner());
            let _ = pipe.flush();
        }
    }
}

static STATE: OnceLock<State> = OnceLock::new();
static INIT_RESULT: OnceLock<bool> = OnceLock::new();

fn install(cfg: LogConfig) -> Result<(), Error> {
    let state = STATE.get_or_init(|| State::new(cfg));
    log::set_logger(state).map_err(|_| Error::LoggerAlreadySet)?;
    log::set_max_level(state.filter.filter());
    Ok(())
}

/// Installs the default logger: `info` and above to stderr.
pub fn init() -> Result<(), Error> {
    init_with(Default::default())
}

/// Installs a logger built from `cfg`.
///
/// Only the first call has an effect. Later calls return `Ok` if the first one succeeded and
/// `Error::Poisoned` otherwise.
pub fn init_with(cfg: LogConfig) -> Result<(), Error> {
    let mut first_err = None;
    let installed = *INIT_RESULT.get_or_init(|| match install(cfg) {
        Ok(()) => true,
        Err(e) => {
            first_err = Some(e);
            false
        }
    });
    match (installed, first_err) {
        (true, _) => Ok(()),
        (false, Some(e)) => Err(e),
        (false, None) => Err(Error::Poisoned),
    }
}

/// Makes sure a logger that shows everything is installed. Meant for tests, which may race to
/// initialize logging.
pub fn test_only_ensure_inited() -> Result<(), Error> {
    init_with(LogConfig {
        log_args: LogArgs {
            filter: String::from("trace"),
            proc_name: String::from("test"),
            ..Default::default()
        },
        ..Default::default()
    })
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use log::Level;
    use log::Log;

    use super::*;

    #[derive(Clone, Default)]
    struct MockWrite {
        buffer: Arc<Mutex<Vec<u8>>>,
    }

    impl MockWrite {
        fn contents(&self) -> String {
            String::from_utf8(self.buffer.lock().unwrap().clone()).unwrap()
        }
    }

    impl Write for MockWrite {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.buffer.lock().unwrap().write(buf)
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    fn state_with_pipe(filter: &str) -> (State, MockWrite) {
        let pipe = MockWrite::default();
        let state = State::new(LogConfig {
            log_args: LogArgs {
                filter: filter.to_owned(),
                stderr: false,
                proc_name: String::from("syslog-test"),
            },
            pipe: Some(Box::new(pipe.clone())),
        });
        (state, pipe)
    }

    #[test]
    fn init_twice() {
        test_only_ensure_inited().unwrap();
        test_only_ensure_inited().unwrap();
        init().unwrap();
    }

    #[test]
    fn macros() {
        test_only_ensure_inited().unwrap();
        log::error!("this is an error {}", 3);
        log::warn!("this is a warning {}", "uh oh");
        log::info!("this is info {}", true);
        log::debug!("this is debug info {:?}", Some("helpful stuff"));
    }

    #[test]
    fn record_format() {
        let (state, pipe) = state_with_pipe("info");
        state.log(
            &log::RecordBuilder::new()
                .level(Level::Error)
                .file(Some("src/map.rs"))
                .line(Some(42))
                .args(format_args!("open failed"))
                .build(),
        );
        assert_eq!(
            pipe.contents(),
            "[syslog-test:ERROR:src/map.rs:42] open failed\n"
        );
    }

    #[test]
    fn filter_drops_low_priority() {
        let (state, pipe) = state_with_pipe("warn");
        state.log(
            &log::RecordBuilder::new()
                .level(Level::Info)
                .args(format_args!("hidden"))
                .build(),
        );
        state.log(
            &log::RecordBuilder::new()
                .level(Level::Warn)
                .args(format_args!("shown"))
                .build(),
        );
        assert_eq!(pipe.contents(), "[syslog-test:WARN] shown\n");
    }

    #[test]
    fn log_args_deserialize_defaults() {
        let args: LogArgs = serde_json::from_str(r#"{"filter": "debug"}"#).unwrap();
        assert_eq!(args.filter, "debug");
        assert!(args.stderr);
    }
}
