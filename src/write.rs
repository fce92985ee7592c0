//! Direct shim-based writing.
//!
//! Reports are written through a non-allocating primitive, so they can be emitted from inside the
//! allocator (or from an exit hook) without recursing into it.

use core::fmt;

use crate::sync::Mutex;
use crate::sys;

/// The log lock.
///
/// This lock is used to avoid bungling and intertwining the log.
#[cfg(all(feature = "log", not(feature = "no_log_lock")))]
pub static LOG_LOCK: Mutex<()> = Mutex::new(());

/// The report lock.
///
/// Serializes whole reports written to standard output.
static REPORT_LOCK: Mutex<()> = Mutex::new(());

/// A report writer.
///
/// This writes to standard output through `sys::print`, holding the report lock for as long as
/// it lives.
pub struct ReportWriter {
    /// The inner lock.
    _lock: crate::sync::MutexGuard<'static, ()>,
}

impl ReportWriter {
    /// Standard output.
    pub fn new() -> ReportWriter {
        ReportWriter {
            _lock: REPORT_LOCK.lock(),
        }
    }
}

impl fmt::Write for ReportWriter {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        sys::print(s).map_err(|()| fmt::Error)
    }
}

/// Write a report to standard output.
///
/// Failures are dropped, since there is nowhere to report them to.
pub fn report(args: fmt::Arguments) {
    use core::fmt::Write;

    let _ = ReportWriter::new().write_fmt(args);
}
