//! Allocator logging.
//!
//! This allows for detailed logging for `tagalloc`. Logging is compiled in only with the `log`
//! feature; otherwise the macro expands to nothing that runs (the arguments are still type
//! checked).

/// Log to the appropriate source.
///
/// The first argument is the level, one of `INTERNAL`, `DEBUG`, `CALL`, `NOTE`, `WARNING` and
/// `ERROR`, in increasing order of importance. The rest of the arguments are just normal
/// formatters.
///
/// Logging never allocates: the message is formatted into a stack buffer by the shim.
macro_rules! log {
    (INTERNAL, $( $x:tt )*) => {
        log!(@["INTERNAL: ", 1], $( $x )*)
    };
    (DEBUG, $( $x:tt )*) => {
        log!(@["DEBUG:    ", 2], $( $x )*)
    };
    (CALL, $( $x:tt )*) => {
        log!(@["CALL:     ", 3], $( $x )*)
    };
    (NOTE, $( $x:tt )*) => {
        log!(@["NOTE:     ", 4], $( $x )*)
    };
    (WARNING, $( $x:tt )*) => {
        log!(@["WARNING:  ", 5], $( $x )*)
    };
    (ERROR, $( $x:tt )*) => {
        log!(@["ERROR:    ", 6], $( $x )*)
    };
    (@[$kind:expr, $lv:expr], $( $arg:expr ),* $(,)?) => {{
        #[cfg(feature = "log")]
        {
            // Hold the log lock, so messages from different threads do not intertwine.
            #[cfg(not(feature = "no_log_lock"))]
            let _lock = $crate::write::LOG_LOCK.lock();

            tagalloc_shim::log::write($lv, $kind, format_args!($( $arg ),*), file!(), line!());
        }

        #[cfg(not(feature = "log"))]
        {
            if false {
                let _ = format_args!($( $arg ),*);
            }
        }
    }};
}
