//! Allocator logging.

use core::{cmp, fmt};
use core::fmt::Write;

use crate::config;
use crate::syscalls;

/// Write to the log.
///
/// This points to `config::LOG_TARGET`, but could be changed arbitrarily. The message is
/// formatted into a stack buffer, so logging never allocates.
pub fn write(lv: u8, kind: &str, args: fmt::Arguments, file: &str, line: u32) {
    if lv >= config::MIN_LOG_LEVEL {
        // The buffer. We add four extra slots: three are reserved for the "..." marking a
        // truncated message and one for the trailing newline. We start out with all dots, so we
        // don't have to set these up later on in case of the buffer being full.
        let mut buffer = [b'.'; config::LOG_BUFFER_SIZE + 4];

        // The bytes of the buffer that are filled.
        let mut filled;

        {
            // We emulate the writing semantics by having a newtype which implements `fmt::Write`.
            // All this type does is holding a slice, which is updated when new bytes are written.
            let mut writer = BufWriter {
                buffer: &mut buffer[..config::LOG_BUFFER_SIZE],
            };
            // Overflowing is not an error (we truncate), so this cannot fail.
            let _ = write!(writer, "{:10}{:60} (@ {}:{})", kind, args, file, line);
            filled = config::LOG_BUFFER_SIZE - writer.buffer.len();
        }

        // Keep the dots in case the buffer was full.
        if filled == config::LOG_BUFFER_SIZE {
            filled += 3;
        }

        buffer[filled] = b'\n';
        filled += 1;

        // Finally, write it to the logging target. There is nowhere to report a failure to.
        let _ = syscalls::write(config::LOG_TARGET, &buffer[..filled]);
    }
}

/// A logging buffer.
///
/// This simply keeps track of the buffer by maintaining a slice representing the remaining part of
/// the buffer.
struct BufWriter<'a> {
    /// A view into the remaining part of the buffer.
    buffer: &'a mut [u8],
}

impl<'a> fmt::Write for BufWriter<'a> {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        // Find the appropriate length of the copied subbuffer.
        let amt = cmp::min(s.len(), self.buffer.len());
        // Split the buffer.
        let buffer = core::mem::take(&mut self.buffer);
        let (head, tail) = buffer.split_at_mut(amt);
        // Memcpy the content of the string.
        head.copy_from_slice(&s.as_bytes()[..amt]);
        self.buffer = tail;

        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_truncate() {
        let mut buf = [0u8; 8];
        let rest = {
            let mut writer = BufWriter { buffer: &mut buf };
            write!(writer, "abcdefghijkl").unwrap();
            writer.buffer.len()
        };

        assert_eq!(rest, 0);
        assert_eq!(&buf, b"abcdefgh");
    }

    #[test]
    fn test_partial() {
        let mut buf = [0u8; 8];
        let rest = {
            let mut writer = BufWriter { buffer: &mut buf };
            write!(writer, "ab{}", 1).unwrap();
            writer.buffer.len()
        };

        assert_eq!(rest, 5);
        assert_eq!(&buf[..3], b"ab1");
    }
}
