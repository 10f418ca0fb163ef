//! RT-safe logging for the scan roles.
//!
//! # Architecture
//!
//! ```text
//! Generator / Sampler      LogStream           Reporter thread
//! ───────────────────      ─────────           ───────────────
//!
//! rt_log!() ────────────▶ [L0][L1][L2] ──────▶ tracing subscriber
//! fixed buffer             lock-free            blocking ok
//! non-blocking             ring buffer
//! ```
//!
//! # Rules
//!
//! - The generator and sampler never call a blocking logger; they push
//!   through their own [`LogProducer`] with the `rt_*!` macros
//! - Messages are dropped (and counted) when the ring is full
//! - One producer and one consumer per stream, enforced by
//!   [`LogStream::split`] handing out exactly one of each

use core::cell::UnsafeCell;
use core::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

/// Maximum message length.
pub const MAX_MSG_LEN: usize = 120;

/// Log buffer size (number of entries).
pub const LOG_BUFFER_SIZE: usize = 256;

/// Log level.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
#[repr(u8)]
pub enum LogLevel {
    Error = 0,
    Warn = 1,
    Info = 2,
    Debug = 3,
    Trace = 4,
}

/// A single log entry.
#[derive(Clone, Copy)]
pub struct LogEntry {
    /// Microseconds since acquisition start.
    pub timestamp_us: i64,
    pub level: LogLevel,
    /// Message length.
    pub len: u8,
    /// Message bytes (not null-terminated).
    pub msg: [u8; MAX_MSG_LEN],
}

impl LogEntry {
    const EMPTY: Self = Self {
        timestamp_us: 0,
        level: LogLevel::Info,
        len: 0,
        msg: [0; MAX_MSG_LEN],
    };

    /// Message text. Truncation can split a UTF-8 sequence, in which case
    /// the valid prefix is returned.
    pub fn message(&self) -> &str {
        let bytes = &self.msg[..self.len as usize];
        match core::str::from_utf8(bytes) {
            Ok(s) => s,
            Err(e) => core::str::from_utf8(&bytes[..e.valid_up_to()]).unwrap_or_default(),
        }
    }
}

impl Default for LogEntry {
    fn default() -> Self {
        Self::EMPTY
    }
}

/// Lock-free SPSC log ring.
///
/// Only reachable through the handles returned by [`split`](Self::split).
pub struct LogStream<const N: usize = LOG_BUFFER_SIZE> {
    entries: [UnsafeCell<LogEntry>; N],
    write_idx: AtomicU32,
    read_idx: AtomicU32,
    dropped: AtomicU32,
}

// SAFETY: entries are only touched through the single LogProducer (slots
// between read_idx and write_idx are unpublished) and the single LogConsumer
// (slots published by the Release store of write_idx). Both handles take
// `&mut self`, so neither side can run twice concurrently.
unsafe impl<const N: usize> Sync for LogStream<N> {}

impl<const N: usize> LogStream<N> {
    const MASK: usize = N - 1;

    /// Create a new empty log stream.
    pub const fn new() -> Self {
        assert!(N.is_power_of_two(), "Log buffer size must be power of 2");

        Self {
            entries: [const { UnsafeCell::new(LogEntry::EMPTY) }; N],
            write_idx: AtomicU32::new(0),
            read_idx: AtomicU32::new(0),
            dropped: AtomicU32::new(0),
        }
    }

    /// Split into the producer and consumer ends.
    pub fn split(self) -> (LogProducer<N>, LogConsumer<N>) {
        let ring = Arc::new(self);
        (
            LogProducer { ring: Arc::clone(&ring) },
            LogConsumer { ring },
        )
    }

    fn pending(&self) -> u32 {
        let read = self.read_idx.load(Ordering::Acquire);
        let write = self.write_idx.load(Ordering::Acquire);
        write.wrapping_sub(read)
    }
}

impl<const N: usize> Default for LogStream<N> {
    fn default() -> Self {
        Self::new()
    }
}

/// Writing end of a [`LogStream`].
pub struct LogProducer<const N: usize = LOG_BUFFER_SIZE> {
    ring: Arc<LogStream<N>>,
}

impl<const N: usize> LogProducer<N> {
    /// Push a log entry (RT-safe, never blocks).
    ///
    /// Returns `true` if message was queued, `false` if dropped (ring full).
    #[inline]
    pub fn push(&mut self, timestamp_us: i64, level: LogLevel, msg: &[u8]) -> bool {
        let ring = &*self.ring;
        let write = ring.write_idx.load(Ordering::Relaxed);
        let read = ring.read_idx.load(Ordering::Acquire);

        if write.wrapping_sub(read) >= N as u32 {
            ring.dropped.fetch_add(1, Ordering::Relaxed);
            return false;
        }

        let idx = (write as usize) & LogStream::<N>::MASK;

        // SAFETY: slot `idx` is not yet published, the consumer never reads it
        // until the Release store below.
        unsafe {
            let entry = &mut *ring.entries[idx].get();
            entry.timestamp_us = timestamp_us;
            entry.level = level;
            entry.len = msg.len().min(MAX_MSG_LEN) as u8;
            entry.msg[..entry.len as usize].copy_from_slice(&msg[..entry.len as usize]);
        }

        ring.write_idx.store(write.wrapping_add(1), Ordering::Release);
        true
    }

    /// Get count of dropped messages.
    #[inline]
    pub fn dropped(&self) -> u32 {
        self.ring.dropped.load(Ordering::Relaxed)
    }
}

/// Reading end of a [`LogStream`].
pub struct LogConsumer<const N: usize = LOG_BUFFER_SIZE> {
    ring: Arc<LogStream<N>>,
}

impl<const N: usize> LogConsumer<N> {
    /// Drain next log entry.
    ///
    /// Returns `None` if no entries available.
    #[inline]
    pub fn drain(&mut self) -> Option<LogEntry> {
        let ring = &*self.ring;
        let read = ring.read_idx.load(Ordering::Relaxed);
        let write = ring.write_idx.load(Ordering::Acquire);

        if read == write {
            return None;
        }

        let idx = (read as usize) & LogStream::<N>::MASK;

        // SAFETY: slot was published by the producer's Release store and is
        // not rewritten until read_idx moves past it.
        let entry = unsafe { *ring.entries[idx].get() };

        ring.read_idx.store(read.wrapping_add(1), Ordering::Release);
        Some(entry)
    }

    /// Get count of dropped messages.
    #[inline]
    pub fn dropped(&self) -> u32 {
        self.ring.dropped.load(Ordering::Relaxed)
    }

    /// Reset dropped counter (e.g., after reporting).
    #[inline]
    pub fn reset_dropped(&self) {
        self.ring.dropped.store(0, Ordering::Relaxed);
    }

    /// Check if there are entries to drain.
    #[inline]
    pub fn has_entries(&self) -> bool {
        self.ring.pending() != 0
    }

    /// Get number of entries waiting to be drained.
    #[inline]
    pub fn pending(&self) -> u32 {
        self.ring.pending()
    }
}

/// Format a message into a buffer, truncating at the buffer end.
///
/// Returns the number of bytes written.
#[inline]
pub fn format_to_buffer(buf: &mut [u8], args: core::fmt::Arguments<'_>) -> usize {
    use core::fmt::Write;

    struct BufWriter<'a> {
        buf: &'a mut [u8],
        pos: usize,
    }

    impl Write for BufWriter<'_> {
        fn write_str(&mut self, s: &str) -> core::fmt::Result {
            let bytes = s.as_bytes();
            let remaining = self.buf.len() - self.pos;
            let to_write = bytes.len().min(remaining);
            self.buf[self.pos..self.pos + to_write].copy_from_slice(&bytes[..to_write]);
            self.pos += to_write;
            Ok(())
        }
    }

    let mut writer = BufWriter { buf, pos: 0 };
    let _ = core::fmt::write(&mut writer, args);
    writer.pos
}

/// RT-safe log macro.
///
/// Use this in the generator and sampler instead of `tracing` macros.
///
/// # Example
///
/// ```
/// use multibeam_scan::logging::{LogLevel, LogStream};
///
/// let (mut log, mut reader) = LogStream::<16>::new().split();
/// multibeam_scan::rt_log!(LogLevel::Info, log, 42, "channel {} ok", 3);
/// assert_eq!(reader.drain().unwrap().message(), "channel 3 ok");
/// ```
#[macro_export]
macro_rules! rt_log {
    ($level:expr, $log:expr, $timestamp:expr, $($arg:tt)*) => {{
        let mut buf = [0u8; $crate::logging::MAX_MSG_LEN];
        let len = $crate::logging::format_to_buffer(&mut buf, format_args!($($arg)*));
        $log.push($timestamp, $level, &buf[..len]);
    }};
}

/// RT-safe info log.
#[macro_export]
macro_rules! rt_info {
    ($log:expr, $timestamp:expr, $($arg:tt)*) => {
        $crate::rt_log!($crate::logging::LogLevel::Info, $log, $timestamp, $($arg)*)
    };
}

/// RT-safe warning log.
#[macro_export]
macro_rules! rt_warn {
    ($log:expr, $timestamp:expr, $($arg:tt)*) => {
        $crate::rt_log!($crate::logging::LogLevel::Warn, $log, $timestamp, $($arg)*)
    };
}

/// RT-safe error log.
#[macro_export]
macro_rules! rt_error {
    ($log:expr, $timestamp:expr, $($arg:tt)*) => {
        $crate::rt_log!($crate::logging::LogLevel::Error, $log, $timestamp, $($arg)*)
    };
}

/// RT-safe debug log.
#[macro_export]
macro_rules! rt_debug {
    ($log:expr, $timestamp:expr, $($arg:tt)*) => {
        $crate::rt_log!($crate::logging::LogLevel::Debug, $log, $timestamp, $($arg)*)
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_stream_basic() {
        let (mut log, mut reader) = LogStream::<16>::new().split();

        assert!(log.push(1000, LogLevel::Info, b"test message"));
        assert!(reader.has_entries());
        assert_eq!(reader.pending(), 1);

        let entry = reader.drain().unwrap();
        assert_eq!(entry.timestamp_us, 1000);
        assert_eq!(entry.level, LogLevel::Info);
        assert_eq!(entry.message(), "test message");

        assert!(!reader.has_entries());
    }

    #[test]
    fn test_log_stream_full() {
        let (mut log, mut reader) = LogStream::<4>::new().split();

        // Fill the buffer
        assert!(log.push(1, LogLevel::Info, b"1"));
        assert!(log.push(2, LogLevel::Info, b"2"));
        assert!(log.push(3, LogLevel::Info, b"3"));
        assert!(log.push(4, LogLevel::Info, b"4"));

        // Should drop
        assert!(!log.push(5, LogLevel::Info, b"5"));
        assert_eq!(reader.dropped(), 1);

        // Drain one, should be able to push again
        assert_eq!(reader.drain().unwrap().message(), "1");
        assert!(log.push(6, LogLevel::Info, b"6"));

        reader.reset_dropped();
        assert_eq!(log.dropped(), 0);
    }

    #[test]
    fn test_long_message_truncated() {
        let (mut log, mut reader) = LogStream::<4>::new().split();
        let long = [b'x'; MAX_MSG_LEN + 30];

        assert!(log.push(0, LogLevel::Warn, &long));
        assert_eq!(reader.drain().unwrap().message().len(), MAX_MSG_LEN);
    }

    #[test]
    fn test_message_cut_inside_utf8() {
        let mut entry = LogEntry::default();
        let text = "ab\u{00b5}s".as_bytes();
        entry.msg[..3].copy_from_slice(&text[..3]);
        entry.len = 3;

        assert_eq!(entry.message(), "ab");
    }

    #[test]
    fn test_format_to_buffer() {
        let mut buf = [0u8; 32];
        let len = format_to_buffer(&mut buf, format_args!("Hello {}", 42));
        assert_eq!(&buf[..len], b"Hello 42");

        let mut small = [0u8; 4];
        let len = format_to_buffer(&mut small, format_args!("Hello {}", 42));
        assert_eq!(&small[..len], b"Hell");
    }

    #[test]
    fn test_log_level_ordering() {
        assert!(LogLevel::Error < LogLevel::Warn);
        assert!(LogLevel::Warn < LogLevel::Info);
        assert!(LogLevel::Info < LogLevel::Debug);
        assert!(LogLevel::Debug < LogLevel::Trace);
    }

    #[test]
    fn test_macros_push() {
        let (mut log, mut reader) = LogStream::<8>::new().split();

        crate::rt_warn!(log, 7, "channel {} missed", 7);
        crate::rt_error!(log, 8, "write failed");
        crate::rt_debug!(log, 9, "cycle {}", 12);

        let warn = reader.drain().unwrap();
        assert_eq!(warn.level, LogLevel::Warn);
        assert_eq!(warn.message(), "channel 7 missed");
        assert_eq!(reader.drain().unwrap().level, LogLevel::Error);
        assert_eq!(reader.drain().unwrap().message(), "cycle 12");
    }

    #[test]
    fn test_spsc_across_threads() {
        use std::thread;

        let (mut log, mut reader) = LogStream::<64>::new().split();

        let producer = thread::spawn(move || {
            let mut sent = 0u32;
            for i in 0..1000i64 {
                let msg = format!("msg {}", i);
                if log.push(i, LogLevel::Info, msg.as_bytes()) {
                    sent += 1;
                }
            }
            sent
        });

        let mut received = Vec::new();
        while !producer.is_finished() {
            while let Some(entry) = reader.drain() {
                received.push(entry.timestamp_us);
            }
            thread::yield_now();
        }
        let sent = producer.join().unwrap();
        while let Some(entry) = reader.drain() {
            received.push(entry.timestamp_us);
        }

        assert_eq!(received.len() as u32, sent);
        assert_eq!(sent + reader.dropped(), 1000);
        // Order is preserved
        assert!(received.windows(2).all(|w| w[0] < w[1]));
    }
}
