//! Centralized logging for emulator components.
//!
//! Components call [`log`] with a category, a level and a closure producing
//! the message. The closure only runs when the category is enabled, so
//! disabled logging costs one atomic load.
//!
//! - **LogConfig**: process-wide configuration held in atomics
//! - **LogLevel**: Off < Error < Warn < Info < Debug < Trace
//! - **LogCategory**: CPU, bus, VDP, DMA, sound, interrupts, stubs
//!
//! Output goes to stderr, or to a file through a background writer thread
//! once [`LogConfig::set_log_file`] has been called. Each category is rate
//! limited; dropped messages are summarized once per second.
//!
//! ```rust
//! use emu_core::logging::{log, LogCategory, LogLevel};
//!
//! log(LogCategory::Vdp, LogLevel::Debug, || {
//!     format!("VDP: register {:02X} <- {:02X}", 1, 0x64)
//! });
//! ```

use std::collections::VecDeque;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicU8, AtomicUsize, Ordering};
use std::sync::mpsc::{channel, Sender};
use std::sync::{Mutex, OnceLock};
use std::thread;
use std::time::{Duration, Instant};

/// Log level for controlling verbosity
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[repr(u8)]
pub enum LogLevel {
    Off = 0,
    Error = 1,
    Warn = 2,
    Info = 3,
    Debug = 4,
    Trace = 5,
}

impl LogLevel {
    /// Parse a level name or digit (case-insensitive)
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "off" | "0" => Some(LogLevel::Off),
            "error" | "err" | "1" => Some(LogLevel::Error),
            "warn" | "warning" | "2" => Some(LogLevel::Warn),
            "info" | "3" => Some(LogLevel::Info),
            "debug" | "4" => Some(LogLevel::Debug),
            "trace" | "5" => Some(LogLevel::Trace),
            _ => None,
        }
    }

    fn from_u8(val: u8) -> Self {
        match val {
            1 => LogLevel::Error,
            2 => LogLevel::Warn,
            3 => LogLevel::Info,
            4 => LogLevel::Debug,
            5 => LogLevel::Trace,
            _ => LogLevel::Off,
        }
    }
}

/// Log category for emulator components
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LogCategory {
    /// CPU slices and resets
    Cpu,
    /// Bus decoding, unmapped and discarded accesses
    Bus,
    /// VDP registers, ports and rendering
    Vdp,
    /// VDP DMA transfers
    Dma,
    /// Sound CPU and synthesizer traffic
    Sound,
    /// Interrupt assertions
    Interrupts,
    /// Unimplemented hardware paths
    Stubs,
}

const CATEGORY_COUNT: usize = 7;

impl LogCategory {
    pub const ALL: [LogCategory; CATEGORY_COUNT] = [
        LogCategory::Cpu,
        LogCategory::Bus,
        LogCategory::Vdp,
        LogCategory::Dma,
        LogCategory::Sound,
        LogCategory::Interrupts,
        LogCategory::Stubs,
    ];

    fn index(self) -> usize {
        self as usize
    }

    /// Parse a category name (case-insensitive)
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "cpu" => Some(LogCategory::Cpu),
            "bus" => Some(LogCategory::Bus),
            "vdp" => Some(LogCategory::Vdp),
            "dma" => Some(LogCategory::Dma),
            "sound" | "z80" | "ym2612" => Some(LogCategory::Sound),
            "irq" | "interrupts" => Some(LogCategory::Interrupts),
            "stubs" => Some(LogCategory::Stubs),
            _ => None,
        }
    }
}

#[derive(Default)]
struct CategoryWindow {
    stamps: VecDeque<Instant>,
    dropped: usize,
    last_report: Option<Instant>,
}

/// Sliding one-second window limiting messages per category.
struct RateLimiter {
    max_per_second: AtomicUsize,
    windows: Mutex<[CategoryWindow; CATEGORY_COUNT]>,
}

impl RateLimiter {
    fn new(max_per_second: usize) -> Self {
        Self {
            max_per_second: AtomicUsize::new(max_per_second),
            windows: Mutex::new(Default::default()),
        }
    }

    /// Returns whether the message may be written and, when a summary is
    /// due, how many messages were dropped since the last one.
    fn admit(&self, category: LogCategory) -> (bool, Option<usize>) {
        const WINDOW: Duration = Duration::from_secs(1);
        let now = Instant::now();
        let mut windows = match self.windows.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        let window = &mut windows[category.index()];

        while let Some(&front) = window.stamps.front() {
            if now.duration_since(front) > WINDOW {
                window.stamps.pop_front();
            } else {
                break;
            }
        }

        if window.stamps.len() < self.max_per_second.load(Ordering::Relaxed) {
            window.stamps.push_back(now);
            let dropped = std::mem::take(&mut window.dropped);
            if dropped > 0 {
                window.last_report = Some(now);
                return (true, Some(dropped));
            }
            return (true, None);
        }

        window.dropped += 1;
        let due = window
            .last_report
            .map_or(true, |last| now.duration_since(last) >= WINDOW);
        if due {
            window.last_report = Some(now);
            (false, Some(std::mem::take(&mut window.dropped)))
        } else {
            (false, None)
        }
    }
}

/// Global logging configuration
pub struct LogConfig {
    global_level: AtomicU8,
    levels: [AtomicU8; CATEGORY_COUNT],
    file_sender: Mutex<Option<Sender<String>>>,
    file_enabled: AtomicBool,
    limiter: RateLimiter,
}

impl LogConfig {
    fn new() -> Self {
        Self {
            global_level: AtomicU8::new(LogLevel::Off as u8),
            levels: Default::default(),
            file_sender: Mutex::new(None),
            file_enabled: AtomicBool::new(false),
            limiter: RateLimiter::new(60),
        }
    }

    /// The process-wide instance
    pub fn global() -> &'static Self {
        static INSTANCE: OnceLock<LogConfig> = OnceLock::new();
        INSTANCE.get_or_init(LogConfig::new)
    }

    pub fn set_global_level(&self, level: LogLevel) {
        self.global_level.store(level as u8, Ordering::Relaxed);
    }

    pub fn global_level(&self) -> LogLevel {
        LogLevel::from_u8(self.global_level.load(Ordering::Relaxed))
    }

    /// Override the level for one category (`Off` falls back to global)
    pub fn set_level(&self, category: LogCategory, level: LogLevel) {
        self.levels[category.index()].store(level as u8, Ordering::Relaxed);
    }

    pub fn level(&self, category: LogCategory) -> LogLevel {
        LogLevel::from_u8(self.levels[category.index()].load(Ordering::Relaxed))
    }

    /// A category-specific level wins over the global one.
    pub fn should_log(&self, category: LogCategory, level: LogLevel) -> bool {
        if level == LogLevel::Off {
            return false;
        }
        match self.level(category) {
            LogLevel::Off => level <= self.global_level(),
            specific => level <= specific,
        }
    }

    /// Turn every category and the global level off
    pub fn reset(&self) {
        self.set_global_level(LogLevel::Off);
        for category in LogCategory::ALL {
            self.set_level(category, LogLevel::Off);
        }
    }

    pub fn set_rate_limit(&self, max_per_second: usize) {
        self.limiter
            .max_per_second
            .store(max_per_second, Ordering::Relaxed);
    }

    pub fn rate_limit(&self) -> usize {
        self.limiter.max_per_second.load(Ordering::Relaxed)
    }

    /// Append log output to `path` from a background writer thread.
    pub fn set_log_file(&self, path: PathBuf) -> std::io::Result<()> {
        let mut file = OpenOptions::new().create(true).append(true).open(path)?;
        let (sender, receiver) = channel::<String>();

        thread::Builder::new()
            .name("log-writer".to_string())
            .spawn(move || {
                while let Ok(message) = receiver.recv() {
                    let _ = writeln!(file, "{}", message);
                    let _ = file.flush();
                }
            })?;

        if let Ok(mut slot) = self.file_sender.lock() {
            *slot = Some(sender);
        }
        self.file_enabled.store(true, Ordering::Relaxed);
        Ok(())
    }

    /// Stop file output; the writer thread exits when its channel closes.
    pub fn clear_log_file(&self) {
        if let Ok(mut slot) = self.file_sender.lock() {
            *slot = None;
        }
        self.file_enabled.store(false, Ordering::Relaxed);
    }

    fn write_message(&self, message: String) {
        if self.file_enabled.load(Ordering::Relaxed) {
            if let Ok(slot) = self.file_sender.lock() {
                if let Some(sender) = slot.as_ref() {
                    if let Err(failed) = sender.send(message) {
                        eprintln!("{}", failed.0);
                    }
                    return;
                }
            }
        }
        eprintln!("{}", message);
    }
}

/// Log a lazily formatted message under `category` at `level`.
pub fn log<F>(category: LogCategory, level: LogLevel, message_fn: F)
where
    F: FnOnce() -> String,
{
    let config = LogConfig::global();
    if !config.should_log(category, level) {
        return;
    }

    let (allowed, dropped) = config.limiter.admit(category);
    if let Some(count) = dropped.filter(|&n| n > 0) {
        config.write_message(format!(
            "[{:?}] rate limit exceeded, {} message(s) dropped",
            category, count
        ));
    }
    if allowed {
        config.write_message(message_fn());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_level_parsing() {
        assert_eq!(LogLevel::parse("OFF"), Some(LogLevel::Off));
        assert_eq!(LogLevel::parse("err"), Some(LogLevel::Error));
        assert_eq!(LogLevel::parse("Warning"), Some(LogLevel::Warn));
        assert_eq!(LogLevel::parse("3"), Some(LogLevel::Info));
        assert_eq!(LogLevel::parse("debug"), Some(LogLevel::Debug));
        assert_eq!(LogLevel::parse("TRACE"), Some(LogLevel::Trace));
        assert_eq!(LogLevel::parse("loud"), None);
    }

    #[test]
    fn test_category_parsing() {
        assert_eq!(LogCategory::parse("VDP"), Some(LogCategory::Vdp));
        assert_eq!(LogCategory::parse("z80"), Some(LogCategory::Sound));
        assert_eq!(LogCategory::parse("irq"), Some(LogCategory::Interrupts));
        assert_eq!(LogCategory::parse("gpu"), None);
    }

    #[test]
    fn test_category_level_overrides_global() {
        let config = LogConfig::new();
        config.set_global_level(LogLevel::Error);
        config.set_level(LogCategory::Dma, LogLevel::Debug);

        assert!(config.should_log(LogCategory::Dma, LogLevel::Debug));
        assert!(!config.should_log(LogCategory::Dma, LogLevel::Trace));
        assert!(config.should_log(LogCategory::Bus, LogLevel::Error));
        assert!(!config.should_log(LogCategory::Bus, LogLevel::Warn));
    }

    #[test]
    fn test_off_level_never_logs() {
        let config = LogConfig::new();
        config.set_global_level(LogLevel::Trace);
        assert!(!config.should_log(LogCategory::Vdp, LogLevel::Off));
    }

    #[test]
    fn test_reset() {
        let config = LogConfig::new();
        config.set_global_level(LogLevel::Trace);
        config.set_level(LogCategory::Vdp, LogLevel::Debug);
        config.reset();

        assert_eq!(config.global_level(), LogLevel::Off);
        assert!(LogCategory::ALL
            .iter()
            .all(|&c| config.level(c) == LogLevel::Off));
    }

    #[test]
    fn test_rate_limiter_is_per_category() {
        let limiter = RateLimiter::new(3);
        for _ in 0..3 {
            assert!(limiter.admit(LogCategory::Vdp).0);
        }
        let (allowed, dropped) = limiter.admit(LogCategory::Vdp);
        assert!(!allowed);
        assert_eq!(dropped, Some(1));

        assert!(limiter.admit(LogCategory::Bus).0);
    }

    #[test]
    fn test_rate_limiter_window_slides() {
        let limiter = RateLimiter::new(2);
        limiter.admit(LogCategory::Cpu);
        limiter.admit(LogCategory::Cpu);
        limiter.admit(LogCategory::Cpu);
        limiter.admit(LogCategory::Cpu);

        std::thread::sleep(Duration::from_millis(1100));

        let (allowed, dropped) = limiter.admit(LogCategory::Cpu);
        assert!(allowed);
        assert_eq!(dropped, Some(1));
    }
}
