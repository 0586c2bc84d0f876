//! Console logging for the generator.
//!
//! The level is read once from `NPU_CODEGEN_TRACE`:
//! - `0` / `off` / `quiet`: only critical messages.
//! - unset or anything else: warnings.
//! - `1`: adds per-operator trace lines.
//! - `full`: everything, including routine skips.
use std::env;
use std::fmt::Arguments;
use std::sync::OnceLock;
use std::time::{SystemTime, UNIX_EPOCH};

#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum TraceLevel {
    Quiet,
    Warn,
    Basic,
    Full,
}

const COLOR_WARNING: &str = "33";
const COLOR_CRITICAL: &str = "31";
const COLOR_TRACE: &str = "34";

static TRACE_LEVEL: OnceLock<TraceLevel> = OnceLock::new();

fn parse_trace_level(value: &str) -> TraceLevel {
    let normalized = value.trim().to_ascii_lowercase();
    match normalized.as_str() {
        "0" | "off" | "quiet" => TraceLevel::Quiet,
        "1" => TraceLevel::Basic,
        "full" => TraceLevel::Full,
        _ => TraceLevel::Warn,
    }
}

fn trace_level() -> TraceLevel {
    *TRACE_LEVEL.get_or_init(|| {
        env::var("NPU_CODEGEN_TRACE")
            .ok()
            .as_deref()
            .map(parse_trace_level)
            .unwrap_or(TraceLevel::Warn)
    })
}

fn enabled(level: TraceLevel) -> bool {
    trace_level() >= level
}

fn timestamp_hms() -> String {
    let secs = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
        % 86_400;
    let hours = secs / 3_600;
    let minutes = (secs % 3_600) / 60;
    let seconds = secs % 60;
    format!("{:02}:{:02}:{:02}", hours, minutes, seconds)
}

fn emit(kind: &str, color: &str, args: Arguments) {
    let ts = timestamp_hms();
    println!("{ts} [\u{001b}[{color}m{kind}\u{001b}[0m] -- {args}");
}

/// Emit a warning unless logging is quiet.
pub fn emit_warning(args: Arguments) {
    if enabled(TraceLevel::Warn) {
        emit("WARNING", COLOR_WARNING, args);
    }
}

/// Emit a critical message unconditionally.
pub fn emit_critical(args: Arguments) {
    emit("CRITICAL", COLOR_CRITICAL, args);
}

/// Emit a trace line when `NPU_CODEGEN_TRACE` is `1` or `full`.
pub fn emit_trace(args: Arguments) {
    if enabled(TraceLevel::Basic) {
        emit("TRACE", COLOR_TRACE, args);
    }
}

/// Emit a trace line only at `full`.
pub fn emit_trace_full(args: Arguments) {
    if enabled(TraceLevel::Full) {
        emit("TRACE", COLOR_TRACE, args);
    }
}

/// Emit a warning message via the logging subsystem.
#[macro_export]
macro_rules! warning {
    ($($arg:tt)*) => {
        $crate::logging::emit_warning(format_args!($($arg)*))
    };
}

/// Emit a critical message via the logging subsystem.
#[macro_export]
macro_rules! critical {
    ($($arg:tt)*) => {
        $crate::logging::emit_critical(format_args!($($arg)*))
    };
}

/// Emit a trace message via the logging subsystem.
#[macro_export]
macro_rules! trace {
    ($($arg:tt)*) => {
        $crate::logging::emit_trace(format_args!($($arg)*))
    };
}

/// Emit a verbose trace message via the logging subsystem.
#[macro_export]
macro_rules! trace_full {
    ($($arg:tt)*) => {
        $crate::logging::emit_trace_full(format_args!($($arg)*))
    };
}
