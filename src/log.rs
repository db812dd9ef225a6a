//! Pluggable logging backend, mirroring the teacher's `klog` subsystem
//! (`lib/src/klog.rs`): a single function-pointer backend that every log
//! macro funnels through, with an early fallback for hosts that have not
//! registered one yet.
//!
//! Unlike the teacher's kernel, this crate has no COM1 fallback to fall
//! back to — the early backend here simply drops the line. Embedding code
//! is expected to call [`set_backend`] during its own init.

use core::fmt;
use core::sync::atomic::{AtomicPtr, AtomicU8, Ordering};

#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LogLevel {
    Error = 0,
    Warn = 1,
    Info = 2,
    Debug = 3,
    Trace = 4,
}

static CURRENT_LEVEL: AtomicU8 = AtomicU8::new(LogLevel::Info as u8);

#[inline(always)]
fn is_enabled(level: LogLevel) -> bool {
    level as u8 <= CURRENT_LEVEL.load(Ordering::Relaxed)
}

pub type LogBackend = fn(LogLevel, fmt::Arguments<'_>);

static BACKEND: AtomicPtr<()> = AtomicPtr::new(core::ptr::null_mut());

fn null_backend(_level: LogLevel, _args: fmt::Arguments<'_>) {}

/// Register the backend that receives every enabled log line.
///
/// Typically called once by the embedding application during its own
/// startup, the same way the teacher's serial driver registers itself
/// with `klog_register_backend`.
pub fn set_backend(backend: LogBackend) {
    BACKEND.store(backend as *mut (), Ordering::Release);
}

pub fn set_level(level: LogLevel) {
    CURRENT_LEVEL.store(level as u8, Ordering::Relaxed);
}

pub fn level() -> LogLevel {
    match CURRENT_LEVEL.load(Ordering::Relaxed) {
        0 => LogLevel::Error,
        1 => LogLevel::Warn,
        2 => LogLevel::Info,
        3 => LogLevel::Debug,
        _ => LogLevel::Trace,
    }
}

#[doc(hidden)]
pub fn log_args(level: LogLevel, args: fmt::Arguments<'_>) {
    if !is_enabled(level) {
        return;
    }
    let ptr = BACKEND.load(Ordering::Acquire);
    if ptr.is_null() {
        null_backend(level, args);
    } else {
        // SAFETY: `set_backend` only ever stores a valid `LogBackend` fn
        // pointer, which is pointer-sized on all supported targets.
        let backend: LogBackend = unsafe { core::mem::transmute(ptr) };
        backend(level, args);
    }
}

#[macro_export]
macro_rules! dlog_error {
    ($($arg:tt)*) => {
        $crate::log::log_args($crate::log::LogLevel::Error, ::core::format_args!($($arg)*))
    };
}

#[macro_export]
macro_rules! dlog_warn {
    ($($arg:tt)*) => {
        $crate::log::log_args($crate::log::LogLevel::Warn, ::core::format_args!($($arg)*))
    };
}

#[macro_export]
macro_rules! dlog_info {
    ($($arg:tt)*) => {
        $crate::log::log_args($crate::log::LogLevel::Info, ::core::format_args!($($arg)*))
    };
}

#[macro_export]
macro_rules! dlog_debug {
    ($($arg:tt)*) => {
        $crate::log::log_args($crate::log::LogLevel::Debug, ::core::format_args!($($arg)*))
    };
}
