pub mod config;
pub mod error;
pub mod security;
pub mod storage;
pub mod identity;
pub mod spending;
pub mod server;

// Test-only printing helper: expands to eprintln! in tests and debug builds and is a no-op otherwise.
// Usage: tprintln!("debug: {}", value);
#[cfg(any(test, debug_assertions))]
#[macro_export]
macro_rules! tprintln {
    ($($arg:tt)*) => ( eprintln!($($arg)*) );
}

// In release builds, provide a no-op tprintln! so calls compile without effect.
#[cfg(not(any(test, debug_assertions)))]
#[macro_export]
macro_rules! tprintln {
    ($($arg:tt)*) => ({
        // Preserve formatting checks in release without producing code
        if false { let _ = format!($($arg)*); }
    });
}
