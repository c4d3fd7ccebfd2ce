// Copyright (C) 2025 Piers Finlayson <piers@piers.rocks>
//
// MIT License

//! Host platform detection.

use std::fmt;
use std::thread;
use std::time::Duration;

/// Host platform family, as far as launching external programs is concerned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Platform {
    Unix,
    Windows,
    Unknown,
}

impl Platform {
    pub fn detect() -> Self {
        if cfg!(windows) {
            Platform::Windows
        } else if cfg!(unix) {
            Platform::Unix
        } else {
            Platform::Unknown
        }
    }

    /// macOS is a Unix, but needs Terminal.app rather than xterm.
    pub fn is_darwin(&self) -> bool {
        *self == Platform::Unix && cfg!(target_os = "macos")
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Platform::Unix => write!(f, "unix"),
            Platform::Windows => write!(f, "windows"),
            Platform::Unknown => write!(f, "unknown"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Endianness {
    Big,
    Little,
}

impl Endianness {
    pub fn host() -> Self {
        if cfg!(target_endian = "big") {
            Endianness::Big
        } else {
            Endianness::Little
        }
    }
}

impl fmt::Display for Endianness {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Endianness::Big => write!(f, "big"),
            Endianness::Little => write!(f, "little"),
        }
    }
}

/// Sleeps for the given number of milliseconds.
pub fn msleep(ms: u64) {
    thread::sleep(Duration::from_millis(ms));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_host_endianness() {
        let expected = if 1u16.to_ne_bytes()[0] == 1 {
            Endianness::Little
        } else {
            Endianness::Big
        };
        assert_eq!(Endianness::host(), expected);
    }

    #[test]
    fn test_platform_known() {
        #[cfg(any(unix, windows))]
        assert_ne!(Platform::detect(), Platform::Unknown);
        #[cfg(windows)]
        assert!(!Platform::detect().is_darwin());
    }
}
