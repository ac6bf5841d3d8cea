//! Operating mode and the derived safety flags.
//!
//! The mode is parsed once at startup and never re-read per request, so
//! there is no time-of-check/time-of-use window between the two flags.
//! No other component re-derives these flags; the connector and the order
//! interceptor are the only consumers.

use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Operating mode of the gateway process.
///
/// | mode     | requires backend | allows real orders |
/// |----------|------------------|--------------------|
/// | disabled | no               | no                 |
/// | readonly | yes              | no                 |
/// | live     | yes              | yes                |
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum OperatingMode {
    /// No backend connection; every order is simulated.
    #[default]
    Disabled,
    /// Live backend connection for data, but orders are simulated.
    ReadOnly,
    /// Live backend connection and real order submission.
    Live,
}

impl OperatingMode {
    /// Parse a mode from string (case-insensitive). Unknown strings are a
    /// configuration error; there is deliberately no permissive default.
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "disabled" | "disabled-backend" | "mock" => Some(OperatingMode::Disabled),
            "readonly" | "read-only" | "connected-readonly" => Some(OperatingMode::ReadOnly),
            "live" | "connected-live" => Some(OperatingMode::Live),
            _ => None,
        }
    }
}

impl std::fmt::Display for OperatingMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OperatingMode::Disabled => write!(f, "disabled"),
            OperatingMode::ReadOnly => write!(f, "readonly"),
            OperatingMode::Live => write!(f, "live"),
        }
    }
}

impl FromStr for OperatingMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        OperatingMode::parse(s).ok_or_else(|| format!("Invalid operating mode: {}", s))
    }
}

/// The two safety booleans, fixed for the process lifetime.
///
/// Pure mapping from the operating mode; no side effects, no I/O.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModePolicy {
    mode: OperatingMode,
}

impl ModePolicy {
    pub fn new(mode: OperatingMode) -> Self {
        Self { mode }
    }

    pub fn mode(&self) -> OperatingMode {
        self.mode
    }

    /// Whether a live backend connection must be established.
    #[inline]
    pub fn requires_backend(&self) -> bool {
        matches!(self.mode, OperatingMode::ReadOnly | OperatingMode::Live)
    }

    /// Whether orders may reach the real backend. This is the interlock
    /// consulted by the order interceptor; it is never derivable from any
    /// per-request input.
    #[inline]
    pub fn allows_real_orders(&self) -> bool {
        matches!(self.mode, OperatingMode::Live)
    }
}
