use std::fmt;

/// Replication timestamp: seconds since the UNIX epoch plus an ordinal
/// increment for operations within the same second.
///
/// Ordering: `time` → `increment` (total order).
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct Timestamp {
    /// Seconds since UNIX epoch.
    pub time: u32,
    /// Ordinal within the second.
    pub increment: u32,
}

impl Timestamp {
    /// Create a timestamp with explicit values.
    pub const fn new(time: u32, increment: u32) -> Self {
        Self { time, increment }
    }

    /// Pack into the 64-bit wire layout (`time` in the high half).
    pub fn to_u64(self) -> u64 {
        (u64::from(self.time) << 32) | u64::from(self.increment)
    }

    /// Unpack from the 64-bit wire layout.
    pub fn from_u64(raw: u64) -> Self {
        Self {
            time: (raw >> 32) as u32,
            increment: raw as u32,
        }
    }
}

impl fmt::Debug for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Timestamp({}, {})", self.time, self.increment)
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.time, self.increment)
    }
}
