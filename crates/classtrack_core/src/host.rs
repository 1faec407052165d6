//! Host capability facade consumed by the class tracker.
//!
//! The host runtime provides object tagging and class enumeration; this crate
//! only describes the contract.

use crate::error::HostResult;
use std::fmt::{Display, Formatter};
use std::ops::BitOr;

/// Class status bits as reported by the host for each loaded class.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct ClassStatus(u32);

impl ClassStatus {
    pub const VERIFIED: Self = Self(1);
    pub const PREPARED: Self = Self(2);
    pub const INITIALIZED: Self = Self(4);
    pub const ERROR: Self = Self(8);
    pub const ARRAY: Self = Self(16);
    pub const PRIMITIVE: Self = Self(32);

    pub const fn from_bits(bits: u32) -> Self {
        Self(bits)
    }

    pub const fn bits(self) -> u32 {
        self.0
    }

    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    pub const fn intersects(self, other: Self) -> bool {
        self.0 & other.0 != 0
    }

    /// Only prepared classes and arrays are tracked.
    pub const fn is_trackable(self) -> bool {
        self.intersects(Self(Self::PREPARED.0 | Self::ARRAY.0))
    }
}

impl BitOr for ClassStatus {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl Display for ClassStatus {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:#x}", self.0)
    }
}

/// Tagging and enumeration operations of the host runtime.
///
/// A tag of `0` means "untagged". Implementations report failures with the
/// host's own error code; the tracker treats every one of them as fatal.
pub trait ClassHost {
    /// Host handle for one loaded class.
    type Class;

    fn get_tag(&self, class: &Self::Class) -> HostResult<u64>;
    fn set_tag(&mut self, class: &Self::Class, tag: u64) -> HostResult<()>;
    /// Number of live objects currently carrying `tag`.
    fn objects_with_tag(&self, tag: u64) -> HostResult<i32>;
    fn loaded_classes(&self) -> HostResult<Vec<(Self::Class, ClassStatus)>>;
    fn signature_of(&self, class: &Self::Class) -> HostResult<String>;
}
