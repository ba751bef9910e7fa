//! Enum-backed flag sets.
//!
//! Roles, setup progress and email preferences are small closed sets of named
//! flags. They are stored as an `i64` bitmask column and handled in code as a
//! [`FlagSet`] over one of the flag enums below.

use std::fmt;
use std::marker::PhantomData;

use serde::{Deserialize, Serialize};

use crate::EngineError;

/// A closed set of named flags that can live in a [`FlagSet`].
pub trait Flag: Copy + Eq + 'static {
    /// Every variant, in bit order.
    const ALL: &'static [Self];

    /// Bit position in the stored mask. Must be stable once persisted.
    fn bit(self) -> u32;

    fn as_str(self) -> &'static str;
}

/// Set of flags stored as a bitmask.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct FlagSet<F> {
    bits: i64,
    _flag: PhantomData<F>,
}

impl<F: Flag> FlagSet<F> {
    pub const fn empty() -> Self {
        Self {
            bits: 0,
            _flag: PhantomData,
        }
    }

    pub fn all() -> Self {
        F::ALL.iter().copied().collect()
    }

    /// Build a set from a stored mask. Unknown bits are dropped.
    pub fn from_bits(bits: i64) -> Self {
        let known = Self::all().bits;
        Self {
            bits: bits & known,
            _flag: PhantomData,
        }
    }

    pub fn bits(self) -> i64 {
        self.bits
    }

    pub fn contains(self, flag: F) -> bool {
        self.bits & mask(flag) != 0
    }

    /// Add `flag`; returns `true` when it was not already present.
    pub fn insert(&mut self, flag: F) -> bool {
        let absent = !self.contains(flag);
        self.bits |= mask(flag);
        absent
    }

    /// Remove `flag`; returns `true` when it was present.
    pub fn remove(&mut self, flag: F) -> bool {
        let present = self.contains(flag);
        self.bits &= !mask(flag);
        present
    }

    pub fn is_empty(self) -> bool {
        self.bits == 0
    }

    pub fn len(self) -> usize {
        self.bits.count_ones() as usize
    }

    pub fn iter(self) -> impl Iterator<Item = F> {
        F::ALL.iter().copied().filter(move |flag| self.contains(*flag))
    }
}

fn mask<F: Flag>(flag: F) -> i64 {
    1_i64 << flag.bit()
}

impl<F: Flag> Default for FlagSet<F> {
    fn default() -> Self {
        Self::empty()
    }
}

impl<F: Flag> FromIterator<F> for FlagSet<F> {
    fn from_iter<I: IntoIterator<Item = F>>(iter: I) -> Self {
        let mut set = Self::empty();
        for flag in iter {
            set.insert(flag);
        }
        set
    }
}

impl<F: Flag> fmt::Debug for FlagSet<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.iter().map(Flag::as_str)).finish()
    }
}

/// Generates the `Flag` impl and string parsing for a flag enum.
macro_rules! impl_flag {
    ($ty:ty, $err:ident, $label:literal, [$(($variant:ident, $bit:literal, $name:literal)),+ $(,)?]) => {
        impl Flag for $ty {
            const ALL: &'static [Self] = &[$(Self::$variant),+];

            fn bit(self) -> u32 {
                match self {
                    $(Self::$variant => $bit),+
                }
            }

            fn as_str(self) -> &'static str {
                match self {
                    $(Self::$variant => $name),+
                }
            }
        }

        impl TryFrom<&str> for $ty {
            type Error = EngineError;

            fn try_from(value: &str) -> Result<Self, Self::Error> {
                match value {
                    $($name => Ok(Self::$variant),)+
                    other => Err(EngineError::$err(format!(
                        concat!("invalid ", $label, ": {}"),
                        other
                    ))),
                }
            }
        }
    };
}

/// Named roles a user can hold.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Admin,
    Entrepreneur,
    Mentor,
    NreduceMentor,
    Investor,
    Spectator,
}

impl_flag!(
    Role,
    InvalidRole,
    "role",
    [
        (Admin, 0, "admin"),
        (Entrepreneur, 1, "entrepreneur"),
        (Mentor, 2, "mentor"),
        (NreduceMentor, 3, "nreduce_mentor"),
        (Investor, 4, "investor"),
        (Spectator, 5, "spectator"),
    ]
);

impl Role {
    /// Roles a user may pick for themselves on the account-type form.
    pub fn is_self_assignable(self) -> bool {
        matches!(
            self,
            Self::Entrepreneur | Self::Mentor | Self::Investor | Self::Spectator
        )
    }
}

/// Onboarding steps a user has gone through.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SetupStep {
    AccountType,
    Profile,
    Startup,
    Welcome,
}

impl_flag!(
    SetupStep,
    InvalidFlag,
    "setup step",
    [
        (AccountType, 0, "account_type"),
        (Profile, 1, "profile"),
        (Startup, 2, "startup"),
        (Welcome, 3, "welcome"),
    ]
);

/// Kinds of email a user opted into.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmailPreference {
    DoCheckin,
    Comment,
    Message,
}

impl_flag!(
    EmailPreference,
    InvalidFlag,
    "email preference",
    [
        (DoCheckin, 0, "docheckin"),
        (Comment, 1, "comment"),
        (Message, 2, "message"),
    ]
);

pub type Roles = FlagSet<Role>;
pub type Setup = FlagSet<SetupStep>;
pub type EmailPreferences = FlagSet<EmailPreference>;
