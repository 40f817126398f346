//! Upstream partitions of the Mars photo catalogue.

use clap::ValueEnum;
use std::fmt;

/// A rover whose camera archive is queried independently.
///
/// The set is fixed at compile time; configuration can only narrow or
/// reorder it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, ValueEnum)]
pub enum Rover {
    Curiosity,
    Opportunity,
    Spirit,
}

impl Rover {
    /// Declaration order; photo batches are merged in this order.
    pub const ALL: [Rover; 3] = [Rover::Curiosity, Rover::Opportunity, Rover::Spirit];

    /// Path segment used by the upstream API.
    pub fn as_str(&self) -> &'static str {
        match self {
            Rover::Curiosity => "curiosity",
            Rover::Opportunity => "opportunity",
            Rover::Spirit => "spirit",
        }
    }
}

impl fmt::Display for Rover {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
