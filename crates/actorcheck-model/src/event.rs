//! Events delivered to machine queues.

use std::fmt;

/// Name of the synthetic event every machine receives at startup.
pub const ENTRY: &str = "Entry";

/// An event sitting in a machine's queue.
///
/// The name is the event's type tag used for handler dispatch; the detail is an
/// opaque payload that takes part in fingerprinting and reporting.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Event {
    name: String,
    detail: String,
}

impl Event {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            detail: String::new(),
        }
    }

    /// The startup event seeded into every queue of the initial world.
    pub fn entry() -> Self {
        Self::new(ENTRY)
    }

    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = detail.into();
        self
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    pub fn detail(&self) -> &str {
        &self.detail
    }

    pub fn is_entry(&self) -> bool {
        self.name == ENTRY
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.detail.is_empty() {
            write!(f, "{}", self.name)
        } else {
            write!(f, "{}({})", self.name, self.detail)
        }
    }
}
