//! In-memory entry store: the reconstructed view of the log that
//! [`crate::log_manager::recover`] hands back alongside the
//! [`crate::LogManager`] itself.

use crate::entry::{Entry, EntryPayload, HardState};

/// The interface recovery and appends drive, kept as a trait so a caller
/// could substitute their own store; [`MemoryStorage`] is the one this crate
/// ships.
pub trait EntryStore<P> {
    /// The full ordered slice of retained entries, mutable so the suffix
    /// truncation rule in [`crate::log_manager::append_to_mem_store`] can
    /// pop a diverging tail before pushing.
    fn entries(&mut self) -> &mut Vec<Entry<P>>;

    fn set_hard_state(&mut self, hard_state: HardState);

    fn hard_state(&self) -> &HardState;
}

/// A plain `Vec`-backed [`EntryStore`].
#[derive(Clone, Debug, Default)]
pub struct MemoryStorage<P> {
    entries: Vec<Entry<P>>,
    hard_state: HardState,
}

impl<P: EntryPayload> MemoryStorage<P> {
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
            hard_state: HardState::default(),
        }
    }
}

impl<P: EntryPayload> EntryStore<P> for MemoryStorage<P> {
    fn entries(&mut self) -> &mut Vec<Entry<P>> {
        &mut self.entries
    }

    fn set_hard_state(&mut self, hard_state: HardState) {
        self.hard_state = hard_state;
    }

    fn hard_state(&self) -> &HardState {
        &self.hard_state
    }
}
