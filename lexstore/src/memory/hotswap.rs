//! Iterators that swap from disk to memory mid-iteration
//!
//! An iterator obtained before a snapshot exists wraps a disk-backed
//! iterator and remembers the last item it returned. On each step it
//! checks whether a snapshot has been published; if so it discards the
//! disk iterator, builds a fresh one over the in-memory maps for the same
//! scope, and fast-forwards past everything up to and including the
//! remembered item. The two representations are not pointer-stable across
//! the swap, so items are matched by value.

use std::sync::Arc;

use parking_lot::RwLock;

use crate::content::PartOfSpeech;
use crate::model::{Entry, ExceptionEntry, Group, SenseEntry};

use super::snapshot::Snapshot;

/// Which sequence of the snapshot an iterator walks.
#[derive(Debug, Clone, Copy)]
pub(crate) enum Scope {
    Entries(PartOfSpeech),
    Groups(PartOfSpeech),
    Exceptions(PartOfSpeech),
    Senses,
}

enum IterState<'a, T> {
    Disk(Box<dyn Iterator<Item = T> + Send + 'a>),
    Memory(std::vec::IntoIter<T>),
}

pub(crate) struct HotSwapIter<'a, T: Clone + PartialEq> {
    snapshot: &'a RwLock<Option<Arc<Snapshot>>>,
    scope: Scope,
    make: fn(&Snapshot, Scope) -> Vec<T>,
    state: IterState<'a, T>,
    last: Option<T>,
}

impl<'a, T: Clone + PartialEq> HotSwapIter<'a, T> {
    pub(crate) fn over_disk(
        snapshot: &'a RwLock<Option<Arc<Snapshot>>>,
        scope: Scope,
        make: fn(&Snapshot, Scope) -> Vec<T>,
        disk: Box<dyn Iterator<Item = T> + Send + 'a>,
    ) -> Self {
        Self {
            snapshot,
            scope,
            make,
            state: IterState::Disk(disk),
            last: None,
        }
    }

    fn check_for_swap(&mut self) {
        let Some(snapshot) = self.snapshot.read().clone() else {
            return;
        };
        let mut replacement = (self.make)(&snapshot, self.scope).into_iter();
        if let Some(last) = &self.last {
            let found = replacement.by_ref().any(|item| &item == last);
            assert!(
                found,
                "in-memory snapshot diverged from disk iteration order"
            );
        }
        self.state = IterState::Memory(replacement);
    }
}

impl<T: Clone + PartialEq> Iterator for HotSwapIter<'_, T> {
    type Item = T;

    fn next(&mut self) -> Option<T> {
        if matches!(self.state, IterState::Disk(_)) {
            self.check_for_swap();
        }
        match &mut self.state {
            IterState::Disk(disk) => {
                let item = disk.next();
                if item.is_some() {
                    self.last.clone_from(&item);
                }
                item
            }
            IterState::Memory(memory) => memory.next(),
        }
    }
}

pub(crate) fn entries_of(snapshot: &Snapshot, scope: Scope) -> Vec<Entry> {
    match scope {
        Scope::Entries(pos) => snapshot.entries[pos.index()]
            .values()
            .map(|e| (**e).clone())
            .collect(),
        _ => Vec::new(),
    }
}

pub(crate) fn groups_of(snapshot: &Snapshot, scope: Scope) -> Vec<Group> {
    match scope {
        Scope::Groups(pos) => snapshot.groups[pos.index()]
            .values()
            .map(|g| (**g).clone())
            .collect(),
        _ => Vec::new(),
    }
}

pub(crate) fn exceptions_of(snapshot: &Snapshot, scope: Scope) -> Vec<ExceptionEntry> {
    match scope {
        Scope::Exceptions(pos) => snapshot.exceptions[pos.index()]
            .values()
            .map(|x| (**x).clone())
            .collect(),
        _ => Vec::new(),
    }
}

pub(crate) fn senses_of(snapshot: &Snapshot, scope: Scope) -> Vec<SenseEntry> {
    match scope {
        Scope::Senses => snapshot.senses.values().cloned().collect(),
        _ => Vec::new(),
    }
}
