//! Builds a snapshot by draining a backing store, then compacts it
//!
//! The build walks every part of speech depth-first over the store's own
//! iterators, polling the cancel flag at coarse checkpoints: an
//! interrupted build returns `Ok(None)` and publishes nothing. Compaction
//! then rewrites every cross-reference to the instance held by the maps
//! just built; a reference to an id that was never loaded is fatal.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tracing::info;

use crate::content::PartOfSpeech;
use crate::error::{LexError, Result};
use crate::model::{Entry, SenseEntry};
use crate::store::LexicalStore;

use super::snapshot::Snapshot;

pub(crate) fn build_from_store<S: LexicalStore + ?Sized>(
    store: &S,
    cancel: &AtomicBool,
) -> Result<Option<Snapshot>> {
    let interrupted = || cancel.load(Ordering::Relaxed);
    let mut snapshot = Snapshot::new(store.version()?);

    for pos in PartOfSpeech::ALL {
        for entry in store.entries(pos)? {
            snapshot.entries[pos.index()].insert(entry.id.clone(), Arc::new(entry));
        }
        if interrupted() {
            return Ok(None);
        }

        for group in store.groups(pos)? {
            for member in &group.members {
                snapshot
                    .members
                    .insert(member.key.clone(), member.clone());
            }
            snapshot.groups[pos.index()].insert(group.id.offset, Arc::new(group));
        }
        if interrupted() {
            return Ok(None);
        }

        for exception in store.exceptions(pos)? {
            snapshot.exceptions[pos.index()].insert(exception.id.clone(), Arc::new(exception));
        }
        if interrupted() {
            return Ok(None);
        }
    }

    for sense in store.all_sense_entries()? {
        // rekey on the member's own key so the duplicate string loaded
        // from the sense file is discarded
        let canonical = match snapshot.members.get_key_value(&sense.key) {
            Some((key, _)) => key.clone(),
            None => {
                return Err(LexError::UnresolvedReference(format!(
                    "sense record {} has no corresponding member",
                    sense.key
                )));
            }
        };
        snapshot.senses.insert(
            canonical.clone(),
            SenseEntry {
                key: canonical,
                ..sense
            },
        );
    }
    if interrupted() {
        return Ok(None);
    }

    compact(&mut snapshot)?;
    if interrupted() {
        return Ok(None);
    }

    info!(
        "loaded corpus into memory: {} entries, {} groups, {} exceptions, {} senses",
        snapshot.entry_count(),
        snapshot.group_count(),
        snapshot.exception_count(),
        snapshot.sense_count(),
    );
    Ok(Some(snapshot))
}

/// Rewrites cross-references to point at the objects the build just
/// produced. Every referenced id must already be present.
fn compact(snapshot: &mut Snapshot) -> Result<()> {
    let Snapshot {
        entries, groups, ..
    } = snapshot;

    for per_pos in groups.iter() {
        for group in per_pos.values() {
            for (_, target) in &group.relations {
                if !groups[target.pos.index()].contains_key(&target.offset) {
                    return Err(LexError::UnresolvedReference(format!(
                        "group {} relates to missing group {}",
                        group.id, target
                    )));
                }
            }
        }
    }

    for per_pos in entries.iter_mut() {
        for entry in per_pos.values_mut() {
            let mut rewritten = Vec::with_capacity(entry.groups.len());
            for reference in &entry.groups {
                let group = groups[reference.pos.index()]
                    .get(&reference.offset)
                    .ok_or_else(|| {
                        LexError::UnresolvedReference(format!(
                            "entry {} refers to missing group {}",
                            entry.id, reference
                        ))
                    })?;
                rewritten.push(group.id);
            }
            *entry = Arc::new(Entry {
                id: entry.id.clone(),
                use_count: entry.use_count,
                groups: rewritten,
            });
        }
    }
    Ok(())
}
