//! Bounded LRU caching over any lexical store
//!
//! [`CachingStore`] fronts a backing store with an [`ItemCache`]: four
//! independent access-order maps, one per key family. Every read probes
//! its map first and populates it on a non-absent result from the backing
//! store. No map ever exceeds its configured maximum after a mutating
//! call returns.

use std::num::NonZeroUsize;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use lru::LruCache;
use parking_lot::Mutex;
use tracing::debug;

use crate::content::PartOfSpeech;
use crate::error::{LexError, Result};
use crate::model::{
    Entry, EntryId, ExceptionEntry, ExceptionId, Group, GroupId, Item, ItemId, Member, SenseEntry,
    SenseKey,
};
use crate::store::LexicalStore;
use crate::types::Version;

struct CacheMaps {
    items: LruCache<ItemId, Item>,
    members: LruCache<SenseKey, Member>,
    senses: LruCache<SenseKey, SenseEntry>,
    sense_runs: LruCache<SenseKey, Arc<[SenseEntry]>>,
}

impl CacheMaps {
    fn new(capacity: usize) -> Self {
        let capacity = bounded(capacity);
        Self {
            items: LruCache::new(capacity),
            members: LruCache::new(capacity),
            senses: LruCache::new(capacity),
            sense_runs: LruCache::new(capacity),
        }
    }

    fn resize(&mut self, capacity: usize) {
        let capacity = bounded(capacity);
        self.items.resize(capacity);
        self.members.resize(capacity);
        self.senses.resize(capacity);
        self.sense_runs.resize(capacity);
    }

    fn len(&self) -> usize {
        self.items.len() + self.members.len() + self.senses.len() + self.sense_runs.len()
    }
}

/// Capacities below one mean "unbounded".
fn bounded(capacity: usize) -> NonZeroUsize {
    NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MAX)
}

/// Four access-order evicting maps keyed by item id and sense key.
pub struct ItemCache {
    maps: Mutex<Option<CacheMaps>>,
    enabled: AtomicBool,
    capacity: AtomicUsize,
}

impl ItemCache {
    pub const DEFAULT_MAXIMUM_CAPACITY: usize = 512;

    pub fn new(capacity: usize) -> Self {
        Self {
            maps: Mutex::new(None),
            enabled: AtomicBool::new(true),
            capacity: AtomicUsize::new(capacity),
        }
    }

    /// Allocates the maps. Idempotent.
    pub fn open(&self) {
        let mut maps = self.maps.lock();
        if maps.is_none() {
            *maps = Some(CacheMaps::new(self.capacity.load(Ordering::Relaxed)));
        }
    }

    pub fn is_open(&self) -> bool {
        self.maps.lock().is_some()
    }

    /// Releases the maps and their contents.
    pub fn close(&self) {
        *self.maps.lock() = None;
    }

    /// Empties all four maps without releasing them.
    pub fn clear(&self) {
        if let Some(maps) = self.maps.lock().as_mut() {
            maps.items.clear();
            maps.members.clear();
            maps.senses.clear();
            maps.sense_runs.clear();
            debug!("item cache cleared");
        }
    }

    /// Disabling stops population; existing entries keep being served.
    pub fn set_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::Relaxed);
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Relaxed)
    }

    pub fn maximum_capacity(&self) -> usize {
        self.capacity.load(Ordering::Relaxed)
    }

    /// Applies to each map independently; shrinking evicts immediately.
    pub fn set_maximum_capacity(&self, capacity: usize) {
        self.capacity.store(capacity, Ordering::Relaxed);
        if let Some(maps) = self.maps.lock().as_mut() {
            maps.resize(capacity);
        }
    }

    /// Total entries across the four maps.
    pub fn len(&self) -> Result<usize> {
        Ok(self.maps()?.len())
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }

    fn maps(&self) -> Result<parking_lot::MappedMutexGuard<'_, CacheMaps>> {
        parking_lot::MutexGuard::try_map(self.maps.lock(), Option::as_mut)
            .map_err(|_| LexError::Closed)
    }

    pub fn item(&self, id: &ItemId) -> Result<Option<Item>> {
        Ok(self.maps()?.items.get(id).cloned())
    }

    pub fn insert_item(&self, item: Item) -> Result<()> {
        let mut maps = self.maps()?;
        if self.is_enabled() {
            maps.items.put(item.id(), item);
        }
        Ok(())
    }

    pub fn member(&self, key: &SenseKey) -> Result<Option<Member>> {
        Ok(self.maps()?.members.get(key).cloned())
    }

    pub fn insert_member(&self, member: Member) -> Result<()> {
        let mut maps = self.maps()?;
        if self.is_enabled() {
            maps.members.put(member.key.clone(), member);
        }
        Ok(())
    }

    pub fn sense_entry(&self, key: &SenseKey) -> Result<Option<SenseEntry>> {
        Ok(self.maps()?.senses.get(key).cloned())
    }

    pub fn insert_sense_entry(&self, entry: SenseEntry) -> Result<()> {
        let mut maps = self.maps()?;
        if self.is_enabled() {
            maps.senses.put(entry.key.clone(), entry);
        }
        Ok(())
    }

    pub fn sense_run(&self, key: &SenseKey) -> Result<Option<Arc<[SenseEntry]>>> {
        Ok(self.maps()?.sense_runs.get(key).cloned())
    }

    pub fn insert_sense_run(&self, key: SenseKey, run: Arc<[SenseEntry]>) -> Result<()> {
        let mut maps = self.maps()?;
        if self.is_enabled() {
            maps.sense_runs.put(key, run);
        }
        Ok(())
    }
}

impl Default for ItemCache {
    fn default() -> Self {
        Self::new(Self::DEFAULT_MAXIMUM_CAPACITY)
    }
}

/// A lexical store fronted by an [`ItemCache`]. Open and close delegate to
/// the backing store; the cache is allocated on open and released on close.
pub struct CachingStore<S> {
    backing: S,
    cache: ItemCache,
}

impl<S: LexicalStore> CachingStore<S> {
    pub fn new(backing: S) -> Self {
        Self::with_capacity(backing, ItemCache::DEFAULT_MAXIMUM_CAPACITY)
    }

    pub fn with_capacity(backing: S, capacity: usize) -> Self {
        Self {
            backing,
            cache: ItemCache::new(capacity),
        }
    }

    pub fn cache(&self) -> &ItemCache {
        &self.cache
    }

    pub fn backing(&self) -> &S {
        &self.backing
    }
}

impl<S: LexicalStore> LexicalStore for CachingStore<S> {
    fn open(&self) -> Result<()> {
        self.backing.open()?;
        self.cache.open();
        Ok(())
    }

    fn is_open(&self) -> bool {
        self.backing.is_open()
    }

    fn close(&self) {
        self.backing.close();
        self.cache.close();
    }

    fn version(&self) -> Result<Option<Version>> {
        self.backing.version()
    }

    fn entry(&self, id: &EntryId) -> Result<Option<Entry>> {
        if let Some(Item::Entry(hit)) = self.cache.item(&ItemId::Entry(id.clone()))? {
            return Ok(Some((*hit).clone()));
        }
        let found = self.backing.entry(id)?;
        if let Some(entry) = &found {
            self.cache.insert_item(Item::Entry(Arc::new(entry.clone())))?;
        }
        Ok(found)
    }

    fn group(&self, id: GroupId) -> Result<Option<Group>> {
        if let Some(Item::Group(hit)) = self.cache.item(&ItemId::Group(id))? {
            return Ok(Some((*hit).clone()));
        }
        let found = self.backing.group(id)?;
        if let Some(group) = &found {
            self.cache.insert_item(Item::Group(Arc::new(group.clone())))?;
        }
        Ok(found)
    }

    fn member(&self, key: &SenseKey) -> Result<Option<Member>> {
        if let Some(hit) = self.cache.member(key)? {
            return Ok(Some(hit));
        }
        let found = self.backing.member(key)?;
        if let Some(member) = &found {
            self.cache.insert_member(member.clone())?;
        }
        Ok(found)
    }

    fn sense_entry(&self, key: &SenseKey) -> Result<Option<SenseEntry>> {
        if let Some(hit) = self.cache.sense_entry(key)? {
            return Ok(Some(hit));
        }
        let found = self.backing.sense_entry(key)?;
        if let Some(entry) = &found {
            self.cache.insert_sense_entry(entry.clone())?;
        }
        Ok(found)
    }

    fn sense_entries(&self, key: &SenseKey) -> Result<Vec<SenseEntry>> {
        if let Some(hit) = self.cache.sense_run(key)? {
            return Ok(hit.to_vec());
        }
        let found = self.backing.sense_entries(key)?;
        if !found.is_empty() {
            self.cache
                .insert_sense_run(key.clone(), Arc::from(found.as_slice()))?;
        }
        Ok(found)
    }

    fn exception(&self, id: &ExceptionId) -> Result<Option<ExceptionEntry>> {
        if let Some(Item::Exception(hit)) = self.cache.item(&ItemId::Exception(id.clone()))? {
            return Ok(Some((*hit).clone()));
        }
        let found = self.backing.exception(id)?;
        if let Some(exception) = &found {
            self.cache
                .insert_item(Item::Exception(Arc::new(exception.clone())))?;
        }
        Ok(found)
    }

    fn entries(&self, pos: PartOfSpeech) -> Result<Box<dyn Iterator<Item = Entry> + Send + '_>> {
        self.backing.entries(pos)
    }

    fn groups(&self, pos: PartOfSpeech) -> Result<Box<dyn Iterator<Item = Group> + Send + '_>> {
        self.backing.groups(pos)
    }

    fn exceptions(
        &self,
        pos: PartOfSpeech,
    ) -> Result<Box<dyn Iterator<Item = ExceptionEntry> + Send + '_>> {
        self.backing.exceptions(pos)
    }

    fn all_sense_entries(&self) -> Result<Box<dyn Iterator<Item = SenseEntry> + Send + '_>> {
        self.backing.all_sense_entries()
    }
}
