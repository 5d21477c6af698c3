//! Fully in-memory store with hot-swapped iteration
//!
//! [`MemoryStore`] wraps either a backing [`LexicalStore`] or a previously
//! exported snapshot image. Disk-backed construction loads according to
//! the configured [`LoadPolicy`]; image construction always loads
//! immediately. Until the load completes every operation delegates to the
//! backing store, and iterators started before completion transparently
//! swap to the snapshot without losing or repeating items.

mod hotswap;
mod loader;
mod snapshot;

pub use snapshot::Snapshot;

use std::io::{Read, Write};
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};

use parking_lot::{Condvar, Mutex, RwLock};
use tracing::{debug, error, info};

use crate::content::PartOfSpeech;
use crate::error::{LexError, Result};
use crate::model::{
    Entry, EntryId, ExceptionEntry, ExceptionId, Group, GroupId, Member, SenseEntry, SenseKey,
};
use crate::store::{DataSourceStore, LexicalStore};
use crate::types::{LoadPolicy, Version};

use hotswap::{HotSwapIter, Scope};

/// Lifecycle of a [`MemoryStore`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    Closed,
    Opening,
    Open,
    Closing,
}

/// State machine serializing open/close transitions. Threads observing a
/// transition in progress wait for it to settle before acting.
struct Lifecycle {
    state: Mutex<LifecycleState>,
    settled: Condvar,
}

enum OpenGate {
    AlreadyOpen,
    Started,
}

impl Lifecycle {
    fn new() -> Self {
        Self {
            state: Mutex::new(LifecycleState::Closed),
            settled: Condvar::new(),
        }
    }

    fn current(&self) -> LifecycleState {
        *self.state.lock()
    }

    fn begin_open(&self) -> OpenGate {
        let mut state = self.state.lock();
        loop {
            match *state {
                LifecycleState::Open => return OpenGate::AlreadyOpen,
                LifecycleState::Closed => {
                    *state = LifecycleState::Opening;
                    return OpenGate::Started;
                }
                _ => self.settled.wait(&mut state),
            }
        }
    }

    fn begin_close(&self) -> bool {
        let mut state = self.state.lock();
        loop {
            match *state {
                LifecycleState::Closed => return false,
                LifecycleState::Open => {
                    *state = LifecycleState::Closing;
                    return true;
                }
                _ => self.settled.wait(&mut state),
            }
        }
    }

    fn settle(&self, state: LifecycleState) {
        *self.state.lock() = state;
        self.settled.notify_all();
    }
}

/// Provides the byte stream of a previously exported snapshot image.
pub trait ImageSource: Send + Sync {
    fn open(&self) -> std::io::Result<Box<dyn Read + Send>>;
}

/// Image source reading from a file on disk.
pub struct FileImage {
    path: PathBuf,
}

impl FileImage {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl ImageSource for FileImage {
    fn open(&self) -> std::io::Result<Box<dyn Read + Send>> {
        Ok(Box::new(std::fs::File::open(&self.path)?))
    }
}

enum Backing<S> {
    Store(Arc<S>),
    Image(Arc<dyn ImageSource>),
}

/// Store that builds and serves a fully-resident snapshot of its backing
/// store, hot-swapping live iterators once the snapshot is published.
pub struct MemoryStore<S: LexicalStore + 'static = DataSourceStore> {
    backing: Backing<S>,
    policy: LoadPolicy,
    lifecycle: Lifecycle,
    loader: Mutex<Option<JoinHandle<()>>>,
    snapshot: Arc<RwLock<Option<Arc<Snapshot>>>>,
    cancel: Arc<AtomicBool>,
}

impl<S: LexicalStore + 'static> MemoryStore<S> {
    /// Wrap a backing store; the load policy decides when the snapshot is
    /// built.
    pub fn new(backing: S, policy: LoadPolicy) -> Self {
        Self {
            backing: Backing::Store(Arc::new(backing)),
            policy,
            lifecycle: Lifecycle::new(),
            loader: Mutex::new(None),
            snapshot: Arc::new(RwLock::new(None)),
            cancel: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Load from an exported image; the load always happens at open.
    pub fn from_image(image: impl ImageSource + 'static) -> Self {
        Self {
            backing: Backing::Image(Arc::new(image)),
            policy: LoadPolicy::Immediate,
            lifecycle: Lifecycle::new(),
            loader: Mutex::new(None),
            snapshot: Arc::new(RwLock::new(None)),
            cancel: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn load_policy(&self) -> LoadPolicy {
        self.policy
    }

    pub fn lifecycle_state(&self) -> LifecycleState {
        self.lifecycle.current()
    }

    /// Whether a snapshot has been published. Never blocks on a running
    /// load.
    pub fn is_loaded(&self) -> bool {
        self.snapshot.read().is_some()
    }

    /// The published snapshot, if any.
    pub fn snapshot(&self) -> Option<Arc<Snapshot>> {
        self.snapshot.read().clone()
    }

    /// Build the snapshot now, blocking or on a background thread. A
    /// second call while a build is running is a no-op; calls on a closed
    /// store do nothing.
    pub fn load(&self, block: bool) -> Result<()> {
        if self.is_loaded() {
            return Ok(());
        }
        let mut slot = self.loader.lock();
        if matches!(
            self.lifecycle.current(),
            LifecycleState::Closed | LifecycleState::Closing
        ) {
            return Ok(());
        }
        if let Some(handle) = slot.take() {
            if !handle.is_finished() && !block {
                *slot = Some(handle);
                return Ok(());
            }
            join_loader(handle);
            if self.is_loaded() {
                return Ok(());
            }
        }

        let snapshot = Arc::clone(&self.snapshot);
        let cancel = Arc::clone(&self.cancel);
        let handle = match &self.backing {
            Backing::Store(store) => {
                let store = Arc::clone(store);
                spawn_loader(move || {
                    match loader::build_from_store(store.as_ref(), &cancel) {
                        Ok(Some(built)) => {
                            *snapshot.write() = Some(Arc::new(built));
                            // the snapshot now answers everything
                            store.close();
                        }
                        Ok(None) => debug!("snapshot build interrupted; nothing published"),
                        Err(e) => error!("unable to load corpus into memory: {e}"),
                    }
                })?
            }
            Backing::Image(image) => {
                let image = Arc::clone(image);
                spawn_loader(move || match read_image(image.as_ref()) {
                    Ok(built) => *snapshot.write() = Some(Arc::new(built)),
                    Err(e) => error!("unable to load snapshot image: {e}"),
                })?
            }
        };
        if block {
            join_loader(handle);
        } else {
            *slot = Some(handle);
        }
        Ok(())
    }

    /// Write the current snapshot as a versioned, compressed image. The
    /// export serializes on the load lock, so it cannot interleave with an
    /// in-progress background build.
    pub fn export(&self, out: &mut dyn Write) -> Result<()> {
        let _load_guard = self.loader.lock();
        let snapshot = self.snapshot.read().clone().ok_or(LexError::NotLoaded)?;
        snapshot.write_image(out)?;
        info!("exported snapshot image");
        Ok(())
    }

    fn backing_store(&self) -> Result<&Arc<S>> {
        match &self.backing {
            Backing::Store(store) => Ok(store),
            Backing::Image(_) => Err(LexError::Closed),
        }
    }

    fn do_open(&self) -> Result<()> {
        self.cancel.store(false, Ordering::Relaxed);
        match &self.backing {
            Backing::Image(image) => {
                let built = read_image(image.as_ref())?;
                *self.snapshot.write() = Some(Arc::new(built));
                Ok(())
            }
            Backing::Store(store) => {
                store.open()?;
                match self.policy {
                    LoadPolicy::Immediate => self.load(true),
                    LoadPolicy::Background => self.load(false),
                    LoadPolicy::NoLoad => Ok(()),
                }
            }
        }
    }

    fn settled_state(&self) -> LifecycleState {
        let backing_open = match &self.backing {
            Backing::Store(store) => store.is_open(),
            Backing::Image(_) => false,
        };
        if self.is_loaded() || backing_open {
            LifecycleState::Open
        } else {
            LifecycleState::Closed
        }
    }
}

fn spawn_loader(work: impl FnOnce() + Send + 'static) -> Result<JoinHandle<()>> {
    Ok(thread::Builder::new()
        .name("lexstore-snapshot-loader".into())
        .spawn(work)?)
}

fn join_loader(handle: JoinHandle<()>) {
    if handle.join().is_err() {
        error!("snapshot loader thread panicked");
    }
}

fn read_image(image: &dyn ImageSource) -> Result<Snapshot> {
    Snapshot::read_image(image.open()?)
}

impl<S: LexicalStore + 'static> LexicalStore for MemoryStore<S> {
    fn open(&self) -> Result<()> {
        if let OpenGate::AlreadyOpen = self.lifecycle.begin_open() {
            return Ok(());
        }
        let result = self.do_open();
        self.lifecycle.settle(self.settled_state());
        result
    }

    fn is_open(&self) -> bool {
        self.lifecycle.current() == LifecycleState::Open
    }

    /// Interrupts and joins any running loader before tearing down, so no
    /// loader ever observes a closed backing store.
    fn close(&self) {
        if !self.lifecycle.begin_close() {
            return;
        }
        self.cancel.store(true, Ordering::Relaxed);
        if let Some(handle) = self.loader.lock().take() {
            join_loader(handle);
        }
        if let Backing::Store(store) = &self.backing {
            store.close();
        }
        *self.snapshot.write() = None;
        self.lifecycle.settle(LifecycleState::Closed);
    }

    fn version(&self) -> Result<Option<Version>> {
        if let Some(snapshot) = self.snapshot() {
            return Ok(snapshot.version().cloned());
        }
        self.backing_store()?.version()
    }

    fn entry(&self, id: &EntryId) -> Result<Option<Entry>> {
        if let Some(snapshot) = self.snapshot() {
            return Ok(snapshot.entry(id).map(|e| (**e).clone()));
        }
        self.backing_store()?.entry(id)
    }

    fn group(&self, id: GroupId) -> Result<Option<Group>> {
        if let Some(snapshot) = self.snapshot() {
            return Ok(snapshot.group(id).map(|g| (**g).clone()));
        }
        self.backing_store()?.group(id)
    }

    fn member(&self, key: &SenseKey) -> Result<Option<Member>> {
        if let Some(snapshot) = self.snapshot() {
            return Ok(snapshot.member(key).cloned());
        }
        self.backing_store()?.member(key)
    }

    fn sense_entry(&self, key: &SenseKey) -> Result<Option<SenseEntry>> {
        if let Some(snapshot) = self.snapshot() {
            return Ok(snapshot.sense_entry(key).cloned());
        }
        self.backing_store()?.sense_entry(key)
    }

    fn sense_entries(&self, key: &SenseKey) -> Result<Vec<SenseEntry>> {
        if let Some(snapshot) = self.snapshot() {
            return Ok(snapshot.sense_entry(key).cloned().into_iter().collect());
        }
        self.backing_store()?.sense_entries(key)
    }

    fn exception(&self, id: &ExceptionId) -> Result<Option<ExceptionEntry>> {
        if let Some(snapshot) = self.snapshot() {
            return Ok(snapshot.exception(id).map(|x| (**x).clone()));
        }
        self.backing_store()?.exception(id)
    }

    fn entries(&self, pos: PartOfSpeech) -> Result<Box<dyn Iterator<Item = Entry> + Send + '_>> {
        if let Some(snapshot) = self.snapshot() {
            return Ok(Box::new(
                hotswap::entries_of(&snapshot, Scope::Entries(pos)).into_iter(),
            ));
        }
        let disk = self.backing_store()?.entries(pos)?;
        Ok(Box::new(HotSwapIter::over_disk(
            &self.snapshot,
            Scope::Entries(pos),
            hotswap::entries_of,
            disk,
        )))
    }

    fn groups(&self, pos: PartOfSpeech) -> Result<Box<dyn Iterator<Item = Group> + Send + '_>> {
        if let Some(snapshot) = self.snapshot() {
            return Ok(Box::new(
                hotswap::groups_of(&snapshot, Scope::Groups(pos)).into_iter(),
            ));
        }
        let disk = self.backing_store()?.groups(pos)?;
        Ok(Box::new(HotSwapIter::over_disk(
            &self.snapshot,
            Scope::Groups(pos),
            hotswap::groups_of,
            disk,
        )))
    }

    fn exceptions(
        &self,
        pos: PartOfSpeech,
    ) -> Result<Box<dyn Iterator<Item = ExceptionEntry> + Send + '_>> {
        if let Some(snapshot) = self.snapshot() {
            return Ok(Box::new(
                hotswap::exceptions_of(&snapshot, Scope::Exceptions(pos)).into_iter(),
            ));
        }
        let disk = self.backing_store()?.exceptions(pos)?;
        Ok(Box::new(HotSwapIter::over_disk(
            &self.snapshot,
            Scope::Exceptions(pos),
            hotswap::exceptions_of,
            disk,
        )))
    }

    fn all_sense_entries(&self) -> Result<Box<dyn Iterator<Item = SenseEntry> + Send + '_>> {
        if let Some(snapshot) = self.snapshot() {
            return Ok(Box::new(
                hotswap::senses_of(&snapshot, Scope::Senses).into_iter(),
            ));
        }
        let disk = self.backing_store()?.all_sense_entries()?;
        Ok(Box::new(HotSwapIter::over_disk(
            &self.snapshot,
            Scope::Senses,
            hotswap::senses_of,
            disk,
        )))
    }
}

impl<S: LexicalStore + 'static> Drop for MemoryStore<S> {
    fn drop(&mut self) {
        self.close();
    }
}
