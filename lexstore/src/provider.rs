//! Resolves content categories to files and serves keyed lookups
//!
//! The provider scans one directory, matches each registered category to a
//! file (explicit regex override first, naming hints second), constructs a
//! data source per match, and exposes get-by-key and iterate-from-key over
//! them. Configuration is only accepted while closed.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::thread::{self, JoinHandle};

use parking_lot::{Mutex, RwLock};
use regex::Regex;
use tracing::{debug, error, info, warn};

use crate::compare::Comparator;
use crate::content::{ContentCategory, KeySpace};
use crate::error::{LexError, Result};
use crate::parse;
use crate::source::{DataSource, LineCursor, SearchStrategy};
use crate::types::{Charset, LoadPolicy, Version};

struct Config {
    root: PathBuf,
    policy: LoadPolicy,
    charset: Charset,
    comparators: HashMap<ContentCategory, Comparator>,
    matchers: HashMap<ContentCategory, Regex>,
}

struct ProviderState {
    sources: HashMap<ContentCategory, Arc<DataSource>>,
    version: Option<Version>,
}

/// Matches content categories to the files of one database directory.
pub struct ContentProvider {
    config: Mutex<Config>,
    state: RwLock<Option<ProviderState>>,
    loader: Mutex<Option<JoinHandle<()>>>,
    cancel: Arc<AtomicBool>,
    direct_fallbacks: AtomicUsize,
}

impl ContentProvider {
    /// Provider over `root` with the default no-load policy.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self::with_policy(root, LoadPolicy::NoLoad)
    }

    pub fn with_policy(root: impl Into<PathBuf>, policy: LoadPolicy) -> Self {
        Self {
            config: Mutex::new(Config {
                root: root.into(),
                policy,
                charset: Charset::default(),
                comparators: HashMap::new(),
                matchers: HashMap::new(),
            }),
            state: RwLock::new(None),
            loader: Mutex::new(None),
            cancel: Arc::new(AtomicBool::new(false)),
            direct_fallbacks: AtomicUsize::new(0),
        }
    }

    /// Point the provider at a different directory. Rejected while open.
    pub fn set_root(&self, root: impl Into<PathBuf>) -> Result<()> {
        self.reconfigure("root directory")?;
        self.config.lock().root = root.into();
        Ok(())
    }

    pub fn root(&self) -> PathBuf {
        self.config.lock().root.clone()
    }

    /// The load policy may change at any time; it applies at the next open.
    pub fn set_load_policy(&self, policy: LoadPolicy) {
        self.config.lock().policy = policy;
    }

    pub fn load_policy(&self) -> LoadPolicy {
        self.config.lock().policy
    }

    /// Override the comparator for one category, or reset it with `None`.
    /// Rejected while open.
    pub fn set_comparator(
        &self,
        category: ContentCategory,
        comparator: Option<Comparator>,
    ) -> Result<()> {
        self.reconfigure("comparator")?;
        let mut config = self.config.lock();
        match comparator {
            Some(comparator) => config.comparators.insert(category, comparator),
            None => config.comparators.remove(&category),
        };
        Ok(())
    }

    /// Override file selection for one category with a file-name regex, or
    /// reset it with `None`. Rejected while open.
    pub fn set_matcher(&self, category: ContentCategory, pattern: Option<Regex>) -> Result<()> {
        self.reconfigure("file matcher")?;
        let mut config = self.config.lock();
        match pattern {
            Some(pattern) => config.matchers.insert(category, pattern),
            None => config.matchers.remove(&category),
        };
        Ok(())
    }

    /// Override the character set for every source. Rejected while open.
    pub fn set_charset(&self, charset: Option<Charset>) -> Result<()> {
        self.reconfigure("charset")?;
        self.config.lock().charset = charset.unwrap_or_default();
        Ok(())
    }

    fn reconfigure(&self, what: &'static str) -> Result<()> {
        if self.is_open() {
            return Err(LexError::AlreadyOpen(what));
        }
        Ok(())
    }

    /// Scan the root directory and resolve every category it can back.
    /// Fails if the directory is unreadable or no category resolves,
    /// leaving the provider closed. Idempotent while open.
    pub fn open(&self) -> Result<()> {
        let policy = {
            if self.is_open() {
                return Ok(());
            }
            let config = self.config.lock();
            if self.is_open() {
                return Ok(());
            }

            let mut files = Vec::new();
            for dir_entry in std::fs::read_dir(&config.root)? {
                let dir_entry = dir_entry?;
                if dir_entry.file_type()?.is_file() {
                    files.push(dir_entry.path());
                }
            }
            if files.is_empty() {
                return Err(LexError::NoContentFound(config.root.clone()));
            }
            files.sort_by_key(|p| p.file_name().map(std::ffi::OsStr::to_owned));
            info!(
                "scanning {} files in {:?} for content categories",
                files.len(),
                config.root
            );

            let sources = self.resolve_sources(&config, files)?;
            if sources.is_empty() {
                return Err(LexError::NoContentFound(config.root.clone()));
            }
            let version = version_consensus(sources.values());
            info!(
                "resolved {} categories (version {})",
                sources.len(),
                version
                    .as_ref()
                    .map_or_else(|| "unknown".to_owned(), |v| v.to_string()),
            );

            self.cancel.store(false, Ordering::Relaxed);
            *self.state.write() = Some(ProviderState { sources, version });
            config.policy
        };

        match policy {
            LoadPolicy::Immediate => self.load(true)?,
            LoadPolicy::Background => self.load(false)?,
            LoadPolicy::NoLoad => {}
        }
        Ok(())
    }

    fn resolve_sources(
        &self,
        config: &Config,
        mut pool: Vec<PathBuf>,
    ) -> Result<HashMap<ContentCategory, Arc<DataSource>>> {
        let mut sources = HashMap::new();
        for category in ContentCategory::ALL {
            let position = config
                .matchers
                .get(&category)
                .and_then(|re| pool.iter().position(|p| name_matches(re, p)))
                .or_else(|| {
                    pool.iter()
                        .position(|p| category.matches_name(&lower_name(p)))
                });
            let Some(position) = position else { continue };

            // two categories may share one file; only the allow-listed
            // pair leaves its file in the pool
            let path = if category.shares_file() {
                pool[position].clone()
            } else {
                pool.remove(position)
            };

            let comparator = config
                .comparators
                .get(&category)
                .copied()
                .unwrap_or_else(|| category.default_comparator());
            let source = self.build_source(&path, category, comparator, config.charset)?;
            debug!("{category} backed by {:?}", path.file_name());
            sources.insert(category, Arc::new(source));
        }
        Ok(sources)
    }

    /// Offset-keyed categories get direct access, verified by reading the
    /// first record and looking its own key back up. A failed round-trip
    /// downgrades the source to binary search.
    fn build_source(
        &self,
        path: &Path,
        category: ContentCategory,
        comparator: Comparator,
        charset: Charset,
    ) -> Result<DataSource> {
        if category.key_space() == KeySpace::ByteOffset {
            let source =
                DataSource::open(path, category, SearchStrategy::DirectOffset, charset)?;
            let Some(first) = source.first_record() else {
                return Ok(source);
            };
            if let Ok(offset) = parse::group_offset(&first) {
                if source.line(&format!("{offset:08}")).is_some() {
                    return Ok(source);
                }
            }
            warn!(
                "direct access failed its self-test in {:?}; check line endings; \
                 falling back to binary search",
                path.file_name()
            );
            self.direct_fallbacks.fetch_add(1, Ordering::Relaxed);
        }
        DataSource::open(
            path,
            category,
            SearchStrategy::BinarySearch(comparator),
            charset,
        )
    }

    pub fn is_open(&self) -> bool {
        self.state.read().is_some()
    }

    /// Cancels any running loader, joins it, and drops all sources.
    /// Idempotent.
    pub fn close(&self) {
        self.cancel.store(true, Ordering::Relaxed);
        if let Some(handle) = self.loader.lock().take() {
            let _ = handle.join();
        }
        *self.state.write() = None;
    }

    /// Make every source memory-resident, either blocking or on a single
    /// background thread.
    pub fn load(&self, block: bool) -> Result<()> {
        let sources: Vec<Arc<DataSource>> = {
            let state = self.state.read();
            let state = state.as_ref().ok_or(LexError::Closed)?;
            state.sources.values().cloned().collect()
        };

        let mut slot = self.loader.lock();
        if let Some(handle) = slot.take() {
            if !handle.is_finished() && !block {
                *slot = Some(handle);
                return Ok(());
            }
            if handle.join().is_err() {
                error!("source loader thread panicked");
            }
        }
        if sources.iter().all(|s| s.is_resident()) {
            return Ok(());
        }

        let cancel = Arc::clone(&self.cancel);
        let handle = thread::Builder::new()
            .name("lexstore-source-loader".into())
            .spawn(move || {
                for source in sources {
                    if cancel.load(Ordering::Relaxed) {
                        debug!("source loading cancelled");
                        return;
                    }
                    source.make_resident();
                    debug!("loaded {} into memory", source.category());
                }
            })?;
        if block {
            if handle.join().is_err() {
                error!("source loader thread panicked");
            }
        } else {
            *slot = Some(handle);
        }
        Ok(())
    }

    /// Whether every resolved source is memory-resident.
    pub fn is_loaded(&self) -> Result<bool> {
        let state = self.state.read();
        let state = state.as_ref().ok_or(LexError::Closed)?;
        Ok(state.sources.values().all(|s| s.is_resident()))
    }

    /// The consensus version across all sources reporting one, or `None`
    /// when sources disagree or none reports.
    pub fn version(&self) -> Result<Option<Version>> {
        let state = self.state.read();
        let state = state.as_ref().ok_or(LexError::Closed)?;
        Ok(state.version.clone())
    }

    /// The source backing `category`, or `None` if the category did not
    /// resolve to a file.
    pub fn source(&self, category: ContentCategory) -> Result<Option<Arc<DataSource>>> {
        let state = self.state.read();
        let state = state.as_ref().ok_or(LexError::Closed)?;
        Ok(state.sources.get(&category).cloned())
    }

    /// The categories that resolved at open.
    pub fn categories(&self) -> Result<Vec<ContentCategory>> {
        let state = self.state.read();
        let state = state.as_ref().ok_or(LexError::Closed)?;
        Ok(state.sources.keys().copied().collect())
    }

    /// Get the line for `key` in `category`'s source. Absent keys and
    /// unresolved categories are `None`.
    pub fn line(&self, category: ContentCategory, key: &str) -> Result<Option<String>> {
        Ok(self.source(category)?.and_then(|s| s.line(key)))
    }

    /// A cursor over `category`'s lines in file order, starting at
    /// `start_key` when given. `None` when the category did not resolve.
    pub fn lines(
        &self,
        category: ContentCategory,
        start_key: Option<&str>,
    ) -> Result<Option<LineCursor>> {
        Ok(self.source(category)?.map(|s| s.cursor(start_key)))
    }

    /// How many direct-access sources were downgraded to binary search by
    /// the open-time self-test.
    pub fn direct_access_fallbacks(&self) -> usize {
        self.direct_fallbacks.load(Ordering::Relaxed)
    }
}

impl Drop for ContentProvider {
    fn drop(&mut self) {
        self.close();
    }
}

fn lower_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().to_lowercase())
        .unwrap_or_default()
}

fn name_matches(re: &Regex, path: &Path) -> bool {
    path.file_name()
        .is_some_and(|n| re.is_match(&n.to_string_lossy()))
}

fn version_consensus<'a>(
    sources: impl Iterator<Item = &'a Arc<DataSource>>,
) -> Option<Version> {
    let mut consensus: Option<Version> = None;
    for source in sources {
        let Some(version) = source.version() else {
            continue;
        };
        match &consensus {
            None => consensus = Some(version.clone()),
            Some(current) if current == version => {}
            Some(_) => return None,
        }
    }
    consensus
}
