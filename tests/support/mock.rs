//! Single-process, fully in-memory collaborator implementations sufficient
//! to drive the end-to-end scenarios in `tests/scenarios.rs`. Modeled after
//! the crate's own inline `#[cfg(test)]` fakes (see `ln_migrator.rs`,
//! `in_migrator.rs`, `classifier.rs`), generalized into a shared, mutable
//! tree so that a whole `Orchestrator::do_clean` run can be exercised rather
//! than one collaborator call at a time.
//!
//! Every Mock* type wraps its state behind an `Arc`, so it is cheaply
//! `Clone`: a test builds one, clones a handle to keep for assertions, and
//! hands the original (or another clone) to `Orchestrator::new`, which takes
//! ownership of the whole `Collaborators` bundle.

use std::collections::{HashMap, HashSet};
use std::io;
use std::path::PathBuf;
use std::sync::Arc;

use parking_lot::Mutex;

use logdb_cleaner::collaborators::btree::{BinParent, InParent, ParentLookup, RootNode};
use logdb_cleaner::collaborators::checkpointer::Provisional;
use logdb_cleaner::collaborators::extinction_filter::NeverExtinct;
use logdb_cleaner::collaborators::log_manager::{LogEntryToWrite, ReplicationHint};
use logdb_cleaner::{
    BinDeltaPayload, Btree, CacheMode, Checkpointer, Collaborators, DbDirectory, DbHandle,
    DbMetadata, ExpirationProfileSink, FileManager, FileNumber, InPayload, LnPayload,
    LockManager, LockRequestOutcome, LogManager, Lsn, LogReaderError, PayloadCodec,
};
use logdb_cleaner::expiration_tracker::ExpirationTracker;

use super::wire;

// ---------------------------------------------------------------------
// FileManager / LogManager
// ---------------------------------------------------------------------

struct FileManagerInner {
    files: Mutex<HashMap<FileNumber, Vec<u8>>>,
    tail_file: Mutex<FileNumber>,
}

#[derive(Clone)]
pub struct MockFileManager {
    inner: Arc<FileManagerInner>,
}

impl MockFileManager {
    pub fn new(tail_file: FileNumber) -> Self {
        MockFileManager {
            inner: Arc::new(FileManagerInner {
                files: Mutex::new(HashMap::new()),
                tail_file: Mutex::new(tail_file),
            }),
        }
    }

    pub fn insert_file(&self, file: FileNumber, bytes: Vec<u8>) {
        self.inner.files.lock().insert(file, bytes);
    }

    /// Simulates an external process deleting a file out from under the
    /// cleaner, without going through the normal `delete_file` path.
    pub fn vanish_file(&self, file: FileNumber) {
        self.inner.files.lock().remove(&file);
    }

    pub fn set_tail_file(&self, file: FileNumber) {
        *self.inner.tail_file.lock() = file;
    }

    pub fn tail_file(&self) -> FileNumber {
        *self.inner.tail_file.lock()
    }

    pub fn contains(&self, file: FileNumber) -> bool {
        self.inner.files.lock().contains_key(&file)
    }
}

impl FileManager for MockFileManager {
    fn next_lsn(&self) -> Lsn {
        let tail = self.tail_file();
        let len = self.inner.files.lock().get(&tail).map(Vec::len).unwrap_or(0) as u32;
        Lsn::new(tail, len)
    }

    fn all_file_numbers(&self) -> Vec<FileNumber> {
        let mut files: Vec<_> = self.inner.files.lock().keys().copied().collect();
        files.sort_unstable();
        files
    }

    fn full_file_name(&self, file: FileNumber) -> PathBuf {
        PathBuf::from(format!("{file:08x}.log"))
    }

    fn is_file_valid(&self, file: FileNumber) -> bool {
        self.inner.files.lock().contains_key(&file)
    }

    fn read_file(&self, file: FileNumber) -> io::Result<Vec<u8>> {
        self.inner
            .files
            .lock()
            .get(&file)
            .cloned()
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, "mock file not present"))
    }

    fn delete_file(&self, file: FileNumber) -> io::Result<()> {
        self.inner.files.lock().remove(&file);
        Ok(())
    }
}

/// Appends migrated LNs to the shared tail file so a migrated record's new
/// LSN genuinely points somewhere readable, matching spec §8 S2's
/// expectation that migrated slots "point into the tail file".
#[derive(Clone)]
pub struct MockLogManager {
    file_manager: MockFileManager,
}

impl MockLogManager {
    pub fn new(file_manager: MockFileManager) -> Self {
        MockLogManager { file_manager }
    }
}

impl LogManager for MockLogManager {
    fn log(
        &self,
        _entry: LogEntryToWrite,
        _hint: ReplicationHint,
    ) -> Result<Lsn, logdb_cleaner::CleanerError> {
        let tail = self.file_manager.tail_file();
        let mut files = self.file_manager.inner.files.lock();
        let buf = files.entry(tail).or_default();
        let offset = buf.len() as u32;
        buf.extend_from_slice(b"migrated-entry");
        Ok(Lsn::new(tail, offset))
    }

    fn flush_sync(&self) -> Result<(), logdb_cleaner::CleanerError> {
        Ok(())
    }

    fn flush_no_sync(&self) -> Result<(), logdb_cleaner::CleanerError> {
        Ok(())
    }
}

// ---------------------------------------------------------------------
// Btree
// ---------------------------------------------------------------------

#[derive(Clone)]
pub struct LnSlot {
    pub lsn: Lsn,
    pub known_deleted: bool,
    pub size: u32,
}

#[derive(Default)]
struct TreeState {
    bins: HashMap<u32, HashMap<Vec<u8>, LnSlot>>,
}

#[derive(Clone)]
pub struct MockBtree {
    tree: Arc<Mutex<TreeState>>,
}

impl MockBtree {
    pub fn new() -> Self {
        MockBtree {
            tree: Arc::new(Mutex::new(TreeState::default())),
        }
    }

    pub fn insert_slot(&self, db_id: u32, key: Vec<u8>, lsn: Lsn, size: u32) {
        self.tree
            .lock()
            .bins
            .entry(db_id)
            .or_default()
            .insert(key, LnSlot { lsn, known_deleted: false, size });
    }

    pub fn slot_lsn(&self, db_id: u32, key: &[u8]) -> Option<Lsn> {
        self.tree
            .lock()
            .bins
            .get(&db_id)
            .and_then(|db| db.get(key))
            .map(|slot| slot.lsn)
    }
}

impl Default for MockBtree {
    fn default() -> Self {
        Self::new()
    }
}

pub struct MockBinParent {
    tree: Arc<Mutex<TreeState>>,
    db_id: u32,
    keys: Vec<Vec<u8>>,
}

impl BinParent for MockBinParent {
    fn db_id(&self) -> u32 {
        self.db_id
    }

    fn fetched_cold(&self) -> bool {
        false
    }

    fn find_slot(&self, key: &[u8]) -> Option<usize> {
        self.keys.iter().position(|k| k == key)
    }

    fn slot_count(&self) -> usize {
        self.keys.len()
    }

    fn slot_known_deleted(&self, index: usize) -> bool {
        let tree = self.tree.lock();
        tree.bins
            .get(&self.db_id)
            .and_then(|db| db.get(&self.keys[index]))
            .is_none_or(|slot| slot.known_deleted)
    }

    fn slot_lsn(&self, index: usize) -> Lsn {
        let tree = self.tree.lock();
        tree.bins
            .get(&self.db_id)
            .and_then(|db| db.get(&self.keys[index]))
            .map(|slot| slot.lsn)
            .unwrap_or(logdb_cleaner::NULL_LSN)
    }

    fn slot_size(&self, index: usize) -> u32 {
        let tree = self.tree.lock();
        tree.bins
            .get(&self.db_id)
            .and_then(|db| db.get(&self.keys[index]))
            .map(|slot| slot.size)
            .unwrap_or(0)
    }

    fn has_resident_child(&self, _index: usize) -> bool {
        true
    }

    fn attach_from_log(&mut self, _index: usize, _payload: LnPayload) {}

    fn migrate_slot(&mut self, index: usize, new_lsn: Lsn, new_size: u32) {
        let mut tree = self.tree.lock();
        if let Some(slot) = tree
            .bins
            .get_mut(&self.db_id)
            .and_then(|db| db.get_mut(&self.keys[index]))
        {
            slot.lsn = new_lsn;
            slot.size = new_size;
        }
    }

    fn evict_slot(&mut self, _index: usize) {}
}

/// Internal-node migration is not exercised by the LN-focused scenarios this
/// support module drives; this stub always reports "no parent found", the
/// same terminal shape as the crate's own `FakeInParent`/`FakeRoot` test
/// doubles.
pub struct MockInParent;

impl InParent for MockInParent {
    fn slot_count(&self) -> usize {
        0
    }
    fn find_slot_by_node_id(&self, _node_id: u64) -> Option<usize> {
        None
    }
    fn slot_lsn(&self, _index: usize) -> Lsn {
        logdb_cleaner::NULL_LSN
    }
    fn child_is_delta(&self, _index: usize) -> bool {
        false
    }
    fn has_resident_child(&self, _index: usize) -> bool {
        false
    }
    fn attach_delta_from_log(&mut self, _index: usize, _payload: BinDeltaPayload, _lsn: Lsn) {}
    fn mutate_child_to_full(&mut self, _index: usize, _payload: InPayload, _lsn: Lsn) {}
    fn mark_child_dirty(&mut self, _index: usize) {}
    fn prohibit_next_delta(&mut self, _index: usize) {}
    fn fetch_child_last_full_lsn(&self, _index: usize) -> Lsn {
        logdb_cleaner::NULL_LSN
    }
}

pub struct MockRoot;

impl RootNode for MockRoot {
    fn node_id(&self) -> u64 {
        0
    }
    fn lsn(&self) -> Lsn {
        logdb_cleaner::NULL_LSN
    }
    fn mark_dirty(&mut self) {}
    fn prohibit_next_delta(&mut self) {}
}

impl Btree for MockBtree {
    type BinParent = MockBinParent;
    type InParent = MockInParent;
    type Root = MockRoot;

    fn get_parent_bin_for_child_ln(
        &self,
        db_id: u32,
        _key: &[u8],
        _cache_mode: CacheMode,
    ) -> ParentLookup<Self::BinParent> {
        let tree = self.tree.lock();
        match tree.bins.get(&db_id) {
            Some(db) => ParentLookup::found(MockBinParent {
                tree: Arc::clone(&self.tree),
                db_id,
                keys: db.keys().cloned().collect(),
            }),
            None => ParentLookup::not_found(),
        }
    }

    fn get_parent_in_for_child_in(
        &self,
        _db_id: u32,
        _node_id: u64,
        _level: u16,
        _use_target_level: bool,
        _do_fetch: bool,
        _cache_mode: CacheMode,
    ) -> ParentLookup<Self::InParent> {
        ParentLookup::not_found()
    }

    fn with_root_latched<R>(&self, _db_id: u32, _f: impl FnOnce(&mut Self::Root) -> R) -> Option<R> {
        None
    }

    fn transfer_lockers(&self, _old_lsn: Lsn, _new_lsn: Lsn) {}
}

// ---------------------------------------------------------------------
// LockManager
// ---------------------------------------------------------------------

#[derive(Clone)]
pub struct MockLockManager {
    denied: Arc<Mutex<HashSet<Lsn>>>,
}

impl MockLockManager {
    pub fn new() -> Self {
        MockLockManager {
            denied: Arc::new(Mutex::new(HashSet::new())),
        }
    }

    pub fn deny(&self, lsn: Lsn) {
        self.denied.lock().insert(lsn);
    }

    pub fn allow(&self, lsn: Lsn) {
        self.denied.lock().remove(&lsn);
    }
}

impl Default for MockLockManager {
    fn default() -> Self {
        Self::new()
    }
}

impl LockManager for MockLockManager {
    fn is_lock_uncontended(&self, lsn: Lsn) -> bool {
        !self.denied.lock().contains(&lsn)
    }

    fn non_blocking_lock(&self, lsn: Lsn, _db_id: u32, _jump_ahead_of_waiters: bool) -> LockRequestOutcome {
        if self.denied.lock().contains(&lsn) {
            LockRequestOutcome::Denied
        } else {
            LockRequestOutcome::Granted
        }
    }

    fn release(&self, _lsn: Lsn) {}
}

// ---------------------------------------------------------------------
// Checkpointer
// ---------------------------------------------------------------------

#[derive(Clone, Copy, Default)]
pub struct MockCheckpointer;

impl Checkpointer for MockCheckpointer {
    fn wakeup_after_no_writes(&self) {}

    fn coordinate_eviction_with_checkpoint(&self, _db_id: u32, _target_level: u16, _parent_node_id: u64) -> Provisional {
        Provisional::No
    }
}

// ---------------------------------------------------------------------
// DbDirectory
// ---------------------------------------------------------------------

struct DbHandleState {
    meta: DbMetadata,
    deleting: Mutex<bool>,
    deleted: Mutex<bool>,
}

pub struct MockDbHandle {
    state: Arc<DbHandleState>,
}

impl DbHandle for MockDbHandle {
    fn metadata(&self) -> &DbMetadata {
        &self.state.meta
    }
    fn generation(&self) -> u64 {
        0
    }
    fn is_deleting(&self) -> bool {
        *self.state.deleting.lock()
    }
    fn is_deleted(&self) -> bool {
        *self.state.deleted.lock()
    }
}

#[derive(Clone)]
pub struct MockDbDirectory {
    dbs: Arc<Mutex<HashMap<u32, Arc<DbHandleState>>>>,
}

impl MockDbDirectory {
    pub fn new() -> Self {
        MockDbDirectory {
            dbs: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    pub fn register(&self, db_id: u32, name: &str, lns_immediately_obsolete: bool) {
        self.dbs.lock().insert(
            db_id,
            Arc::new(DbHandleState {
                meta: DbMetadata {
                    db_id,
                    name: name.to_string(),
                    has_duplicates: false,
                    is_internal: false,
                    lns_immediately_obsolete,
                },
                deleting: Mutex::new(false),
                deleted: Mutex::new(false),
            }),
        );
    }

    pub fn mark_deleting(&self, db_id: u32) {
        if let Some(state) = self.dbs.lock().get(&db_id) {
            *state.deleting.lock() = true;
        }
    }

    pub fn mark_deleted(&self, db_id: u32) {
        if let Some(state) = self.dbs.lock().get(&db_id) {
            *state.deleted.lock() = true;
        }
    }
}

impl Default for MockDbDirectory {
    fn default() -> Self {
        Self::new()
    }
}

impl DbDirectory for MockDbDirectory {
    fn get_db(&self, db_id: u32) -> Option<Arc<dyn DbHandle>> {
        self.dbs
            .lock()
            .get(&db_id)
            .cloned()
            .map(|state| Arc::new(MockDbHandle { state }) as Arc<dyn DbHandle>)
    }
}

// ---------------------------------------------------------------------
// ExpirationProfileSink
// ---------------------------------------------------------------------

#[derive(Clone)]
pub struct MockExpirationProfile {
    expired: Arc<Mutex<HashMap<FileNumber, u64>>>,
}

impl MockExpirationProfile {
    pub fn new() -> Self {
        MockExpirationProfile {
            expired: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Seeds a raw expired-bytes value for `file`, simulating a prior
    /// merge's estimate without running a real scan.
    pub fn set_expired(&self, file: FileNumber, bytes: u64) {
        self.expired.lock().insert(file, bytes);
    }

    pub fn get_expired(&self, file: FileNumber) -> Option<u64> {
        self.expired.lock().get(&file).copied()
    }
}

impl Default for MockExpirationProfile {
    fn default() -> Self {
        Self::new()
    }
}

impl ExpirationProfileSink for MockExpirationProfile {
    fn put_file(&self, file: FileNumber, tracker: ExpirationTracker) {
        self.expired.lock().insert(file, tracker.total_tracked_bytes());
    }

    fn remove_file(&self, file: FileNumber) {
        self.expired.lock().remove(&file);
    }

    fn expired_bytes(&self, file: FileNumber) -> Option<u64> {
        self.expired.lock().get(&file).copied()
    }
}

// ---------------------------------------------------------------------
// PayloadCodec
// ---------------------------------------------------------------------

#[derive(Clone, Copy, Default)]
pub struct MockCodec;

impl PayloadCodec for MockCodec {
    fn decode_ln(&self, payload: &[u8]) -> Result<LnPayload, LogReaderError> {
        Ok(wire::decode_ln(payload))
    }
    fn decode_in(&self, payload: &[u8]) -> Result<InPayload, LogReaderError> {
        Ok(wire::decode_in(payload))
    }
    fn decode_bin_delta(&self, payload: &[u8]) -> Result<BinDeltaPayload, LogReaderError> {
        Ok(wire::decode_bin_delta(payload))
    }
}

// ---------------------------------------------------------------------
// Collaborators bundle
// ---------------------------------------------------------------------

#[derive(Clone)]
pub struct MockCollaborators {
    pub file_manager: MockFileManager,
    pub log_manager: MockLogManager,
    pub btree: MockBtree,
    pub lock_manager: MockLockManager,
    pub checkpointer: MockCheckpointer,
    pub extinction_filter: Arc<NeverExtinct>,
    pub db_directory: MockDbDirectory,
    pub expiration_profile: MockExpirationProfile,
}

impl MockCollaborators {
    pub fn new(tail_file: FileNumber) -> Self {
        let file_manager = MockFileManager::new(tail_file);
        let log_manager = MockLogManager::new(file_manager.clone());
        MockCollaborators {
            file_manager,
            log_manager,
            btree: MockBtree::new(),
            lock_manager: MockLockManager::new(),
            checkpointer: MockCheckpointer,
            extinction_filter: Arc::new(NeverExtinct),
            db_directory: MockDbDirectory::new(),
            expiration_profile: MockExpirationProfile::new(),
        }
    }
}

impl Collaborators for MockCollaborators {
    type FileManager = MockFileManager;
    type LogManager = MockLogManager;
    type Btree = MockBtree;
    type LockManager = MockLockManager;
    type Checkpointer = MockCheckpointer;
    type ExtinctionFilter = NeverExtinct;
    type DbDirectory = MockDbDirectory;
    type ExpirationProfile = MockExpirationProfile;

    fn file_manager(&self) -> &Self::FileManager {
        &self.file_manager
    }
    fn log_manager(&self) -> &Self::LogManager {
        &self.log_manager
    }
    fn btree(&self) -> &Self::Btree {
        &self.btree
    }
    fn lock_manager(&self) -> &Self::LockManager {
        &self.lock_manager
    }
    fn checkpointer(&self) -> &Self::Checkpointer {
        &self.checkpointer
    }
    fn extinction_filter(&self) -> &Self::ExtinctionFilter {
        &self.extinction_filter
    }
    fn db_directory(&self) -> &Self::DbDirectory {
        &self.db_directory
    }
    fn expiration_profile(&self) -> &Self::ExpirationProfile {
        &self.expiration_profile
    }
}
