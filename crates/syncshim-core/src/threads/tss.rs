//! Thread-specific storage.
//!
//! ## Design
//!
//! - **Key registry**: a process-wide table of at most `TSS_KEYS_MAX` slots.
//!   Each slot carries an in-use flag, an optional destructor and a
//!   generation counter bumped on every create, so a key that was deleted
//!   and whose slot was reused never matches again.
//!
//! - **Per-thread values**: a thread-local vector indexed by slot, each entry
//!   tagged with the generation it was stored under. Entries from an older
//!   generation read back as 0.
//!
//! - **Teardown**: shim threads call [`run_destructors`] on exit. Non-null
//!   values whose key has a destructor are passed to it, for up to
//!   `TSS_DTOR_ITERATIONS` passes while destructors keep storing values;
//!   anything stored after the last pass is discarded. Other threads get a
//!   single pass when their thread-local storage drops.

use std::cell::RefCell;
use std::sync::Arc;

use parking_lot::{RwLock, const_rwlock};

use crate::status::{SyncError, SyncResult};

/// Maximum live keys.
pub const TSS_KEYS_MAX: usize = 1024;

/// Maximum destructor passes on thread exit.
pub const TSS_DTOR_ITERATIONS: usize = 4;

/// Called with a thread's non-null value when it exits.
pub type TssDestructor = Arc<dyn Fn(usize) + Send + Sync>;

/// Key handle: slot index plus the generation it was created in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TssKey {
    index: u32,
    seq: u32,
}

impl TssKey {
    /// Packed form for integer handles. Never 0 for a created key.
    #[must_use]
    pub const fn to_raw(self) -> u64 {
        ((self.seq as u64) << 32) | self.index as u64
    }

    #[must_use]
    pub const fn from_raw(raw: u64) -> Self {
        Self {
            index: raw as u32,
            seq: (raw >> 32) as u32,
        }
    }
}

// ---------------------------------------------------------------------------
// Global key registry
// ---------------------------------------------------------------------------

struct KeySlot {
    in_use: bool,
    destructor: Option<TssDestructor>,
    seq: u32,
}

static KEYS: RwLock<Vec<KeySlot>> = const_rwlock(Vec::new());

fn next_seq(seq: u32) -> u32 {
    match seq.wrapping_add(1) {
        0 => 1,
        n => n,
    }
}

fn slot_matches(slots: &[KeySlot], key: TssKey) -> bool {
    slots
        .get(key.index as usize)
        .is_some_and(|slot| slot.in_use && slot.seq == key.seq)
}

/// Allocate a key. `NoMem` once `TSS_KEYS_MAX` keys are live.
pub fn create(destructor: Option<TssDestructor>) -> SyncResult<TssKey> {
    let mut slots = KEYS.write();
    if let Some((index, slot)) = slots.iter_mut().enumerate().find(|(_, s)| !s.in_use) {
        slot.in_use = true;
        slot.seq = next_seq(slot.seq);
        slot.destructor = destructor;
        return Ok(TssKey {
            index: index as u32,
            seq: slot.seq,
        });
    }
    if slots.len() >= TSS_KEYS_MAX {
        return Err(SyncError::NoMem);
    }
    slots.push(KeySlot {
        in_use: true,
        destructor,
        seq: 1,
    });
    Ok(TssKey {
        index: (slots.len() - 1) as u32,
        seq: 1,
    })
}

/// Release a key. Destructors do not run for values still stored under it.
pub fn delete(key: TssKey) -> SyncResult {
    let mut slots = KEYS.write();
    match slots.get_mut(key.index as usize) {
        Some(slot) if slot.in_use && slot.seq == key.seq => {
            slot.in_use = false;
            slot.destructor = None;
            Ok(())
        }
        _ => Err(SyncError::Error),
    }
}

#[must_use]
pub fn is_valid(key: TssKey) -> bool {
    slot_matches(&KEYS.read(), key)
}

/// Keys currently allocated.
#[must_use]
pub fn live_keys() -> usize {
    KEYS.read().iter().filter(|s| s.in_use).count()
}

fn destructor_for(key: TssKey) -> Option<TssDestructor> {
    let slots = KEYS.read();
    let slot = slots.get(key.index as usize)?;
    if slot.in_use && slot.seq == key.seq {
        slot.destructor.clone()
    } else {
        None
    }
}

// ---------------------------------------------------------------------------
// Per-thread values
// ---------------------------------------------------------------------------

#[derive(Default)]
struct ThreadValues {
    // (seq, value) per slot index
    entries: Vec<(u32, usize)>,
}

impl ThreadValues {
    fn get(&self, key: TssKey) -> usize {
        match self.entries.get(key.index as usize) {
            Some(&(seq, value)) if seq == key.seq => value,
            _ => 0,
        }
    }

    fn set(&mut self, key: TssKey, value: usize) {
        let index = key.index as usize;
        if index >= self.entries.len() {
            self.entries.resize(index + 1, (0, 0));
        }
        self.entries[index] = (key.seq, value);
    }

    /// Remove and return every non-null value.
    fn take_all(&mut self) -> Vec<(TssKey, usize)> {
        self.entries
            .iter_mut()
            .enumerate()
            .filter(|(_, entry)| entry.1 != 0)
            .map(|(index, entry)| {
                let (seq, value) = std::mem::take(entry);
                (
                    TssKey {
                        index: index as u32,
                        seq,
                    },
                    value,
                )
            })
            .collect()
    }
}

impl Drop for ThreadValues {
    fn drop(&mut self) {
        for (key, value) in self.take_all() {
            if let Some(dtor) = destructor_for(key) {
                dtor(value);
            }
        }
    }
}

thread_local! {
    static VALUES: RefCell<ThreadValues> = RefCell::new(ThreadValues::default());
}

/// The calling thread's value for `key`; 0 when unset or the key is invalid.
#[must_use]
pub fn get(key: TssKey) -> usize {
    if !is_valid(key) {
        return 0;
    }
    VALUES
        .try_with(|values| values.borrow().get(key))
        .unwrap_or(0)
}

/// Store `value` for the calling thread. `Error` for an invalid key.
pub fn set(key: TssKey, value: usize) -> SyncResult {
    if !is_valid(key) {
        return Err(SyncError::Error);
    }
    VALUES
        .try_with(|values| values.borrow_mut().set(key, value))
        .map_err(|_| SyncError::Error)
}

/// Run destructors for the calling thread's values.
///
/// Values are cleared before their destructor runs, so a destructor may
/// store a fresh value, which the next pass picks up.
pub fn run_destructors() {
    for _ in 0..TSS_DTOR_ITERATIONS {
        let pending = VALUES
            .try_with(|values| values.borrow_mut().take_all())
            .unwrap_or_default();
        let mut ran = false;
        for (key, value) in pending {
            if let Some(dtor) = destructor_for(key) {
                dtor(value);
                ran = true;
            }
        }
        if !ran {
            break;
        }
    }
    // Whatever the last pass stored is dropped unseen, so the thread-local
    // teardown has nothing left to destroy.
    let _ = VALUES.try_with(|values| values.borrow_mut().take_all());
}
