// All extern "C" exports accept raw pointers from C callers and validate them
// at entry, so per-function safety docs would be redundant boilerplate.
#![allow(clippy::missing_safety_doc)]
// C11 spellings: `mtx_t`, `mtx_plain`, `once_flag`, ...
#![allow(non_camel_case_types, non_upper_case_globals)]
//! # syncshim-abi
//!
//! `extern "C"` boundary for syncshim.
//!
//! This crate produces a `cdylib` exposing a `<threads.h>`-shaped surface
//! under a `shim_` prefix so it can be linked next to a libc that ships its
//! own C11 threads. Every entry point validates its pointers first and
//! answers with one of the five result codes; nothing here panics across the
//! boundary. Waiting on one `cnd_t` with two different mutexes at once is
//! answered with `THRD_ERROR` for the later waiter.
//!
//! # Architecture
//!
//! ```text
//! C caller -> ABI entry (this crate) -> null/range checks -> syncshim-core -> result code
//! ```
//!
//! Primitives are heap objects behind pointer-sized handles (`mtx_t`,
//! `cnd_t`, `rwl_t`). Destroy frees the object and nulls the handle, so a
//! second destroy, or any use after it, reports `THRD_ERROR`.

#[macro_use]
mod macros;

pub mod cnd_abi;
pub mod counters;
pub mod mtx_abi;
pub mod once_abi;
pub mod rwl_abi;
pub mod thrd_abi;
pub mod time_abi;
pub mod tss_abi;
pub mod types;
mod util;

pub use types::*;
