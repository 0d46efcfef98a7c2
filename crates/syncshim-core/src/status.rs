//! Result codes shared by every synchronization operation.
//!
//! Every operation in this crate reports one of five outcomes. The Rust API
//! carries them as [`SyncResult`]; the ABI layer flattens them into the
//! numeric codes below, which callers switch on (0 is success, every failure
//! class is negative).

use thiserror::Error;

/// Operation completed.
pub const THRD_SUCCESS: i32 = 0;
/// Generic failure: invalid argument, misuse, or a platform call failing.
pub const THRD_ERROR: i32 = -1;
/// A non-blocking acquisition found the resource held.
pub const THRD_BUSY: i32 = -2;
/// A timed operation reached its deadline without acquiring.
pub const THRD_TIMEDOUT: i32 = -3;
/// The platform could not allocate a thread, key or primitive.
pub const THRD_NOMEM: i32 = -4;

/// Failure classes of the synchronization contract.
///
/// `Busy` and `TimedOut` are ordinary contended outcomes, not faults.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Error)]
pub enum SyncError {
    #[error("synchronization operation failed")]
    Error,
    #[error("resource is held by another owner")]
    Busy,
    #[error("deadline expired before the resource was acquired")]
    TimedOut,
    #[error("out of threads, keys or memory")]
    NoMem,
}

/// Result of a synchronization operation.
pub type SyncResult<T = ()> = Result<T, SyncError>;

impl SyncError {
    /// Numeric code for this failure class.
    #[must_use]
    pub const fn code(self) -> i32 {
        match self {
            Self::Error => THRD_ERROR,
            Self::Busy => THRD_BUSY,
            Self::TimedOut => THRD_TIMEDOUT,
            Self::NoMem => THRD_NOMEM,
        }
    }

    /// Decode a numeric result. Unknown non-zero codes fold into `Error`.
    pub const fn from_code(code: i32) -> SyncResult {
        match code {
            THRD_SUCCESS => Ok(()),
            THRD_BUSY => Err(Self::Busy),
            THRD_TIMEDOUT => Err(Self::TimedOut),
            THRD_NOMEM => Err(Self::NoMem),
            _ => Err(Self::Error),
        }
    }

    /// Short symbolic name, as used in logs and reports.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Error => "ERROR",
            Self::Busy => "BUSY",
            Self::TimedOut => "TIMEDOUT",
            Self::NoMem => "NOMEM",
        }
    }
}

/// Flatten a result into its numeric code, discarding any success value.
#[must_use]
pub fn result_code<T>(result: &SyncResult<T>) -> i32 {
    match result {
        Ok(_) => THRD_SUCCESS,
        Err(err) => err.code(),
    }
}

/// Symbolic name for a numeric code (`"SUCCESS"`, `"BUSY"`, ...).
#[must_use]
pub const fn code_name(code: i32) -> &'static str {
    match SyncError::from_code(code) {
        Ok(()) => "SUCCESS",
        Err(err) => err.name(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn code_values_are_fixed() {
        assert_eq!(THRD_SUCCESS, 0);
        assert_eq!(THRD_ERROR, -1);
        assert_eq!(THRD_BUSY, -2);
        assert_eq!(THRD_TIMEDOUT, -3);
        assert_eq!(THRD_NOMEM, -4);
    }

    #[test]
    fn every_error_maps_back_to_itself() {
        for err in [
            SyncError::Error,
            SyncError::Busy,
            SyncError::TimedOut,
            SyncError::NoMem,
        ] {
            assert_eq!(SyncError::from_code(err.code()), Err(err));
        }
        assert_eq!(SyncError::from_code(THRD_SUCCESS), Ok(()));
    }

    #[test]
    fn unknown_codes_fold_into_error() {
        assert_eq!(SyncError::from_code(7), Err(SyncError::Error));
        assert_eq!(SyncError::from_code(i32::MIN), Err(SyncError::Error));
    }

    #[test]
    fn result_code_ignores_success_payload() {
        let ok: SyncResult<u64> = Ok(99);
        assert_eq!(result_code(&ok), THRD_SUCCESS);
        let busy: SyncResult<u64> = Err(SyncError::Busy);
        assert_eq!(result_code(&busy), THRD_BUSY);
    }

    #[test]
    fn code_names() {
        assert_eq!(code_name(0), "SUCCESS");
        assert_eq!(code_name(-3), "TIMEDOUT");
        assert_eq!(code_name(42), "ERROR");
    }
}
