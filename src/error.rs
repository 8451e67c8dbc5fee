//! Failure modes for the clustering engine.
//!
//! Malformed input and resource failures are fatal: the algorithm cannot
//! produce a correct partial result once the schedule is broken, so every
//! variant here is meant to propagate all the way out of [`crate::cluster`]
//! rather than being absorbed locally. Search truncation (per-query hit
//! overflow) is the one recoverable condition in the source design and is
//! therefore *not* a variant here — it is reported as a warning and the
//! affected query simply contributes no pairs.

use thiserror::Error;

/// Errors that can terminate a clustering run.
#[derive(Debug, Error)]
pub enum ClusterError {
    /// A sequence contained a byte outside the DNA alphabet (ACGTN, case
    /// insensitive) or the padding space.
    #[error("invalid input byte {byte:#04x} in sequence {sequence:?}")]
    InvalidSequenceByte { sequence: String, byte: u8 },

    /// A sequence exceeded the configured maximum length.
    #[error("sequence length exceeds maximum of {max} bytes: {sequence:?}")]
    SequenceTooLong { sequence: String, max: usize },

    /// Paired FASTQ input files did not start with `@`.
    #[error("paired input is not a pair of FASTQ files")]
    NotPairedFastq,

    /// Paired FASTQ input files had a different number of records.
    #[error("non-conformable paired-end FASTQ files")]
    NonConformablePairedInput,

    /// The input stack was empty after parsing (clean non-zero exit).
    #[error("input contains no sequences")]
    EmptyInput,

    /// An internal invariant was violated (e.g. a length mismatch between
    /// a record and the common padded height). Surfaced instead of
    /// aborting, matching this rewrite's "propagate, don't abort" policy.
    #[error("internal invariant violated: {0}")]
    InvariantViolation(String),

    /// A worker thread could not be spawned.
    #[error("failed to spawn worker thread: {0}")]
    Threading(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, ClusterError>;
