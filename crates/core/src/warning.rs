//! Soft issues that are resolved with a documented default

use thiserror::Error;

/// A recoverable input problem.
///
/// These never abort a run: the caller applies the documented default,
/// reports the warning and carries on.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SoftWarning {
    #[error("unexpected flux output frequency/mode ({frequency}/{mode}), assuming hourly accumulated")]
    UnrecognizedFrequency { frequency: String, mode: String },

    #[error("unexpected flux depth units ({0}), assuming mm")]
    UnrecognizedDepthUnits(String),

    #[error("unknown area units ({0}), assuming square meters")]
    UnrecognizedAreaUnits(String),
}

impl SoftWarning {
    /// Report the warning through `tracing`
    pub fn emit(&self) {
        tracing::warn!("{}", self);
    }
}

/// Emit every warning in `warnings`
pub fn emit_all(warnings: &[SoftWarning]) {
    for w in warnings {
        w.emit();
    }
}
