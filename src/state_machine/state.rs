use std::fmt;

use serde::{Deserialize, Serialize};

use crate::matrix::KeyModelMatrix;

use super::item::Outcome;

/// The observable states of a captioning run.
///
/// A run loops READY → ATTEMPTING per attempt; quota failures pass through
/// ADVANCING back to READY (against a new pair) or end in EXHAUSTED; an
/// honored stop request passes through STOPPING to STOPPED.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RunState {
    Ready,
    Attempting,
    Advancing,
    Exhausted,
    Stopping,
    Stopped,
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunState::Ready => write!(f, "READY"),
            RunState::Attempting => write!(f, "ATTEMPTING"),
            RunState::Advancing => write!(f, "ADVANCING"),
            RunState::Exhausted => write!(f, "EXHAUSTED"),
            RunState::Stopping => write!(f, "STOPPING"),
            RunState::Stopped => write!(f, "STOPPED"),
        }
    }
}

/// Which axis the matrix advanced on for a retry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rotation {
    /// Next key, same model row.
    NextKey,
    /// The row ran out of keys; first key of the next model.
    NextModel,
}

/// What the scheduler does with the current item after one attempt.
#[derive(Debug, Clone, PartialEq)]
pub enum Transition {
    /// Write the caption and move to the next pending item.
    Complete(String),
    /// Drop the item with a reason and move on. The matrix stays put.
    Skip(String),
    /// Retry the same item against the pair the matrix advanced to.
    Retry(Rotation),
    /// No usable pair remains; the whole run halts.
    Exhausted,
}

/// Resolves one attempt outcome against the matrix.
///
/// Successes and ordinary failures never touch the matrix position. A quota
/// failure burns the current pair: the matrix advances to the next key, then
/// to the next model row, and reports exhaustion when neither exists.
pub fn resolve(outcome: Outcome, matrix: &mut KeyModelMatrix) -> Transition {
    match outcome {
        Outcome::Success(caption) => Transition::Complete(caption),
        Outcome::OtherError(reason) => Transition::Skip(reason),
        Outcome::QuotaExhausted => {
            if matrix.advance_credential() {
                Transition::Retry(Rotation::NextKey)
            } else if matrix.advance_model() {
                Transition::Retry(Rotation::NextModel)
            } else {
                Transition::Exhausted
            }
        }
    }
}
