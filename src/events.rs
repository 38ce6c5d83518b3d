//! Events a run streams to whatever hosts it, plus the stop flag the host
//! uses to interrupt the run between items.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tokio::sync::mpsc;

/// Sending half of the run event stream.
pub type EventSender = mpsc::UnboundedSender<RunEvent>;
/// Receiving half of the run event stream.
pub type EventReceiver = mpsc::UnboundedReceiver<RunEvent>;

/// Creates the channel a run publishes its events on.
pub fn channel() -> (EventSender, EventReceiver) {
    mpsc::unbounded_channel()
}

/// Severity classes the presentation layer styles on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Info,
    Warning,
    Error,
    /// The run is over once this event arrives.
    Terminal,
}

/// Progress and log events emitted by a captioning run, in order.
#[derive(Debug, Clone, PartialEq)]
pub enum RunEvent {
    /// The run began with this much work and this matrix position.
    Started {
        pending: usize,
        already_captioned: usize,
        model: String,
        key_number: usize,
    },
    /// An image already has a caption and was excluded up front.
    AlreadyCaptioned { file: String },
    /// No image in the folder needs a caption.
    NothingToDo,
    /// An inference attempt began for an item.
    Attempting { file: String },
    /// A caption was written for an item.
    Completed { file: String },
    /// The item was dropped for a non-quota reason and will not be retried.
    Skipped { file: String, reason: String },
    /// The current (key, model) pair hit its quota.
    QuotaHit { key_number: usize, model: String },
    /// The matrix moved to the next key in the same model row.
    SwitchedKey { key_number: usize },
    /// The row ran out of keys; first key of the next model.
    SwitchedModel { model: String },
    /// Every key and model from the starting point is spent; the run halts.
    MatrixExhausted { completed: usize },
    /// A stop request was honored between items.
    Stopped { completed: usize },
    /// Every pending item was resolved.
    Finished { completed: usize, skipped: usize },
}

impl RunEvent {
    /// Severity class of the event, for hosts that style by class.
    #[allow(dead_code)]
    pub fn severity(&self) -> Severity {
        match self {
            RunEvent::Started { .. }
            | RunEvent::AlreadyCaptioned { .. }
            | RunEvent::Attempting { .. }
            | RunEvent::Completed { .. } => Severity::Info,
            RunEvent::NothingToDo
            | RunEvent::QuotaHit { .. }
            | RunEvent::SwitchedKey { .. }
            | RunEvent::SwitchedModel { .. } => Severity::Warning,
            RunEvent::Skipped { .. } => Severity::Error,
            RunEvent::MatrixExhausted { .. }
            | RunEvent::Stopped { .. }
            | RunEvent::Finished { .. } => Severity::Terminal,
        }
    }
}

impl fmt::Display for RunEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunEvent::Started {
                pending,
                already_captioned,
                model,
                key_number,
            } => write!(
                f,
                "captioning {pending} image(s) with {model} (key #{key_number}); \
                 {already_captioned} already done"
            ),
            RunEvent::AlreadyCaptioned { file } => {
                write!(f, "skipping '{file}' (caption exists)")
            }
            RunEvent::NothingToDo => write!(f, "no images to caption in this folder"),
            RunEvent::Attempting { file } => write!(f, "processing '{file}'"),
            RunEvent::Completed { file } => write!(f, "captioned '{file}'"),
            RunEvent::Skipped { file, reason } => write!(f, "error on '{file}': {reason}"),
            RunEvent::QuotaHit { key_number, model } => {
                write!(f, "limit hit on key #{key_number} ({model})")
            }
            RunEvent::SwitchedKey { key_number } => write!(f, "switching to key #{key_number}"),
            RunEvent::SwitchedModel { model } => {
                write!(f, "all keys exhausted; switching model to {model}")
            }
            RunEvent::MatrixExhausted { completed } => write!(
                f,
                "all keys and models exhausted; stopping after {completed} caption(s)"
            ),
            RunEvent::Stopped { completed } => {
                write!(f, "stop requested; {completed} caption(s) written")
            }
            RunEvent::Finished { completed, skipped } => {
                write!(f, "finished: {completed} captioned, {skipped} skipped")
            }
        }
    }
}

/// Flag the host sets to stop a run; the run polls it before each item.
#[derive(Debug, Clone, Default)]
pub struct StopFlag(Arc<AtomicBool>);

impl StopFlag {
    pub fn new() -> Self {
        Self::default()
    }

    /// Asks the run to stop before its next item.
    pub fn request(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    /// True once a stop has been requested.
    pub fn is_requested(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}
