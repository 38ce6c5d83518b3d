use std::time::Duration;

use chrono::Utc;
use tokio::time::sleep;
use uuid::Uuid;

use crate::config::ApiKey;
use crate::events::{EventSender, RunEvent, StopFlag};
use crate::gemini::{CaptionRequest, CaptionSender, GeminiError, ImageData};
use crate::matrix::KeyModelMatrix;
use crate::sink;
use crate::source::FolderScan;
use crate::state_machine::{
    Outcome, Rotation, RunReport, RunState, Termination, Transition, resolve,
};

/// Instructions and pacing for a run, fixed at start.
#[derive(Debug, Clone)]
pub struct RunSettings {
    /// Task instruction sent with every image.
    pub prompt: String,
    /// Optional system instruction (persona/context).
    pub system_instruction: Option<String>,
    /// Pause after a key or model switch, letting rate-limit windows reset.
    pub cooldown: Duration,
}

/// Drives pending items against the key/model matrix: rotates on quota
/// failures, skips on anything else, halts when the matrix is spent.
///
/// One attempt is in flight at a time and the matrix is owned here, so
/// reading the current pair and advancing it need no locking.
pub struct FailoverScheduler<C> {
    client: C,
    matrix: KeyModelMatrix,
    settings: RunSettings,
    events: EventSender,
    stop: StopFlag,
    state: RunState,
    is_quota: fn(&GeminiError) -> bool,
}

impl<C: CaptionSender> FailoverScheduler<C> {
    pub fn new(
        client: C,
        matrix: KeyModelMatrix,
        settings: RunSettings,
        events: EventSender,
        stop: StopFlag,
    ) -> Self {
        Self {
            client,
            matrix,
            settings,
            events,
            stop,
            state: RunState::Ready,
            is_quota: GeminiError::is_quota_exhausted,
        }
    }

    /// Replaces the default quota classification (HTTP 429, the
    /// `RESOURCE_EXHAUSTED` status, the quota message) with a custom
    /// predicate.
    pub fn with_quota_predicate(mut self, is_quota: fn(&GeminiError) -> bool) -> Self {
        self.is_quota = is_quota;
        self
    }

    /// State the run ended in, or `READY` before the first run.
    #[allow(dead_code)]
    pub fn state(&self) -> RunState {
        self.state
    }

    /// Processes every pending item in the scan, in order. A failing item
    /// never aborts the run; only matrix exhaustion or an honored stop
    /// request do, and both leave unresolved items pending for a later run.
    pub async fn run(&mut self, scan: FolderScan) -> RunReport {
        let started_at = Utc::now();
        let total = scan.pending.len();
        let mut completed = 0usize;
        let mut skipped = 0usize;
        let mut resolved = 0usize;
        let mut termination = Termination::Completed;

        if let Some((_, model)) = self.matrix.current() {
            let model = model.to_string();
            let key_number = self.matrix.key_number();
            self.emit(RunEvent::Started {
                pending: total,
                already_captioned: scan.already_captioned.len(),
                model,
                key_number,
            });
        }

        for file in &scan.already_captioned {
            self.emit(RunEvent::AlreadyCaptioned { file: file.clone() });
        }

        if scan.pending.is_empty() {
            self.emit(RunEvent::NothingToDo);
        }

        'items: for item in &scan.pending {
            // The stop flag is only polled here, never mid-item: a stop must
            // not leave an item half done.
            if self.stop.is_requested() {
                self.state = RunState::Stopping;
                termination = Termination::Stopped;
                self.emit(RunEvent::Stopped { completed });
                self.state = RunState::Stopped;
                break 'items;
            }

            let image = match ImageData::read(&item.image_path) {
                Ok(image) => image,
                Err(err) => {
                    resolved += 1;
                    skipped += 1;
                    self.emit(RunEvent::Skipped {
                        file: item.file_name(),
                        reason: format!("cannot read image: {err}"),
                    });
                    continue;
                }
            };

            loop {
                self.state = RunState::Attempting;
                self.emit(RunEvent::Attempting {
                    file: item.file_name(),
                });

                let key_number = self.matrix.key_number();
                let Some((key, model)) = self.matrix.current() else {
                    self.state = RunState::Exhausted;
                    termination = Termination::Exhausted;
                    self.emit(RunEvent::MatrixExhausted { completed });
                    break 'items;
                };
                let model_name = model.to_string();
                let outcome = self.attempt(key, model, &image).await;

                if outcome == Outcome::QuotaExhausted {
                    self.emit(RunEvent::QuotaHit {
                        key_number,
                        model: model_name,
                    });
                }

                match resolve(outcome, &mut self.matrix) {
                    Transition::Complete(caption) => {
                        resolved += 1;
                        match sink::write_caption(&item.caption_path, &caption) {
                            Ok(()) => {
                                completed += 1;
                                self.emit(RunEvent::Completed {
                                    file: item.file_name(),
                                });
                            }
                            Err(err) => {
                                skipped += 1;
                                self.emit(RunEvent::Skipped {
                                    file: item.file_name(),
                                    reason: format!("cannot write caption: {err}"),
                                });
                            }
                        }
                        self.state = RunState::Ready;
                        continue 'items;
                    }
                    Transition::Skip(reason) => {
                        resolved += 1;
                        skipped += 1;
                        self.emit(RunEvent::Skipped {
                            file: item.file_name(),
                            reason,
                        });
                        self.state = RunState::Ready;
                        continue 'items;
                    }
                    Transition::Retry(rotation) => {
                        self.state = RunState::Advancing;
                        match rotation {
                            Rotation::NextKey => self.emit(RunEvent::SwitchedKey {
                                key_number: self.matrix.key_number(),
                            }),
                            Rotation::NextModel => {
                                let model = self
                                    .matrix
                                    .current()
                                    .map(|(_, model)| model.to_string())
                                    .unwrap_or_default();
                                self.emit(RunEvent::SwitchedModel { model });
                            }
                        }
                        sleep(self.settings.cooldown).await;
                        self.state = RunState::Ready;
                    }
                    Transition::Exhausted => {
                        self.state = RunState::Exhausted;
                        termination = Termination::Exhausted;
                        self.emit(RunEvent::MatrixExhausted { completed });
                        break 'items;
                    }
                }
            }
        }

        if termination == Termination::Completed {
            self.state = RunState::Ready;
            if total > 0 {
                self.emit(RunEvent::Finished { completed, skipped });
            }
        }

        let finished_at = Utc::now();
        RunReport {
            run_id: Uuid::new_v4().to_string(),
            termination,
            completed,
            skipped,
            already_captioned: scan.already_captioned.len(),
            remaining: total - resolved,
            started_at,
            finished_at,
            duration_ms: (finished_at - started_at).num_milliseconds(),
            folder: scan.folder,
        }
    }

    /// One inference attempt against the given pair, classified.
    async fn attempt(&self, key: &ApiKey, model: &str, image: &ImageData) -> Outcome {
        let request = CaptionRequest {
            api_key: key,
            model,
            image,
            prompt: &self.settings.prompt,
            system_instruction: self.settings.system_instruction.as_deref(),
        };

        match self.client.caption(request).await {
            Ok(caption) => Outcome::Success(caption),
            Err(err) if (self.is_quota)(&err) => Outcome::QuotaExhausted,
            Err(err) => Outcome::OtherError(err.to_string()),
        }
    }

    fn emit(&self, event: RunEvent) {
        // A closed receiver just means nobody is listening anymore.
        let _ = self.events.send(event);
    }
}
