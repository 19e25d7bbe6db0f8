//! Dispatch state machine: `Idle -> Submitting -> Resolved`.
//!
//! The engine never performs I/O. `begin_submit` hands out a
//! [`PendingSubmission`] whose token has to be passed back to `resolve` once
//! the remote call finishes. Tokens carry the mode and selection generation
//! they were issued under, so a completion that arrives after the user picked
//! another mode is dropped instead of overwriting the new form.

use std::{collections::BTreeMap, sync::Arc};

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::{Map, Value};
use shared::{
    domain::{FieldName, InputState, Mode},
    error::FailureNotice,
    protocol::ResponseResult,
};
use tracing::{debug, info, warn};
use url::Url;
use uuid::Uuid;

use crate::{
    error::{CallError, DispatchError},
    registry::{ModeDescriptor, ModeRegistry},
};

/// One outbound request, built at submit time.
#[derive(Debug, Clone, PartialEq)]
pub struct RequestEnvelope {
    pub mode: Mode,
    pub target: Url,
    pub body: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmissionToken {
    request_id: Uuid,
    mode: Mode,
    generation: u64,
    issued_at: DateTime<Utc>,
}

impl SubmissionToken {
    pub fn request_id(&self) -> Uuid {
        self.request_id
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }
}

#[derive(Debug, Clone)]
pub struct PendingSubmission {
    pub token: SubmissionToken,
    pub envelope: RequestEnvelope,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Phase {
    Idle,
    Submitting { token: SubmissionToken },
    Resolved,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PhaseKind {
    Idle,
    Submitting,
    Resolved,
}

impl Phase {
    pub fn kind(&self) -> PhaseKind {
        match self {
            Phase::Idle => PhaseKind::Idle,
            Phase::Submitting { .. } => PhaseKind::Submitting,
            Phase::Resolved => PhaseKind::Resolved,
        }
    }
}

/// Terminal outcome of a submit cycle, either live or substituted.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Resolution {
    pub request_id: Uuid,
    pub mode: Mode,
    pub result: ResponseResult,
    pub succeeded: bool,
    pub notice: Option<FailureNotice>,
    pub resolved_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiscardReason {
    /// The user selected a mode after the request was issued.
    ModeChanged { submitted: Mode, current: Mode },
    /// The engine is no longer waiting on this request.
    Superseded,
    /// The task driving the request never completed.
    Interrupted,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ResolveOutcome {
    Applied(Resolution),
    Discarded {
        request_id: Uuid,
        reason: DiscardReason,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EngineSnapshot {
    pub mode: Mode,
    pub phase: PhaseKind,
    pub input: InputState,
    pub in_flight: Option<Uuid>,
    pub last_resolution: Option<Resolution>,
}

pub struct DispatchEngine {
    registry: Arc<ModeRegistry>,
    targets: BTreeMap<Mode, Url>,
    mode: Mode,
    input: InputState,
    phase: Phase,
    last_resolution: Option<Resolution>,
    generation: u64,
}

impl DispatchEngine {
    pub fn new(registry: Arc<ModeRegistry>, base_url: &Url) -> Result<Self, DispatchError> {
        Self::with_mode(registry, base_url, Mode::EmailResponse)
    }

    pub fn with_mode(
        registry: Arc<ModeRegistry>,
        base_url: &Url,
        mode: Mode,
    ) -> Result<Self, DispatchError> {
        let mut targets = BTreeMap::new();
        for candidate in Mode::ALL {
            let descriptor = registry.describe(candidate)?;
            let target = join_target(base_url, descriptor.target_path)
                .ok_or_else(|| DispatchError::InvalidBaseUrl(base_url.to_string()))?;
            targets.insert(candidate, target);
        }

        Ok(Self {
            registry,
            targets,
            mode,
            input: InputState::default(),
            phase: Phase::Idle,
            last_resolution: None,
            generation: 0,
        })
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn input(&self) -> &InputState {
        &self.input
    }

    pub fn phase(&self) -> &Phase {
        &self.phase
    }

    pub fn last_resolution(&self) -> Option<&Resolution> {
        self.last_resolution.as_ref()
    }

    pub fn registry(&self) -> &ModeRegistry {
        &self.registry
    }

    pub fn descriptor(&self) -> &ModeDescriptor {
        // Coverage of every mode is checked in `with_mode` and the registry is immutable.
        match self.registry.describe(self.mode) {
            Ok(descriptor) => descriptor,
            Err(err) => panic!("mode registry out of sync with engine: {err}"),
        }
    }

    pub fn snapshot(&self) -> EngineSnapshot {
        EngineSnapshot {
            mode: self.mode,
            phase: self.phase.kind(),
            input: self.input.clone(),
            in_flight: match &self.phase {
                Phase::Submitting { token } => Some(token.request_id),
                _ => None,
            },
            last_resolution: self.last_resolution.clone(),
        }
    }

    /// Always lands in `Idle(mode, empty)`. Any in-flight request is
    /// disassociated from the form.
    pub fn select_mode(&mut self, mode: Mode) {
        if let Phase::Submitting { token } = &self.phase {
            info!(
                request_id = %token.request_id,
                from = %self.mode,
                to = %mode,
                "mode changed while request in flight; its result will be dropped"
            );
        }
        self.generation += 1;
        self.mode = mode;
        self.input.clear();
        self.last_resolution = None;
        self.phase = Phase::Idle;
    }

    pub fn edit_field(
        &mut self,
        field: FieldName,
        value: impl Into<String>,
    ) -> Result<(), DispatchError> {
        if matches!(self.phase, Phase::Submitting { .. }) {
            debug!(%field, mode = %self.mode, "rejected edit during submission");
            return Err(DispatchError::EditWhileSubmitting { field });
        }
        if !self.descriptor().requires(field) {
            debug!(%field, mode = %self.mode, "rejected edit of field outside mode");
            return Err(DispatchError::FieldNotInMode {
                mode: self.mode,
                field,
            });
        }
        self.input.set(field, value);
        if self.phase == Phase::Resolved {
            self.phase = Phase::Idle;
        }
        Ok(())
    }

    pub fn missing_fields(&self) -> Vec<FieldName> {
        self.descriptor()
            .required_fields
            .iter()
            .copied()
            .filter(|field| !self.input.is_present(*field))
            .collect()
    }

    pub fn begin_submit(&mut self) -> Result<PendingSubmission, DispatchError> {
        if let Phase::Submitting { token } = &self.phase {
            debug!(request_id = %token.request_id, "rejected submit while in flight");
            return Err(DispatchError::SubmissionInFlight { mode: self.mode });
        }

        let missing = self.missing_fields();
        if !missing.is_empty() {
            debug!(mode = %self.mode, ?missing, "rejected submit with missing fields");
            return Err(DispatchError::Validation {
                mode: self.mode,
                missing,
            });
        }

        let body = self
            .descriptor()
            .required_fields
            .iter()
            .map(|field| {
                (
                    field.wire_name().to_string(),
                    Value::String(self.input.get(*field).to_string()),
                )
            })
            .collect::<Map<_, _>>();
        let target = self.target(self.mode).clone();

        let token = SubmissionToken {
            request_id: Uuid::new_v4(),
            mode: self.mode,
            generation: self.generation,
            issued_at: Utc::now(),
        };
        self.phase = Phase::Submitting {
            token: token.clone(),
        };

        Ok(PendingSubmission {
            token,
            envelope: RequestEnvelope {
                mode: self.mode,
                target,
                body,
            },
        })
    }

    pub fn resolve(
        &mut self,
        token: &SubmissionToken,
        outcome: Result<Value, CallError>,
    ) -> ResolveOutcome {
        if token.mode != self.mode || token.generation != self.generation {
            let reason = if token.mode != self.mode {
                DiscardReason::ModeChanged {
                    submitted: token.mode,
                    current: self.mode,
                }
            } else {
                DiscardReason::Superseded
            };
            info!(request_id = %token.request_id, ?reason, "dropping stale resolution");
            return ResolveOutcome::Discarded {
                request_id: token.request_id,
                reason,
            };
        }

        match &self.phase {
            Phase::Submitting { token: current } if current.request_id == token.request_id => {}
            _ => {
                info!(request_id = %token.request_id, "dropping resolution for request no longer awaited");
                return ResolveOutcome::Discarded {
                    request_id: token.request_id,
                    reason: DiscardReason::Superseded,
                };
            }
        }

        let decoded = outcome
            .and_then(|value| ResponseResult::decode(token.mode, value).map_err(CallError::from));

        let elapsed_ms = (Utc::now() - token.issued_at).num_milliseconds();
        let (result, succeeded, notice) = match decoded {
            Ok(result) => {
                if let Some(end_point) = result.end_point() {
                    if end_point != token.mode.end_point() {
                        warn!(
                            request_id = %token.request_id,
                            expected = token.mode.end_point(),
                            received = end_point,
                            "response end_point does not match requested mode"
                        );
                    }
                }
                info!(
                    request_id = %token.request_id,
                    mode = %token.mode,
                    elapsed_ms,
                    "request resolved"
                );
                (result, true, None)
            }
            Err(err) => {
                warn!(
                    request_id = %token.request_id,
                    mode = %token.mode,
                    error = %err,
                    elapsed_ms,
                    "remote call failed; substituting demo response"
                );
                (
                    self.descriptor().demo_response.clone(),
                    false,
                    Some(err.to_notice()),
                )
            }
        };

        let resolution = Resolution {
            request_id: token.request_id,
            mode: token.mode,
            result,
            succeeded,
            notice,
            resolved_at: Utc::now(),
        };
        self.last_resolution = Some(resolution.clone());
        self.phase = Phase::Resolved;
        ResolveOutcome::Applied(resolution)
    }

    /// Hides the fallback notice; the demo result and its flag stay.
    pub fn dismiss_notice(&mut self) -> bool {
        self.last_resolution
            .as_mut()
            .and_then(|resolution| resolution.notice.take())
            .is_some()
    }

    fn target(&self, mode: Mode) -> &Url {
        match self.targets.get(&mode) {
            Some(target) => target,
            None => panic!("no target url computed for {mode}"),
        }
    }
}

fn join_target(base_url: &Url, path: &str) -> Option<Url> {
    let mut target = base_url.clone();
    {
        let mut segments = target.path_segments_mut().ok()?;
        segments.pop_if_empty();
        for segment in path.split('/').filter(|segment| !segment.is_empty()) {
            segments.push(segment);
        }
    }
    target.set_query(None);
    target.set_fragment(None);
    Some(target)
}

#[cfg(test)]
#[path = "tests/engine_tests.rs"]
mod tests;
