use std::{sync::Arc, time::Duration};

use anyhow::Context;
use serde_json::Value;
use shared::{
    domain::{FieldName, Mode},
    error::FailureNotice,
};
use tokio::sync::{broadcast, Mutex};
use tracing::{info, warn};
use url::Url;
use uuid::Uuid;

pub mod config;
pub mod engine;
pub mod error;
pub mod normalize;
pub mod registry;
pub mod session;
pub mod transport;

pub use engine::{
    DiscardReason, DispatchEngine, EngineSnapshot, Phase, PhaseKind, RequestEnvelope, Resolution,
    ResolveOutcome,
};
pub use error::{CallError, DispatchError};
pub use normalize::{normalize, DisplayAnalysis, DisplayRecord};
pub use registry::{ModeDescriptor, ModeRegistry};
pub use session::{CredentialVerifier, NoCredentialBackend, SessionGate, SessionIdentity};
pub use transport::{DispatchTransport, HttpTransport};

const EVENT_CHANNEL_CAPACITY: usize = 256;

/// Notifications for whatever renders the form.
#[derive(Debug, Clone, PartialEq)]
pub enum DispatchEvent {
    ModeSelected(Mode),
    FieldEdited(FieldName),
    Submitting {
        request_id: Uuid,
        mode: Mode,
    },
    Resolved(Resolution),
    FallbackUsed {
        request_id: Uuid,
        mode: Mode,
        notice: FailureNotice,
    },
    ResolutionDiscarded {
        request_id: Uuid,
        reason: DiscardReason,
    },
    NoticeDismissed,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SubmitReport {
    Applied(Resolution),
    Discarded {
        request_id: Uuid,
        reason: DiscardReason,
    },
}

impl From<ResolveOutcome> for SubmitReport {
    fn from(value: ResolveOutcome) -> Self {
        match value {
            ResolveOutcome::Applied(resolution) => Self::Applied(resolution),
            ResolveOutcome::Discarded { request_id, reason } => {
                Self::Discarded { request_id, reason }
            }
        }
    }
}

/// One form session: its own engine, transport and event stream.
pub struct DispatchSession {
    identity: SessionIdentity,
    transport: Arc<dyn DispatchTransport>,
    request_timeout: Duration,
    engine: Mutex<DispatchEngine>,
    events: broadcast::Sender<DispatchEvent>,
}

impl DispatchSession {
    pub fn new(identity: SessionIdentity, settings: &config::Settings) -> anyhow::Result<Arc<Self>> {
        let base_url = settings.base_url()?;
        Self::new_with_transport(
            identity,
            Arc::new(ModeRegistry::builtin()),
            &base_url,
            Arc::new(HttpTransport::new()),
            settings.request_timeout(),
        )
        .context("failed to open dispatch session")
    }

    pub fn new_with_transport(
        identity: SessionIdentity,
        registry: Arc<ModeRegistry>,
        base_url: &Url,
        transport: Arc<dyn DispatchTransport>,
        request_timeout: Duration,
    ) -> Result<Arc<Self>, DispatchError> {
        let engine = DispatchEngine::new(registry, base_url)?;
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Ok(Arc::new(Self {
            identity,
            transport,
            request_timeout,
            engine: Mutex::new(engine),
            events,
        }))
    }

    pub fn identity(&self) -> &SessionIdentity {
        &self.identity
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<DispatchEvent> {
        self.events.subscribe()
    }

    pub async fn snapshot(&self) -> EngineSnapshot {
        self.engine.lock().await.snapshot()
    }

    pub async fn select_mode(&self, mode: Mode) {
        self.engine.lock().await.select_mode(mode);
        self.emit(DispatchEvent::ModeSelected(mode));
    }

    pub async fn edit_field(
        &self,
        field: FieldName,
        value: impl Into<String>,
    ) -> Result<(), DispatchError> {
        self.engine.lock().await.edit_field(field, value)?;
        self.emit(DispatchEvent::FieldEdited(field));
        Ok(())
    }

    pub async fn dismiss_notice(&self) -> bool {
        let dismissed = self.engine.lock().await.dismiss_notice();
        if dismissed {
            self.emit(DispatchEvent::NoticeDismissed);
        }
        dismissed
    }

    /// Issues at most one remote call. The call runs on its own task so the
    /// engine always leaves `Submitting`, even if this future is dropped.
    pub async fn submit(self: &Arc<Self>) -> Result<SubmitReport, DispatchError> {
        let pending = self.engine.lock().await.begin_submit()?;
        let request_id = pending.token.request_id();
        info!(
            %request_id,
            mode = %pending.envelope.mode,
            target = %pending.envelope.target,
            user = %self.identity.display_name,
            "submitting request"
        );
        self.emit(DispatchEvent::Submitting {
            request_id,
            mode: pending.envelope.mode,
        });

        let session = Arc::clone(self);
        let task = tokio::spawn(async move {
            let outcome = session.call_remote(&pending.envelope).await;
            let resolved = session.engine.lock().await.resolve(&pending.token, outcome);
            session.publish(&resolved);
            SubmitReport::from(resolved)
        });

        match task.await {
            Ok(report) => Ok(report),
            Err(err) if err.is_panic() => std::panic::resume_unwind(err.into_panic()),
            Err(err) => {
                warn!(%request_id, "submit task did not complete: {err}");
                Ok(SubmitReport::Discarded {
                    request_id,
                    reason: DiscardReason::Interrupted,
                })
            }
        }
    }

    async fn call_remote(&self, envelope: &RequestEnvelope) -> Result<Value, CallError> {
        match tokio::time::timeout(self.request_timeout, self.transport.post_json(envelope)).await {
            Ok(outcome) => outcome,
            Err(_) => Err(CallError::Timeout(self.request_timeout)),
        }
    }

    fn publish(&self, resolved: &ResolveOutcome) {
        match resolved {
            ResolveOutcome::Applied(resolution) => {
                if let Some(notice) = &resolution.notice {
                    self.emit(DispatchEvent::FallbackUsed {
                        request_id: resolution.request_id,
                        mode: resolution.mode,
                        notice: notice.clone(),
                    });
                }
                self.emit(DispatchEvent::Resolved(resolution.clone()));
            }
            ResolveOutcome::Discarded { request_id, reason } => {
                self.emit(DispatchEvent::ResolutionDiscarded {
                    request_id: *request_id,
                    reason: *reason,
                });
            }
        }
    }

    fn emit(&self, event: DispatchEvent) {
        // No subscribers is fine; the snapshot stays authoritative.
        let _ = self.events.send(event);
    }
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
