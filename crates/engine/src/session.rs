//! AR session negotiation and teardown.
//!
//! The runtime is reached through [`XrRuntime`] / [`XrSessionHandle`]. Every
//! setup stage is a single-shot future; [`SessionLifecycle`] hands out a ticket
//! per request so that a session end arriving between two stages cancels the
//! remaining ones. State is kept in a `RefCell` by the async helpers and is
//! never borrowed across an `.await`.

use std::cell::RefCell;

use shared::{ReferenceSpaceType, SessionConfig, SessionFeature, SessionMode};

use crate::error::{HitTestError, SessionError};
use crate::placement::{PlacementTracker, SourceTicket};

/// Entry point to the platform's XR system
#[allow(async_fn_in_trait)]
pub trait XrRuntime {
    type Session: XrSessionHandle;

    /// False when the platform exposes no XR system at all
    fn is_available(&self) -> bool;

    async fn is_session_supported(&self, mode: SessionMode) -> Result<bool, SessionError>;

    async fn request_session(
        &self,
        mode: SessionMode,
        required_features: &[SessionFeature],
    ) -> Result<Self::Session, SessionError>;
}

/// A running XR session
#[allow(async_fn_in_trait)]
pub trait XrSessionHandle {
    type Space;
    type Source;

    async fn request_reference_space(&self, kind: ReferenceSpaceType) -> Result<Self::Space, SessionError>;

    /// Hit-test source casting rays from the origin of `space`
    async fn request_hit_test_source(&self, space: &Self::Space) -> Result<Self::Source, HitTestError>;

    async fn end(&self) -> Result<(), SessionError>;
}

/// Result of the one-shot capability query
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Capability {
    Supported,
    Unsupported,
    /// No XR system on this platform
    Unavailable,
}

impl Capability {
    pub fn is_supported(self) -> bool {
        self == Capability::Supported
    }

    /// Text of the entry button
    pub fn label(self) -> &'static str {
        match self {
            Capability::Supported => "ENTER AR",
            Capability::Unsupported => "AR NOT SUPPORTED",
            Capability::Unavailable => "WebXR not available",
        }
    }
}

/// Ask the runtime whether `mode` can run here. Query errors count as unsupported.
pub async fn check_capability<R: XrRuntime>(runtime: &R, mode: SessionMode) -> Capability {
    if !runtime.is_available() {
        tracing::info!("WebXR not available");
        return Capability::Unavailable;
    }
    match runtime.is_session_supported(mode).await {
        Ok(true) => Capability::Supported,
        Ok(false) => {
            tracing::info!("Session mode '{}' not supported", mode.as_str());
            Capability::Unsupported
        }
        Err(e) => {
            tracing::warn!("Capability query failed: {}", e);
            Capability::Unsupported
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Inactive,
    Requesting,
    Active,
    Ended,
}

impl SessionState {
    /// Inactive and Ended both mean "no session, free to request one"
    pub fn is_resting(self) -> bool {
        matches!(self, SessionState::Inactive | SessionState::Ended)
    }
}

/// Identifies one session request across its setup stages
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionTicket {
    epoch: u64,
}

/// Session plus the world-tracking space poses are resolved against
pub struct ActiveSession<H: XrSessionHandle> {
    pub session: H,
    pub world_space: H::Space,
}

pub struct SessionLifecycle<H: XrSessionHandle> {
    state: SessionState,
    epoch: u64,
    active: Option<ActiveSession<H>>,
}

impl<H: XrSessionHandle> Default for SessionLifecycle<H> {
    fn default() -> Self {
        Self::new()
    }
}

impl<H: XrSessionHandle> SessionLifecycle<H> {
    pub fn new() -> Self {
        Self {
            state: SessionState::Inactive,
            epoch: 0,
            active: None,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn active(&self) -> Option<&ActiveSession<H>> {
        self.active.as_ref()
    }

    pub fn world_space(&self) -> Option<&H::Space> {
        self.active.as_ref().map(|a| &a.world_space)
    }

    /// Start a request. Only one session may be requesting or active at a time.
    pub fn begin_request(&mut self) -> Result<SessionTicket, SessionError> {
        if !self.state.is_resting() {
            return Err(SessionError::AlreadyActive);
        }
        self.epoch += 1;
        self.state = SessionState::Requesting;
        Ok(SessionTicket { epoch: self.epoch })
    }

    /// Whether `ticket` still belongs to the in-progress request
    pub fn is_current(&self, ticket: SessionTicket) -> bool {
        self.state == SessionState::Requesting && ticket.epoch == self.epoch
    }

    /// A setup stage failed; back to rest
    pub fn fail_request(&mut self, ticket: SessionTicket, error: &SessionError) {
        if self.is_current(ticket) {
            tracing::warn!("Session request failed: {}", error);
            self.state = SessionState::Inactive;
        }
    }

    /// Last stage done: the session becomes active
    pub fn finish_request(
        &mut self,
        ticket: SessionTicket,
        session: H,
        world_space: H::Space,
    ) -> Result<(), SessionError> {
        if !self.is_current(ticket) {
            tracing::debug!("Dropping session from cancelled request");
            return Err(SessionError::Cancelled);
        }
        self.active = Some(ActiveSession {
            session,
            world_space,
        });
        self.state = SessionState::Active;
        tracing::info!("AR session started");
        Ok(())
    }

    /// Session end signal. The tracker is reset before the handle is dropped.
    pub fn on_session_end(&mut self, tracker: &mut PlacementTracker<H::Source>) {
        tracker.reset();
        self.active = None;
        self.epoch += 1;
        if self.state != SessionState::Ended {
            tracing::info!("AR session ended");
        }
        self.state = SessionState::Ended;
    }
}

/// Request a session and its world space, committing the result to `lifecycle`.
///
/// `on_session` runs as soon as the runtime hands out the session, before any
/// further stage, so the caller can subscribe to its end signal. A session end
/// observed between stages yields [`SessionError::Cancelled`].
pub async fn establish<R: XrRuntime>(
    lifecycle: &RefCell<SessionLifecycle<R::Session>>,
    runtime: &R,
    config: &SessionConfig,
    on_session: impl FnOnce(&R::Session),
) -> Result<(), SessionError> {
    let ticket = lifecycle.borrow_mut().begin_request()?;
    tracing::info!("Requesting '{}' session", config.mode.as_str());

    let session = match runtime.request_session(config.mode, &config.required_features).await {
        Ok(session) => session,
        Err(e) => {
            lifecycle.borrow_mut().fail_request(ticket, &e);
            return Err(e);
        }
    };
    on_session(&session);

    if !lifecycle.borrow().is_current(ticket) {
        return Err(SessionError::Cancelled);
    }

    let world_space = match session.request_reference_space(config.world_space).await {
        Ok(space) => space,
        Err(e) => {
            lifecycle.borrow_mut().fail_request(ticket, &e);
            if let Err(end_err) = session.end().await {
                tracing::warn!("Ending half-initialized session failed: {}", end_err);
            }
            return Err(e);
        }
    };

    lifecycle.borrow_mut().finish_request(ticket, session, world_space)
}

/// Serve a [`SourceTicket`] issued by the tracker: resolve the hit-test origin
/// space, request the source and report back. Returns whether the tracker
/// accepted the outcome.
pub async fn acquire_hit_test_source<H: XrSessionHandle>(
    session: &H,
    tracker: &RefCell<PlacementTracker<H::Source>>,
    ticket: SourceTicket,
    origin: ReferenceSpaceType,
) -> bool {
    let result = match session.request_reference_space(origin).await {
        Ok(space) => session.request_hit_test_source(&space).await,
        Err(e) => Err(HitTestError::Space(e.to_string())),
    };
    tracker.borrow_mut().on_source_resolved(ticket, result)
}
