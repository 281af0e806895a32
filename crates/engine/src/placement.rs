//! Hit-test driven placement.
//!
//! [`PlacementTracker`] owns the reticle and the hit-test source lifecycle of
//! one AR session. It never talks to the runtime itself: a frame step returns
//! a [`SourceTicket`] when a hit-test source should be requested, and the
//! driver feeds the outcome back through [`PlacementTracker::on_source_resolved`].
//! Tickets from before a session end are rejected, so a late resolution can
//! never repopulate a reset tracker.

use glam::{Mat4, Vec3};

use crate::error::HitTestError;
use crate::scene::Model;

/// A rigid transform resolved against the world reference space
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Pose {
    pub matrix: Mat4,
}

impl Pose {
    pub fn from_matrix(matrix: Mat4) -> Self {
        Self { matrix }
    }

    /// 16 floats in the layout of `XRRigidTransform.matrix` (column-major).
    /// Returns `None` for the wrong length, non-finite entries or a singular matrix.
    pub fn from_slice(m: &[f32]) -> Option<Self> {
        let cols: &[f32; 16] = m.try_into().ok()?;
        if !cols.iter().all(|v| v.is_finite()) {
            return None;
        }
        let matrix = Mat4::from_cols_array(cols);
        if !matrix.determinant().is_normal() {
            return None;
        }
        Some(Self::from_matrix(matrix))
    }

    pub fn translation(&self) -> Vec3 {
        self.matrix.w_axis.truncate()
    }
}

/// One frame's view of the hit-test API
pub trait HitTestFrame {
    type Source;
    type Space;
    type Hit;

    /// Results for `source` in this frame, in runtime order
    fn hit_test_results(&self, source: &Self::Source) -> Vec<Self::Hit>;

    /// Pose of `hit` relative to `space`, if the runtime can resolve it
    fn pose(&self, hit: &Self::Hit, space: &Self::Space) -> Option<Pose>;
}

/// Placement cursor. Consumers must gate on `visible`: the matrix is left
/// stale on frames without a hit.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Reticle {
    pub pose: Mat4,
    pub visible: bool,
}

impl Default for Reticle {
    fn default() -> Self {
        Self {
            pose: Mat4::IDENTITY,
            visible: false,
        }
    }
}

/// Identifies one hit-test source request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SourceTicket {
    generation: u64,
}

#[derive(Debug, Clone, PartialEq)]
pub enum TrackerState<S> {
    /// No hit-test source requested in this session
    Idle,
    /// One request in flight
    SourceRequested(SourceTicket),
    /// Source bound, queried every frame
    SourceReady(S),
    /// The request was rejected; stays here until retried or the session ends
    SourceFailed(HitTestError),
}

/// Events delivered outside the frame loop
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Signal {
    /// User asked to place the model at the reticle
    Confirm,
    /// The owning session ended
    SessionEnd,
}

#[derive(Debug)]
pub struct PlacementTracker<S> {
    state: TrackerState<S>,
    reticle: Reticle,
    generation: u64,
}

impl<S> Default for PlacementTracker<S> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S> PlacementTracker<S> {
    pub fn new() -> Self {
        Self {
            state: TrackerState::Idle,
            reticle: Reticle::default(),
            generation: 0,
        }
    }

    pub fn state(&self) -> &TrackerState<S> {
        &self.state
    }

    pub fn reticle(&self) -> &Reticle {
        &self.reticle
    }

    /// True once a source was requested in the current session
    pub fn source_requested(&self) -> bool {
        !matches!(self.state, TrackerState::Idle)
    }

    /// Per-frame step.
    ///
    /// Returns a ticket when the caller must request a hit-test source; at most
    /// one ticket is issued until the session ends or [`Self::retry_source`] is
    /// called.
    pub fn on_frame<F>(&mut self, frame: &F, space: Option<&F::Space>) -> Option<SourceTicket>
    where
        F: HitTestFrame<Source = S>,
    {
        let space = space?;

        if let TrackerState::Idle = self.state {
            let ticket = SourceTicket {
                generation: self.generation,
            };
            self.state = TrackerState::SourceRequested(ticket);
            tracing::debug!("Requesting hit-test source (generation {})", ticket.generation);
            return Some(ticket);
        }

        if let TrackerState::SourceReady(source) = &self.state {
            let pose = frame
                .hit_test_results(source)
                .first()
                .and_then(|hit| frame.pose(hit, space));
            match pose {
                Some(pose) => {
                    self.reticle.pose = pose.matrix;
                    self.reticle.visible = true;
                }
                None => self.reticle.visible = false,
            }
        }
        None
    }

    /// Outcome of the request identified by `ticket`.
    ///
    /// Returns false when the ticket is stale (session ended or retried since)
    /// and the outcome was dropped.
    pub fn on_source_resolved(&mut self, ticket: SourceTicket, result: Result<S, HitTestError>) -> bool {
        let current = matches!(self.state, TrackerState::SourceRequested(t) if t == ticket);
        if !current {
            tracing::debug!("Ignoring stale hit-test source (generation {})", ticket.generation);
            return false;
        }
        self.state = match result {
            Ok(source) => {
                tracing::info!("Hit-test source ready");
                TrackerState::SourceReady(source)
            }
            Err(e) => {
                tracing::warn!("Hit-test source unavailable: {}", e);
                TrackerState::SourceFailed(e)
            }
        };
        true
    }

    /// Leave `SourceFailed` so the next frame requests a new source
    pub fn retry_source(&mut self) -> bool {
        if let TrackerState::SourceFailed(_) = self.state {
            self.generation += 1;
            self.state = TrackerState::Idle;
            return true;
        }
        false
    }

    /// Session ended: drop the source and any in-flight request
    pub fn reset(&mut self) {
        self.generation += 1;
        self.state = TrackerState::Idle;
        self.reticle.visible = false;
    }

    /// Commit the reticle pose onto `model`. No-op while the reticle is hidden.
    pub fn confirm(&self, model: &mut Model) -> bool {
        if !self.reticle.visible {
            return false;
        }
        let (_, rotation, translation) = self.reticle.pose.to_scale_rotation_translation();
        if !(rotation.is_finite() && translation.is_finite()) {
            tracing::warn!("Reticle pose cannot be decomposed; placement skipped");
            return false;
        }
        model.place(translation, rotation);
        tracing::info!(
            "Placed model at ({:.3}, {:.3}, {:.3})",
            translation.x,
            translation.y,
            translation.z
        );
        true
    }

    /// Transition for out-of-frame signals; returns whether the model changed
    pub fn handle(&mut self, signal: Signal, model: &mut Model) -> bool {
        match signal {
            Signal::Confirm => self.confirm(model),
            Signal::SessionEnd => {
                self.reset();
                false
            }
        }
    }
}
