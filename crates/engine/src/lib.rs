//! Claw'd AR engine: builds the toy-robot model, exports it as binary glTF and
//! drives hit-test placement of the model inside a WebXR session.
//!
//! Browser specifics stay behind the traits in [`session`] and [`placement`];
//! everything here runs on a single cooperative timeline.

pub mod error;
pub mod export;
pub mod geometry;
pub mod glb;
pub mod gltf;
pub mod placement;
pub mod scene;
pub mod session;

pub use error::{ExportError, GlbError, HitTestError, SessionError};
pub use export::{GlbExporter, ResourceSink};
pub use geometry::build;
pub use placement::{HitTestFrame, PlacementTracker, Pose, Reticle, Signal, SourceTicket, TrackerState};
pub use scene::{Material, Mesh, MeshData, Model, Node, Transform};
pub use session::{ActiveSession, Capability, SessionLifecycle, SessionState, XrRuntime, XrSessionHandle};
