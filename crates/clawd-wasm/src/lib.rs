//! Browser entry points for the Claw'd AR viewer.
//!
//! The host page drives everything: it creates an [`ArApp`], wires the entry
//! button to `check_capability`/`enter_ar`, forwards every `XRFrame` and
//! `select` event, and reads back the reticle and model matrices for its
//! renderer. The model-viewer fallback only needs [`export_model_url`].

use std::cell::RefCell;
use std::rc::Rc;

use clawd_engine::glb;
use clawd_engine::session::{acquire_hit_test_source, check_capability, establish};
use clawd_engine::{
    build, ExportError, GlbExporter, Model, PlacementTracker, ResourceSink, SessionError, SessionLifecycle,
    SessionState, Signal, TrackerState, XrSessionHandle,
};
use js_sys::{Array, Promise, Uint8Array};
use serde::Serialize;
use shared::AppConfig;
use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;
use wasm_bindgen_futures::{future_to_promise, spawn_local};
use web_sys::{Blob, BlobPropertyBag, Url};

mod xr;

pub use xr::{WebXr, XrFrame, XrHitTestSource, XrSession};

/// Initialize WASM module with panic hook and logging
#[wasm_bindgen(start)]
pub fn init() {
    console_error_panic_hook::set_once();
    tracing_wasm::set_as_global_default();
    tracing::info!("Claw'd AR module initialized");
}

fn load_config(config_json: Option<String>) -> Result<AppConfig, JsError> {
    match config_json {
        Some(json) => AppConfig::from_json(&json).map_err(|e| JsError::new(&format!("Invalid config: {}", e))),
        None => Ok(AppConfig::default()),
    }
}

fn js_error<E: std::error::Error>(err: E) -> JsValue {
    JsError::from(err).into()
}

/// Publishes bytes as a Blob and hands out its object URL
struct BlobSink;

impl ResourceSink for BlobSink {
    type Handle = String;

    fn publish(&self, bytes: Vec<u8>, mime: &str) -> Result<String, ExportError> {
        let parts = Array::of1(&Uint8Array::from(bytes.as_slice()));
        let props = BlobPropertyBag::new();
        props.set_type(mime);
        let blob = Blob::new_with_u8_array_sequence_and_options(&parts, &props)
            .map_err(|e| ExportError::Publish(xr::js_error_message(&e)))?;
        Url::create_object_url_with_blob(&blob).map_err(|e| ExportError::Publish(xr::js_error_message(&e)))
    }
}

/// Builds the robot and returns it as GLB bytes
#[wasm_bindgen]
pub fn build_model_glb(config_json: Option<String>) -> Result<Vec<u8>, JsError> {
    let config = load_config(config_json)?;
    let model = build();
    Ok(GlbExporter::new(config.export.generator).encode(&model.root)?)
}

/// Builds the robot, exports it and returns an object URL for model-viewer's `src`
#[wasm_bindgen]
pub async fn export_model_url(config_json: Option<String>) -> Result<String, JsError> {
    let config = load_config(config_json)?;
    let model = build();
    let url = GlbExporter::new(config.export.generator)
        .export(&model.root, &BlobSink)
        .await?;
    Ok(url)
}

/// Releases a URL handed out by [`export_model_url`]
#[wasm_bindgen]
pub fn revoke_model_url(url: &str) -> Result<(), JsValue> {
    Url::revoke_object_url(url)
}

/// Exports the robot, reads the GLB back and returns a JSON summary
/// (node names, mesh extents, material colors)
#[wasm_bindgen]
pub fn inspect_model(config_json: Option<String>) -> Result<String, JsError> {
    let bytes = build_model_glb(config_json)?;
    let summary = glb::parse(&bytes)?.summary();
    Ok(serde_json::to_string(&summary)?)
}

/// Attribute pairs for the `<model-viewer>` element, as `[name, value]` arrays
#[wasm_bindgen]
pub fn model_viewer_attributes(config_json: Option<String>) -> Result<JsValue, JsError> {
    let config = load_config(config_json)?;
    Ok(serde_wasm_bindgen::to_value(&config.viewer.to_attributes())?)
}

#[derive(Serialize)]
struct CapabilityStatus {
    supported: bool,
    label: &'static str,
}

fn state_label(state: SessionState) -> &'static str {
    match state {
        SessionState::Inactive => "inactive",
        SessionState::Requesting => "requesting",
        SessionState::Active => "active",
        SessionState::Ended => "ended",
    }
}

type EndListener = Closure<dyn FnMut(web_sys::Event)>;

/// One AR viewer: session, placement tracker and the placeable model
#[wasm_bindgen]
pub struct ArApp {
    config: AppConfig,
    runtime: Rc<WebXr>,
    lifecycle: Rc<RefCell<SessionLifecycle<XrSession>>>,
    tracker: Rc<RefCell<PlacementTracker<XrHitTestSource>>>,
    model: Model,
    end_listener: Rc<RefCell<Option<EndListener>>>,
}

#[wasm_bindgen]
impl ArApp {
    #[wasm_bindgen(constructor)]
    pub fn new(config_json: Option<String>) -> Result<ArApp, JsError> {
        let config = load_config(config_json)?;
        Ok(Self {
            config,
            runtime: Rc::new(WebXr::from_navigator()),
            lifecycle: Rc::new(RefCell::new(SessionLifecycle::new())),
            tracker: Rc::new(RefCell::new(PlacementTracker::new())),
            model: build(),
            end_listener: Rc::new(RefCell::new(None)),
        })
    }

    /// Resolves to `{ supported, label }` for the entry button
    pub fn check_capability(&self) -> Promise {
        let runtime = self.runtime.clone();
        let mode = self.config.session.mode;
        future_to_promise(async move {
            let capability = check_capability(runtime.as_ref(), mode).await;
            let status = CapabilityStatus {
                supported: capability.is_supported(),
                label: capability.label(),
            };
            serde_wasm_bindgen::to_value(&status).map_err(JsValue::from)
        })
    }

    /// Requests the AR session and its world space. Rejects when a session is
    /// already running or the runtime refuses.
    pub fn enter_ar(&self) -> Promise {
        let runtime = self.runtime.clone();
        let lifecycle = self.lifecycle.clone();
        let tracker = self.tracker.clone();
        let end_listener = self.end_listener.clone();
        let config = self.config.session.clone();

        future_to_promise(async move {
            let on_session = |session: &XrSession| {
                let lifecycle = lifecycle.clone();
                let tracker = tracker.clone();
                let listener = EndListener::new(move |_event: web_sys::Event| {
                    lifecycle.borrow_mut().on_session_end(&mut tracker.borrow_mut());
                });
                if let Err(e) = session.add_event_listener_with_callback("end", listener.as_ref().unchecked_ref()) {
                    tracing::warn!("Could not subscribe to session end: {}", xr::js_error_message(&e));
                }
                *end_listener.borrow_mut() = Some(listener);
            };

            establish(&lifecycle, runtime.as_ref(), &config, on_session)
                .await
                .map_err(js_error)?;
            Ok(JsValue::UNDEFINED)
        })
    }

    /// Per-frame step; call from the session's animation frame callback
    pub fn on_frame(&self, frame: &XrFrame) {
        let ticket = {
            let lifecycle = self.lifecycle.borrow();
            self.tracker.borrow_mut().on_frame(frame, lifecycle.world_space())
        };
        let Some(ticket) = ticket else {
            return;
        };
        let Some(session) = self.lifecycle.borrow().active().map(|a| a.session.clone()) else {
            return;
        };

        let tracker = self.tracker.clone();
        let origin = self.config.session.hit_test_space;
        spawn_local(async move {
            acquire_hit_test_source(&session, &tracker, ticket, origin).await;
        });
    }

    /// `select` event: place the model at the reticle. Returns whether it moved.
    pub fn select(&mut self) -> bool {
        self.tracker.borrow_mut().handle(Signal::Confirm, &mut self.model)
    }

    /// Ends the running session; teardown happens on the session's end event
    pub fn end_session(&self) -> Promise {
        let session = self.lifecycle.borrow().active().map(|a| a.session.clone());
        future_to_promise(async move {
            let session = session.ok_or_else(|| js_error(SessionError::NotActive))?;
            session.end().await.map_err(js_error)?;
            Ok(JsValue::UNDEFINED)
        })
    }

    /// Request a new hit-test source after a failure. Returns false when
    /// there was no failure to recover from.
    pub fn retry_hit_test(&self) -> bool {
        self.tracker.borrow_mut().retry_source()
    }

    /// Why the hit-test source is unavailable, if it is
    pub fn hit_test_error(&self) -> Option<String> {
        match self.tracker.borrow().state() {
            TrackerState::SourceFailed(e) => Some(e.to_string()),
            _ => None,
        }
    }

    pub fn reticle_visible(&self) -> bool {
        self.tracker.borrow().reticle().visible
    }

    /// Column-major 4x4; meaningful only while `reticle_visible()`
    pub fn reticle_matrix(&self) -> Vec<f32> {
        self.tracker.borrow().reticle().pose.to_cols_array().to_vec()
    }

    pub fn model_visible(&self) -> bool {
        self.model.visible
    }

    /// Column-major world matrix of the model root
    pub fn model_matrix(&self) -> Vec<f32> {
        self.model.world_matrix().to_cols_array().to_vec()
    }

    pub fn session_state(&self) -> String {
        state_label(self.lifecycle.borrow().state()).to_string()
    }
}
