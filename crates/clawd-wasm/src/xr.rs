//! WebXR bindings and their implementation of the engine's runtime traits.
//!
//! Declared by hand instead of through web-sys, whose XR types sit behind
//! `web_sys_unstable_apis`.

use clawd_engine::placement::{HitTestFrame, Pose};
use clawd_engine::{HitTestError, SessionError, XrRuntime, XrSessionHandle};
use js_sys::{Array, Float32Array, Object, Promise, Reflect};
use shared::{ReferenceSpaceType, SessionFeature, SessionMode};
use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;
use wasm_bindgen_futures::JsFuture;

#[wasm_bindgen]
extern "C" {
    /// `navigator.xr`
    #[wasm_bindgen(js_name = XRSystem)]
    #[derive(Clone, Debug)]
    pub type XrSystem;

    #[wasm_bindgen(method, js_name = isSessionSupported)]
    fn js_is_session_supported(this: &XrSystem, mode: &str) -> Promise;

    #[wasm_bindgen(method, js_name = requestSession)]
    fn js_request_session(this: &XrSystem, mode: &str, options: &JsValue) -> Promise;

    #[wasm_bindgen(js_name = XRSession, extends = web_sys::EventTarget)]
    #[derive(Clone, Debug)]
    pub type XrSession;

    #[wasm_bindgen(method, js_name = requestReferenceSpace)]
    fn js_request_reference_space(this: &XrSession, kind: &str) -> Promise;

    #[wasm_bindgen(method, js_name = requestHitTestSource)]
    fn js_request_hit_test_source(this: &XrSession, options: &JsValue) -> Promise;

    #[wasm_bindgen(method, js_name = end)]
    fn js_end(this: &XrSession) -> Promise;

    #[wasm_bindgen(js_name = XRReferenceSpace)]
    #[derive(Clone, Debug)]
    pub type XrReferenceSpace;

    #[wasm_bindgen(js_name = XRHitTestSource)]
    #[derive(Clone, Debug)]
    pub type XrHitTestSource;

    #[wasm_bindgen(js_name = XRFrame)]
    #[derive(Clone, Debug)]
    pub type XrFrame;

    #[wasm_bindgen(method, js_name = getHitTestResults)]
    fn js_get_hit_test_results(this: &XrFrame, source: &XrHitTestSource) -> Array;

    #[wasm_bindgen(js_name = XRHitTestResult)]
    pub type XrHitTestResult;

    #[wasm_bindgen(method, js_name = getPose)]
    fn js_get_pose(this: &XrHitTestResult, base: &XrReferenceSpace) -> Option<XrPose>;

    #[wasm_bindgen(js_name = XRPose)]
    pub type XrPose;

    #[wasm_bindgen(method, getter)]
    fn transform(this: &XrPose) -> XrRigidTransform;

    #[wasm_bindgen(js_name = XRRigidTransform)]
    pub type XrRigidTransform;

    #[wasm_bindgen(method, getter)]
    fn matrix(this: &XrRigidTransform) -> Float32Array;
}

/// Best-effort text of a rejected promise value
pub fn js_error_message(value: &JsValue) -> String {
    if let Some(err) = value.dyn_ref::<js_sys::Error>() {
        return String::from(err.message());
    }
    value.as_string().unwrap_or_else(|| format!("{value:?}"))
}

fn options(entries: &[(&str, &JsValue)]) -> Result<JsValue, JsValue> {
    let obj = Object::new();
    for (key, value) in entries {
        Reflect::set(&obj, &JsValue::from_str(key), value)?;
    }
    Ok(obj.into())
}

/// `navigator.xr`, if the browser has one
pub struct WebXr {
    system: Option<XrSystem>,
}

impl WebXr {
    pub fn from_navigator() -> Self {
        let system = web_sys::window()
            .and_then(|w| Reflect::get(&w.navigator(), &JsValue::from_str("xr")).ok())
            .filter(|xr| !xr.is_undefined() && !xr.is_null())
            .map(|xr| xr.unchecked_into::<XrSystem>());
        Self { system }
    }

    fn system(&self) -> Result<&XrSystem, SessionError> {
        self.system.as_ref().ok_or(SessionError::Unavailable)
    }
}

impl XrRuntime for WebXr {
    type Session = XrSession;

    fn is_available(&self) -> bool {
        self.system.is_some()
    }

    async fn is_session_supported(&self, mode: SessionMode) -> Result<bool, SessionError> {
        let promise = self.system()?.js_is_session_supported(mode.as_str());
        let supported = JsFuture::from(promise)
            .await
            .map_err(|e| SessionError::Rejected(js_error_message(&e)))?;
        Ok(supported.as_bool().unwrap_or(false))
    }

    async fn request_session(
        &self,
        mode: SessionMode,
        required_features: &[SessionFeature],
    ) -> Result<XrSession, SessionError> {
        let features: JsValue = required_features
            .iter()
            .map(|f| JsValue::from_str(f.as_str()))
            .collect::<Array>()
            .into();
        let init = options(&[("requiredFeatures", &features)])
            .map_err(|e| SessionError::Rejected(js_error_message(&e)))?;
        let promise = self.system()?.js_request_session(mode.as_str(), &init);
        let session = JsFuture::from(promise).await.map_err(|e| {
            let message = js_error_message(&e);
            if message.contains("NotSupported") {
                SessionError::Unsupported(mode.as_str().to_string())
            } else {
                SessionError::Rejected(message)
            }
        })?;
        Ok(session.unchecked_into())
    }
}

impl XrSessionHandle for XrSession {
    type Space = XrReferenceSpace;
    type Source = XrHitTestSource;

    async fn request_reference_space(&self, kind: ReferenceSpaceType) -> Result<XrReferenceSpace, SessionError> {
        let space = JsFuture::from(self.js_request_reference_space(kind.as_str()))
            .await
            .map_err(|e| SessionError::ReferenceSpace {
                space: kind.as_str().to_string(),
                reason: js_error_message(&e),
            })?;
        Ok(space.unchecked_into())
    }

    async fn request_hit_test_source(&self, space: &XrReferenceSpace) -> Result<XrHitTestSource, HitTestError> {
        let init = options(&[("space", space.as_ref())])
            .map_err(|e| HitTestError::Rejected(js_error_message(&e)))?;
        let source = JsFuture::from(self.js_request_hit_test_source(&init))
            .await
            .map_err(|e| HitTestError::Rejected(js_error_message(&e)))?;
        Ok(source.unchecked_into())
    }

    async fn end(&self) -> Result<(), SessionError> {
        JsFuture::from(self.js_end())
            .await
            .map_err(|e| SessionError::Rejected(js_error_message(&e)))?;
        Ok(())
    }
}

impl HitTestFrame for XrFrame {
    type Source = XrHitTestSource;
    type Space = XrReferenceSpace;
    type Hit = XrHitTestResult;

    fn hit_test_results(&self, source: &XrHitTestSource) -> Vec<XrHitTestResult> {
        self.js_get_hit_test_results(source)
            .iter()
            .map(|hit| hit.unchecked_into::<XrHitTestResult>())
            .collect()
    }

    fn pose(&self, hit: &XrHitTestResult, space: &XrReferenceSpace) -> Option<Pose> {
        let pose = hit.js_get_pose(space)?;
        Pose::from_slice(&pose.transform().matrix().to_vec())
    }
}
