use serde::{Deserialize, Serialize};

use crate::{ReferenceSpaceType, SessionFeature, SessionMode};

/// Настройки приложения, передаются со страницы в виде JSON
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    pub session: SessionConfig,
    pub viewer: ModelViewerAttributes,
    pub export: ExportConfig,
}

impl AppConfig {
    /// Отсутствующие поля получают значения по умолчанию
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    pub mode: SessionMode,
    pub required_features: Vec<SessionFeature>,
    /// Пространство поз модели и прицела
    pub world_space: ReferenceSpaceType,
    /// Начало луча hit-test
    pub hit_test_space: ReferenceSpaceType,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            mode: SessionMode::ImmersiveAr,
            required_features: vec![SessionFeature::HitTest],
            world_space: ReferenceSpaceType::Local,
            hit_test_space: ReferenceSpaceType::Viewer,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportConfig {
    /// `asset.generator` экспортируемого glTF
    pub generator: String,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            generator: format!("clawd-ar v{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

/// Резервный AR-режим model-viewer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ArMode {
    Webxr,
    SceneViewer,
    QuickLook,
}

impl ArMode {
    pub fn as_str(self) -> &'static str {
        match self {
            ArMode::Webxr => "webxr",
            ArMode::SceneViewer => "scene-viewer",
            ArMode::QuickLook => "quick-look",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ArScale {
    #[default]
    Auto,
    Fixed,
}

/// Атрибуты элемента `<model-viewer>` для просмотра без AR-сессии
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelViewerAttributes {
    pub auto_rotate: bool,
    pub camera_controls: bool,
    pub ar: bool,
    pub ar_modes: Vec<ArMode>,
    pub ar_scale: ArScale,
}

impl Default for ModelViewerAttributes {
    fn default() -> Self {
        Self {
            auto_rotate: true,
            camera_controls: true,
            ar: true,
            ar_modes: vec![ArMode::Webxr, ArMode::SceneViewer, ArMode::QuickLook],
            ar_scale: ArScale::Auto,
        }
    }
}

impl ModelViewerAttributes {
    /// Пары HTML-атрибутов; у булевых атрибутов пустое значение
    pub fn to_attributes(&self) -> Vec<(String, String)> {
        let mut attrs = Vec::new();
        let flags = [
            ("auto-rotate", self.auto_rotate),
            ("camera-controls", self.camera_controls),
            ("ar", self.ar),
        ];
        for (name, on) in flags {
            if on {
                attrs.push((name.to_string(), String::new()));
            }
        }
        if self.ar && !self.ar_modes.is_empty() {
            let modes: Vec<&str> = self.ar_modes.iter().map(|m| m.as_str()).collect();
            attrs.push(("ar-modes".to_string(), modes.join(" ")));
        }
        if self.ar {
            let scale = match self.ar_scale {
                ArScale::Auto => "auto",
                ArScale::Fixed => "fixed",
            };
            attrs.push(("ar-scale".to_string(), scale.to_string()));
        }
        attrs
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn attr<'a>(attrs: &'a [(String, String)], name: &str) -> Option<&'a str> {
        attrs.iter().find(|(n, _)| n == name).map(|(_, v)| v.as_str())
    }

    #[test]
    fn test_default_session_config() {
        let cfg = AppConfig::default();
        assert_eq!(cfg.session.mode, SessionMode::ImmersiveAr);
        assert_eq!(cfg.session.required_features, vec![SessionFeature::HitTest]);
        assert_eq!(cfg.session.world_space, ReferenceSpaceType::Local);
        assert_eq!(cfg.session.hit_test_space, ReferenceSpaceType::Viewer);
    }

    #[test]
    fn test_from_json_partial() {
        let cfg = AppConfig::from_json(r#"{"viewer":{"auto_rotate":false}}"#).unwrap();
        assert!(!cfg.viewer.auto_rotate);
        assert!(cfg.viewer.camera_controls);
        assert_eq!(cfg.session, SessionConfig::default());
        assert!(cfg.export.generator.starts_with("clawd-ar"));
    }

    #[test]
    fn test_from_json_empty_object() {
        assert_eq!(AppConfig::from_json("{}").unwrap(), AppConfig::default());
    }

    #[test]
    fn test_from_json_rejects_unknown_mode() {
        assert!(AppConfig::from_json(r#"{"session":{"mode":"immersive-xx"}}"#).is_err());
    }

    #[test]
    fn test_viewer_attributes_default() {
        let attrs = ModelViewerAttributes::default().to_attributes();
        assert_eq!(attr(&attrs, "auto-rotate"), Some(""));
        assert_eq!(attr(&attrs, "camera-controls"), Some(""));
        assert_eq!(attr(&attrs, "ar"), Some(""));
        assert_eq!(attr(&attrs, "ar-modes"), Some("webxr scene-viewer quick-look"));
        assert_eq!(attr(&attrs, "ar-scale"), Some("auto"));
    }

    #[test]
    fn test_viewer_attributes_without_ar() {
        let viewer = ModelViewerAttributes {
            ar: false,
            ..Default::default()
        };
        let attrs = viewer.to_attributes();
        assert_eq!(attr(&attrs, "ar"), None);
        assert_eq!(attr(&attrs, "ar-modes"), None);
        assert_eq!(attr(&attrs, "ar-scale"), None);
    }

    #[test]
    fn test_config_serde_roundtrip() {
        let cfg = AppConfig::default();
        let json = serde_json::to_string(&cfg).unwrap();
        assert!(json.contains(r#""mode":"immersive-ar""#));
        assert!(json.contains(r#""ar_modes":["webxr","scene-viewer","quick-look"]"#));
        assert_eq!(AppConfig::from_json(&json).unwrap(), cfg);
    }
}
