use serde::{Deserialize, Serialize};

mod config;

pub use config::{AppConfig, ArMode, ArScale, ExportConfig, ModelViewerAttributes, SessionConfig};

/// Масштаб размещённой модели (1 единица = 1 м, робот около 20 см)
pub const PLACEMENT_SCALE: f32 = 0.2;

/// Имя корневого узла модели
pub const MODEL_NAME: &str = "clawd";

/// MIME-тип экспортируемого бинарного glTF
pub const GLB_MIME: &str = "model/gltf-binary";

/// Цвет материала в виде 0xRRGGBB (sRGB)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Color(pub u32);

impl Color {
    pub const RED: Color = Color(0xff0000);
    pub const BLACK: Color = Color(0x000000);

    /// Компоненты sRGB в диапазоне 0..=1
    pub fn rgb(self) -> [f32; 3] {
        let r = ((self.0 >> 16) & 0xff) as f32 / 255.0;
        let g = ((self.0 >> 8) & 0xff) as f32 / 255.0;
        let b = (self.0 & 0xff) as f32 / 255.0;
        [r, g, b]
    }

    /// Линейный RGBA для `baseColorFactor` в glTF
    pub fn to_linear_rgba(self) -> [f32; 4] {
        let [r, g, b] = self.rgb();
        [srgb_to_linear(r), srgb_to_linear(g), srgb_to_linear(b), 1.0]
    }
}

fn srgb_to_linear(c: f32) -> f32 {
    if c <= 0.04045 {
        c / 12.92
    } else {
        ((c + 0.055) / 1.055).powf(2.4)
    }
}

/// Роль детали в модели
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PartKind {
    Body,
    Eye,
    Leg,
    Arm,
}

/// Деталь модели в форме параллелепипеда
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PartSpec {
    pub name: &'static str,
    pub kind: PartKind,
    /// ширина, высота, глубина
    pub size: [f32; 3],
    pub color: Color,
    /// Смещение центра детали от начала координат модели
    pub offset: [f32; 3],
}

impl PartSpec {
    pub fn width(&self) -> f32 {
        self.size[0]
    }

    pub fn height(&self) -> f32 {
        self.size[1]
    }

    pub fn depth(&self) -> f32 {
        self.size[2]
    }
}

const BODY_SIZE: [f32; 3] = [1.2, 0.8, 0.4];
const EYE_SIZE: [f32; 3] = [0.15, 0.15, 0.1];
const LEG_SIZE: [f32; 3] = [0.15, 0.2, 0.15];
const ARM_SIZE: [f32; 3] = [0.2, 0.3, 0.2];

/// Центр корпуса над ногами: высота ноги + половина высоты корпуса
const BODY_Y: f32 = 0.6;

/// Таблица деталей: корпус, два глаза, четыре ноги, две руки
pub static PARTS: [PartSpec; 9] = [
    PartSpec {
        name: "body",
        kind: PartKind::Body,
        size: BODY_SIZE,
        color: Color::RED,
        offset: [0.0, BODY_Y, 0.0],
    },
    PartSpec {
        name: "eye_left",
        kind: PartKind::Eye,
        size: EYE_SIZE,
        color: Color::BLACK,
        offset: [-0.3, 0.75, 0.2],
    },
    PartSpec {
        name: "eye_right",
        kind: PartKind::Eye,
        size: EYE_SIZE,
        color: Color::BLACK,
        offset: [0.3, 0.75, 0.2],
    },
    PartSpec {
        name: "leg_0",
        kind: PartKind::Leg,
        size: LEG_SIZE,
        color: Color::RED,
        offset: [-0.45, 0.1, 0.0],
    },
    PartSpec {
        name: "leg_1",
        kind: PartKind::Leg,
        size: LEG_SIZE,
        color: Color::RED,
        offset: [-0.15, 0.1, 0.0],
    },
    PartSpec {
        name: "leg_2",
        kind: PartKind::Leg,
        size: LEG_SIZE,
        color: Color::RED,
        offset: [0.15, 0.1, 0.0],
    },
    PartSpec {
        name: "leg_3",
        kind: PartKind::Leg,
        size: LEG_SIZE,
        color: Color::RED,
        offset: [0.45, 0.1, 0.0],
    },
    PartSpec {
        name: "arm_left",
        kind: PartKind::Arm,
        size: ARM_SIZE,
        color: Color::RED,
        offset: [-0.7, BODY_Y, 0.0],
    },
    PartSpec {
        name: "arm_right",
        kind: PartKind::Arm,
        size: ARM_SIZE,
        color: Color::RED,
        offset: [0.7, BODY_Y, 0.0],
    },
];

/// Тип AR-сессии
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum SessionMode {
    #[default]
    #[serde(rename = "immersive-ar")]
    ImmersiveAr,
    #[serde(rename = "immersive-vr")]
    ImmersiveVr,
    #[serde(rename = "inline")]
    Inline,
}

impl SessionMode {
    pub fn as_str(self) -> &'static str {
        match self {
            SessionMode::ImmersiveAr => "immersive-ar",
            SessionMode::ImmersiveVr => "immersive-vr",
            SessionMode::Inline => "inline",
        }
    }
}

/// Возможность сессии, передаётся в `requiredFeatures`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SessionFeature {
    HitTest,
    Local,
    DomOverlay,
    Anchors,
}

impl SessionFeature {
    pub fn as_str(self) -> &'static str {
        match self {
            SessionFeature::HitTest => "hit-test",
            SessionFeature::Local => "local",
            SessionFeature::DomOverlay => "dom-overlay",
            SessionFeature::Anchors => "anchors",
        }
    }
}

/// Система координат для вычисления поз
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ReferenceSpaceType {
    /// Привязана к миру, для трекинга и поз
    Local,
    /// Привязана к устройству, начало луча hit-test
    Viewer,
    LocalFloor,
}

impl ReferenceSpaceType {
    pub fn as_str(self) -> &'static str {
        match self {
            ReferenceSpaceType::Local => "local",
            ReferenceSpaceType::Viewer => "viewer",
            ReferenceSpaceType::LocalFloor => "local-floor",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn roundtrip<T: Serialize + for<'de> Deserialize<'de> + PartialEq + std::fmt::Debug>(val: &T) {
        let json = serde_json::to_string(val).expect("serialize");
        let back: T = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(*val, back);
    }

    fn count(kind: PartKind) -> usize {
        PARTS.iter().filter(|p| p.kind == kind).count()
    }

    fn part(name: &str) -> &'static PartSpec {
        PARTS.iter().find(|p| p.name == name).expect("part exists")
    }

    // --- Part table ---

    #[test]
    fn test_part_table_composition() {
        assert_eq!(PARTS.len(), 9);
        assert_eq!(count(PartKind::Body), 1);
        assert_eq!(count(PartKind::Eye), 2);
        assert_eq!(count(PartKind::Leg), 4);
        assert_eq!(count(PartKind::Arm), 2);
    }

    #[test]
    fn test_part_names_unique() {
        let mut names: Vec<&str> = PARTS.iter().map(|p| p.name).collect();
        names.sort();
        names.dedup();
        assert_eq!(names.len(), PARTS.len());
    }

    #[test]
    fn test_feet_rest_on_ground() {
        for leg in PARTS.iter().filter(|p| p.kind == PartKind::Leg) {
            let bottom = leg.offset[1] - leg.height() / 2.0;
            assert!(bottom.abs() < 1e-6, "{} bottom at {}", leg.name, bottom);
        }
        let body = part("body");
        let body_bottom = body.offset[1] - body.height() / 2.0;
        assert!((body_bottom - LEG_SIZE[1]).abs() < 1e-6);
    }

    #[test]
    fn test_eyes_protrude_from_front_face() {
        let body = part("body");
        for eye in PARTS.iter().filter(|p| p.kind == PartKind::Eye) {
            assert!(eye.offset[2] >= body.depth() / 2.0);
        }
    }

    #[test]
    fn test_legs_symmetric() {
        let mut xs: Vec<f32> = PARTS
            .iter()
            .filter(|p| p.kind == PartKind::Leg)
            .map(|p| p.offset[0])
            .collect();
        xs.sort_by(|a, b| a.partial_cmp(b).unwrap());
        for (a, b) in xs.iter().zip(xs.iter().rev()) {
            assert!((a + b).abs() < 1e-6);
        }
    }

    #[test]
    fn test_arms_clear_body() {
        let body = part("body");
        for arm in PARTS.iter().filter(|p| p.kind == PartKind::Arm) {
            assert!(arm.offset[0].abs() >= body.width() / 2.0 + arm.width() / 2.0 - 1e-6);
            assert_eq!(arm.offset[1], body.offset[1]);
        }
    }

    // --- Color ---

    #[test]
    fn test_color_linear_primaries() {
        assert_eq!(Color::RED.to_linear_rgba(), [1.0, 0.0, 0.0, 1.0]);
        assert_eq!(Color::BLACK.to_linear_rgba(), [0.0, 0.0, 0.0, 1.0]);
        assert_eq!(Color(0xffffff).to_linear_rgba(), [1.0, 1.0, 1.0, 1.0]);
    }

    #[test]
    fn test_color_linear_midtone() {
        let [r, _, _, _] = Color(0x808080).to_linear_rgba();
        assert!((r - 0.2158605).abs() < 1e-4);
    }

    #[test]
    fn test_color_serde() {
        roundtrip(&Color::RED);
        assert_eq!(serde_json::to_string(&Color::RED).unwrap(), "16711680");
    }

    // --- AR vocabulary ---

    #[test]
    fn test_session_mode_serde() {
        let json = serde_json::to_string(&SessionMode::ImmersiveAr).unwrap();
        assert_eq!(json, r#""immersive-ar""#);
        roundtrip(&SessionMode::Inline);
        assert_eq!(SessionMode::default().as_str(), "immersive-ar");
    }

    #[test]
    fn test_feature_and_space_names_match_serde() {
        for f in [
            SessionFeature::HitTest,
            SessionFeature::Local,
            SessionFeature::DomOverlay,
            SessionFeature::Anchors,
        ] {
            let json = serde_json::to_string(&f).unwrap();
            assert_eq!(json, format!("\"{}\"", f.as_str()));
        }
        for s in [
            ReferenceSpaceType::Local,
            ReferenceSpaceType::Viewer,
            ReferenceSpaceType::LocalFloor,
        ] {
            let json = serde_json::to_string(&s).unwrap();
            assert_eq!(json, format!("\"{}\"", s.as_str()));
        }
    }
}
