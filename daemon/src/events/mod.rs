//! Change events
//!
//! Emitted by the observers and consumed by the coordinator, which decides
//! whether an overlay is shown for them.

use serde::{Deserialize, Serialize};

use crate::overlay::{OverlayKind, OverlayPayload};

/// A user-visible keyboard state change
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ChangeEvent {
    /// Caps Lock toggled
    CapsLockChanged { active: bool },

    /// A different keyboard input source was selected
    InputSourceChanged {
        /// Display name of the new source
        name: String,
    },
}

impl ChangeEvent {
    /// Overlay kind used to present this event
    pub fn overlay_kind(&self) -> OverlayKind {
        match self {
            ChangeEvent::CapsLockChanged { .. } => OverlayKind::CapsLock,
            ChangeEvent::InputSourceChanged { .. } => OverlayKind::InputSource,
        }
    }

    pub fn payload(&self) -> OverlayPayload {
        match self {
            ChangeEvent::CapsLockChanged { active } => OverlayPayload::caps_lock(*active),
            ChangeEvent::InputSourceChanged { name } => OverlayPayload::input_source(name),
        }
    }
}

impl std::fmt::Display for ChangeEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ChangeEvent::CapsLockChanged { active: true } => write!(f, "CAPS_LOCK_ON"),
            ChangeEvent::CapsLockChanged { active: false } => write!(f, "CAPS_LOCK_OFF"),
            ChangeEvent::InputSourceChanged { name } => {
                write!(f, "INPUT_SOURCE_CHANGED ({})", name)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::overlay::IconKind;

    #[test]
    fn test_event_serialization() {
        let event = ChangeEvent::InputSourceChanged {
            name: "German".to_string(),
        };
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("input_source_changed"));
        assert!(json.contains("German"));
    }

    #[test]
    fn test_event_deserialization() {
        let json = r#"{"type":"caps_lock_changed","active":true}"#;
        let event: ChangeEvent = serde_json::from_str(json).unwrap();
        assert_eq!(event, ChangeEvent::CapsLockChanged { active: true });
    }

    #[test]
    fn test_event_payloads() {
        let caps = ChangeEvent::CapsLockChanged { active: false };
        assert_eq!(caps.overlay_kind(), OverlayKind::CapsLock);
        assert_eq!(caps.payload().text, "Caps Lock OFF");
        assert_eq!(caps.to_string(), "CAPS_LOCK_OFF");

        let source = ChangeEvent::InputSourceChanged {
            name: "Pinyin - Simplified".to_string(),
        };
        assert_eq!(source.overlay_kind(), OverlayKind::InputSource);
        assert_eq!(source.payload().icon, IconKind::Globe);
    }
}
