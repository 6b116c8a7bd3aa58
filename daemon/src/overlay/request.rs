//! Overlay requests and their payloads

/// Which notification an overlay belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OverlayKind {
    CapsLock,
    InputSource,
}

impl std::fmt::Display for OverlayKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OverlayKind::CapsLock => write!(f, "caps_lock"),
            OverlayKind::InputSource => write!(f, "input_source"),
        }
    }
}

/// Symbol drawn above the text
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IconKind {
    CapsLockOn,
    CapsLockOff,
    Globe,
}

impl IconKind {
    /// SF Symbols name
    pub fn symbol_name(self) -> &'static str {
        match self {
            IconKind::CapsLockOn => "capslock.fill",
            IconKind::CapsLockOff => "capslock",
            IconKind::Globe => "globe",
        }
    }
}

/// Tint applied to the icon
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccentColor {
    /// System blue
    Highlight,
    /// Secondary label color
    Secondary,
}

/// What the overlay shows
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OverlayPayload {
    pub text: String,
    pub icon: IconKind,
    pub accent: AccentColor,
}

impl OverlayPayload {
    /// Payload for a Caps Lock change
    pub fn caps_lock(active: bool) -> Self {
        if active {
            Self {
                text: "Caps Lock ON".to_string(),
                icon: IconKind::CapsLockOn,
                accent: AccentColor::Highlight,
            }
        } else {
            Self {
                text: "Caps Lock OFF".to_string(),
                icon: IconKind::CapsLockOff,
                accent: AccentColor::Secondary,
            }
        }
    }

    /// Payload for an input source change
    pub fn input_source(name: &str) -> Self {
        Self {
            text: name.to_string(),
            icon: IconKind::Globe,
            accent: AccentColor::Secondary,
        }
    }
}

/// Identifies one show request; later requests get larger values
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Generation(u64);

impl Generation {
    /// The generation after this one
    pub fn next(self) -> Self {
        Self(self.0 + 1)
    }

    pub fn get(self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for Generation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// One show request. Never mutated; superseded by a later request instead.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OverlayRequest {
    pub generation: Generation,
    pub kind: OverlayKind,
    pub payload: OverlayPayload,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_caps_lock_payloads() {
        let on = OverlayPayload::caps_lock(true);
        assert_eq!(on.text, "Caps Lock ON");
        assert_eq!(on.icon.symbol_name(), "capslock.fill");
        assert_eq!(on.accent, AccentColor::Highlight);

        let off = OverlayPayload::caps_lock(false);
        assert_eq!(off.text, "Caps Lock OFF");
        assert_eq!(off.icon.symbol_name(), "capslock");
        assert_eq!(off.accent, AccentColor::Secondary);
    }

    #[test]
    fn test_input_source_payload() {
        let payload = OverlayPayload::input_source("German");
        assert_eq!(payload.text, "German");
        assert_eq!(payload.icon, IconKind::Globe);
    }

    #[test]
    fn test_generations_increase() {
        let first = Generation::default().next();
        let second = first.next();
        assert!(second > first);
        assert_eq!(second.get(), 2);
        assert_eq!(second.to_string(), "#2");
    }
}
