//! Display names for keyboard input sources
//!
//! Resolution order: the OS-localized name, then a table of well known
//! layout identifiers, then a name derived from the identifier itself,
//! then the literal "Unknown".

/// Returned when nothing better can be derived
pub const UNKNOWN_SOURCE: &str = "Unknown";

/// Layout identifiers with a hand-picked display name
const KNOWN_LAYOUTS: &[(&str, &str)] = &[
    ("com.apple.keylayout.US", "English (US)"),
    ("com.apple.keylayout.ABC", "ABC"),
    ("com.apple.keylayout.British", "English (UK)"),
    ("com.apple.keylayout.Canadian", "English (Canada)"),
    ("com.apple.keylayout.Spanish", "Spanish"),
    ("com.apple.keylayout.French", "French"),
    ("com.apple.keylayout.German", "German"),
    ("com.apple.keylayout.Italian", "Italian"),
    ("com.apple.keylayout.Japanese", "Japanese"),
    ("com.apple.keylayout.Korean", "Korean"),
    ("com.apple.keylayout.ChineseSimplified", "Chinese (Simplified)"),
    ("com.apple.keylayout.ChineseTraditional", "Chinese (Traditional)"),
];

/// Raw properties read from the current input source
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InputSourceInfo {
    /// `kTISPropertyLocalizedName`
    pub localized_name: Option<String>,
    /// `kTISPropertyInputSourceID`, e.g. `com.apple.keylayout.US`
    pub source_id: Option<String>,
}

impl InputSourceInfo {
    /// Source known only by its identifier
    pub fn from_id(source_id: impl Into<String>) -> Self {
        Self {
            localized_name: None,
            source_id: Some(source_id.into()),
        }
    }
}

/// Resolve a human readable name. Never returns an empty string.
pub fn resolve_display_name(info: &InputSourceInfo) -> String {
    if let Some(name) = non_blank(info.localized_name.as_deref()) {
        return name.to_string();
    }

    let Some(id) = non_blank(info.source_id.as_deref()) else {
        return UNKNOWN_SOURCE.to_string();
    };

    if let Some(name) = mapped_name(id) {
        return name.to_string();
    }

    derived_name(id).unwrap_or_else(|| UNKNOWN_SOURCE.to_string())
}

/// Look an identifier up in the static table
pub fn mapped_name(id: &str) -> Option<&'static str> {
    KNOWN_LAYOUTS
        .iter()
        .find(|(known, _)| *known == id)
        .map(|(_, name)| *name)
}

/// Last dot-separated component with underscores turned into spaces
fn derived_name(id: &str) -> Option<String> {
    let last = id.rsplit('.').next()?;
    let name = last.replace('_', " ");
    let name = name.trim();

    if name.is_empty() {
        None
    } else {
        Some(name.to_string())
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_localized_name_wins() {
        let info = InputSourceInfo {
            localized_name: Some("U.S.".to_string()),
            source_id: Some("com.apple.keylayout.US".to_string()),
        };
        assert_eq!(resolve_display_name(&info), "U.S.");
    }

    #[test]
    fn test_mapped_identifier_without_localized_name() {
        let info = InputSourceInfo::from_id("com.apple.keylayout.British");
        assert_eq!(resolve_display_name(&info), "English (UK)");

        let blank = InputSourceInfo {
            localized_name: Some("  ".to_string()),
            source_id: Some("com.apple.keylayout.ChineseSimplified".to_string()),
        };
        assert_eq!(resolve_display_name(&blank), "Chinese (Simplified)");
    }

    #[test]
    fn test_unmapped_identifier_uses_last_segment() {
        let info = InputSourceInfo::from_id("com.apple.keylayout.Russian_Phonetic");
        assert_eq!(resolve_display_name(&info), "Russian Phonetic");

        let info = InputSourceInfo::from_id("org.sil.ukelele.keyboardlayout.my_layout");
        assert_eq!(resolve_display_name(&info), "my layout");

        let info = InputSourceInfo::from_id("Dvorak");
        assert_eq!(resolve_display_name(&info), "Dvorak");
    }

    #[test]
    fn test_unresolvable_source_is_unknown() {
        assert_eq!(resolve_display_name(&InputSourceInfo::default()), UNKNOWN_SOURCE);
        assert_eq!(
            resolve_display_name(&InputSourceInfo::from_id("com.example.")),
            UNKNOWN_SOURCE
        );
        assert_eq!(
            resolve_display_name(&InputSourceInfo::from_id("com.example.__")),
            UNKNOWN_SOURCE
        );
    }

    #[test]
    fn test_table_is_complete() {
        assert_eq!(KNOWN_LAYOUTS.len(), 12);
        assert_eq!(mapped_name("com.apple.keylayout.ABC"), Some("ABC"));
        assert_eq!(mapped_name("com.apple.keylayout.Dvorak"), None);
    }
}
