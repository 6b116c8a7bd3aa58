//! Caps Lock flag derivation and change tracking
//!
//! Raw modifier flags arrive as the 64-bit mask macOS attaches to every
//! FlagsChanged event. Only the alpha-shift bit matters here.

/// Alpha-shift (Caps Lock) bit of the CGEventFlags mask
pub const CAPS_LOCK_MASK: u64 = 0x0001_0000;

/// Derive the Caps Lock state from a raw modifier flag mask
pub fn caps_lock_from_bits(bits: u64) -> bool {
    bits & CAPS_LOCK_MASK != 0
}

/// What a single observation means for the owner of the state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Observation {
    /// Same as the previous state; dropped
    Unchanged,
    /// First change inside the startup grace period; recorded but not
    /// surfaced
    Baseline(bool),
    /// A real transition worth telling the user about
    Changed(bool),
}

/// Last known Caps Lock state plus the startup suppression flag
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyFlagState {
    /// Caps Lock is engaged
    pub is_active: bool,
    /// The next change is still treated as the startup baseline
    pub is_first_observation: bool,
}

impl KeyFlagState {
    /// Fresh state seeded with the best known current value
    pub fn new(baseline: bool) -> Self {
        Self {
            is_active: baseline,
            is_first_observation: true,
        }
    }

    /// Fold in a newly derived Caps Lock value
    pub fn observe(&mut self, active: bool) -> Observation {
        if active == self.is_active {
            return Observation::Unchanged;
        }

        self.is_active = active;

        if self.is_first_observation {
            self.is_first_observation = false;
            return Observation::Baseline(active);
        }

        Observation::Changed(active)
    }

    /// Startup grace period is over; every change from now on is surfaced
    pub fn end_grace(&mut self) {
        self.is_first_observation = false;
    }
}

impl Default for KeyFlagState {
    fn default() -> Self {
        Self::new(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_caps_lock_bit() {
        assert!(caps_lock_from_bits(CAPS_LOCK_MASK));
        // Shift + Caps Lock
        assert!(caps_lock_from_bits(0x0002_0000 | CAPS_LOCK_MASK));
        // Shift, Control, Option, Command only
        assert!(!caps_lock_from_bits(0x0002_0000 | 0x0004_0000 | 0x0008_0000 | 0x0010_0000));
        assert!(!caps_lock_from_bits(0));
    }

    #[test]
    fn test_first_change_is_baseline() {
        let mut state = KeyFlagState::new(false);
        assert_eq!(state.observe(false), Observation::Unchanged);
        assert!(state.is_first_observation);

        assert_eq!(state.observe(true), Observation::Baseline(true));
        assert!(state.is_active);
        assert!(!state.is_first_observation);

        // Only one change is swallowed, even inside the grace period
        assert_eq!(state.observe(false), Observation::Changed(false));

        state.end_grace();
        assert_eq!(state.observe(true), Observation::Changed(true));
    }

    #[test]
    fn test_grace_ending_without_changes() {
        let mut state = KeyFlagState::new(false);
        state.end_grace();
        assert!(!state.is_first_observation);
        assert_eq!(state.observe(true), Observation::Changed(true));
    }

    #[test]
    fn test_only_transitions_surface() {
        let mut state = KeyFlagState::new(false);
        state.end_grace();

        let surfaced: Vec<bool> = [true, true, false, false, false, true]
            .into_iter()
            .filter_map(|v| match state.observe(v) {
                Observation::Changed(v) => Some(v),
                _ => None,
            })
            .collect();

        assert_eq!(surfaced, vec![true, false, true]);
    }

    #[test]
    fn test_baseline_seed_matches_os() {
        // Caps Lock was already on when we started: a repeat is not a change
        let mut state = KeyFlagState::new(true);
        state.end_grace();
        assert_eq!(state.observe(true), Observation::Unchanged);
        assert_eq!(state.observe(false), Observation::Changed(false));
    }
}
