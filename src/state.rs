//! Visualization and turn state
//!
//! All mutable display state lives in one explicit [`VisualizationState`]
//! owned by the orchestrator; components receive it by reference instead of
//! reading ambient globals.

use serde::Serialize;

use crate::levels::{self, LEVELS, Level};

/// Lower zoom bound
pub const ZOOM_MIN: f64 = 0.8;
/// Upper zoom bound
pub const ZOOM_MAX: f64 = 1.35;

/// Phase of the voice-turn state machine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnPhase {
    /// Waiting for a mic press
    Idle,
    /// Recording session open
    Listening,
    /// Clip sent to the ASR service
    Transcribing,
    /// Local numeral interpretation running
    Interpreting,
    /// Remote responder consulted
    Thinking,
    /// Speech output in flight
    Speaking,
}

/// The displayed number scene
#[derive(Debug, Clone)]
pub struct VisualizationState {
    level_index: usize,
    current_value: f64,
    custom_mode: bool,
    equation: String,
    zoom: f64,
    muted: bool,
}

/// Serializable snapshot sent to the remote responder
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StateSnapshot {
    pub level_value: u64,
    pub cn: String,
    pub unit: String,
    pub zoom: f64,
}

impl Default for VisualizationState {
    #[allow(clippy::cast_precision_loss)]
    fn default() -> Self {
        Self {
            level_index: 0,
            current_value: LEVELS[0].value as f64,
            custom_mode: false,
            equation: String::new(),
            zoom: 1.0,
            muted: false,
        }
    }
}

impl VisualizationState {
    /// Currently displayed value (canonical or custom)
    #[must_use]
    pub const fn current_value(&self) -> f64 {
        self.current_value
    }

    /// The canonical level the display is anchored to
    #[must_use]
    pub const fn level(&self) -> &'static Level {
        &LEVELS[self.level_index]
    }

    /// Whether the displayed value left the canonical ladder
    #[must_use]
    pub const fn is_custom(&self) -> bool {
        self.custom_mode
    }

    /// Current equation line, if an arithmetic result is displayed
    #[must_use]
    pub fn equation(&self) -> Option<&str> {
        if self.equation.is_empty() { None } else { Some(self.equation.as_str()) }
    }

    #[must_use]
    pub const fn zoom(&self) -> f64 {
        self.zoom
    }

    #[must_use]
    pub const fn is_muted(&self) -> bool {
        self.muted
    }

    /// Flip the mute flag, returning the new value
    pub const fn toggle_muted(&mut self) -> bool {
        self.muted = !self.muted;
        self.muted
    }

    /// Clamp and apply a zoom factor
    pub fn set_zoom(&mut self, zoom: f64) {
        self.zoom = zoom.clamp(ZOOM_MIN, ZOOM_MAX);
    }

    /// Snap to the canonical level nearest `value`, leaving custom mode
    #[allow(clippy::cast_precision_loss)]
    pub fn show_level(&mut self, value: f64) -> &'static Level {
        self.level_index = levels::nearest_index(value);
        self.current_value = LEVELS[self.level_index].value as f64;
        self.custom_mode = false;
        self.equation.clear();
        &LEVELS[self.level_index]
    }

    /// Display an arbitrary value with its equation line
    pub fn set_custom(&mut self, value: f64, equation: String) {
        self.current_value = value;
        self.custom_mode = true;
        self.equation = equation;
    }

    /// Advance to the next canonical level, wrapping
    #[allow(clippy::cast_precision_loss)]
    pub fn next_level(&mut self) -> &'static Level {
        self.level_index = (self.level_index + 1) % LEVELS.len();
        self.current_value = LEVELS[self.level_index].value as f64;
        self.custom_mode = false;
        self.equation.clear();
        &LEVELS[self.level_index]
    }

    /// Step back to the previous canonical level, wrapping
    #[allow(clippy::cast_precision_loss)]
    pub fn prev_level(&mut self) -> &'static Level {
        self.level_index = (self.level_index + LEVELS.len() - 1) % LEVELS.len();
        self.current_value = LEVELS[self.level_index].value as f64;
        self.custom_mode = false;
        self.equation.clear();
        &LEVELS[self.level_index]
    }

    /// Unit badge for the displayed value (canonical or custom)
    #[must_use]
    pub fn current_unit(&self) -> &'static str {
        if self.custom_mode {
            levels::unit_for(self.current_value)
        } else {
            self.level().unit
        }
    }

    /// Chinese reading of the displayed value
    #[must_use]
    pub fn current_reading(&self) -> String {
        if self.custom_mode {
            levels::to_chinese(self.current_value)
        } else {
            self.level().cn.to_string()
        }
    }

    /// Canonical spoken phrase for the displayed value ("一万颗糖")
    #[must_use]
    pub fn current_phrase(&self) -> String {
        format!("{}颗糖", self.current_reading())
    }

    /// Snapshot for the responder payload (always the anchored level)
    #[must_use]
    pub fn snapshot(&self) -> StateSnapshot {
        let level = self.level();
        StateSnapshot {
            level_value: level.value,
            cn: level.cn.to_string(),
            unit: level.unit.to_string(),
            zoom: self.zoom,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zoom_is_clamped() {
        let mut state = VisualizationState::default();
        state.set_zoom(5.0);
        assert!((state.zoom() - ZOOM_MAX).abs() < f64::EPSILON);
        state.set_zoom(0.1);
        assert!((state.zoom() - ZOOM_MIN).abs() < f64::EPSILON);
        state.set_zoom(1.1);
        assert!((state.zoom() - 1.1).abs() < f64::EPSILON);
    }

    #[test]
    fn navigation_wraps_and_clears_custom_mode() {
        let mut state = VisualizationState::default();
        state.set_custom(15_000.0, "10,000 + 5,000 = 15,000".to_string());
        assert!(state.is_custom());
        assert!(state.equation().is_some());

        state.prev_level();
        assert!(!state.is_custom());
        assert_eq!(state.equation(), None);
        assert_eq!(state.level().value, 10_000_000_000_000_000);

        state.next_level();
        assert_eq!(state.level().value, 10);
    }

    #[test]
    fn show_level_snaps_to_nearest() {
        let mut state = VisualizationState::default();
        state.set_custom(999.0, String::new());
        let level = state.show_level(999.0);
        assert_eq!(level.value, 1_000);
        assert!(!state.is_custom());
    }

    #[test]
    fn phrase_follows_custom_value() {
        let mut state = VisualizationState::default();
        assert_eq!(state.current_phrase(), "十颗糖");
        state.set_custom(15_000.0, String::new());
        assert_eq!(state.current_phrase(), "一万五千颗糖");
    }

    #[test]
    fn unit_badge_follows_custom_value() {
        let mut state = VisualizationState::default();
        assert_eq!(state.current_unit(), "");
        state.set_custom(15_000.0, String::new());
        assert_eq!(state.current_unit(), "万");
        state.set_custom(2e13, String::new());
        assert_eq!(state.current_unit(), "万亿");
        state.show_level(100_000_000.0);
        assert_eq!(state.current_unit(), "亿");
    }
}
