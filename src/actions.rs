//! Display actions from the remote responder
//!
//! The responder's reply carries loosely-typed JSON action objects. They are
//! converted to a closed [`Action`] variant up front; anything malformed or
//! unrecognized becomes [`Action::Noop`] so one bad action never aborts the
//! rest of the batch.

use serde_json::Value;

use crate::state::VisualizationState;

/// A validated display action
#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    /// Snap the display to the canonical level nearest this value
    ShowLevel(f64),
    /// Transient celebration effect (delegated to the rendering layer)
    Sparkle,
    /// Set the zoom factor, clamped to the display bounds
    SetZoom(f64),
    /// Unknown or malformed action, skipped
    Noop,
}

impl Action {
    /// Convert one raw JSON action object, mapping anything invalid to `Noop`
    #[must_use]
    pub fn from_value(value: &Value) -> Self {
        let Some(obj) = value.as_object() else {
            return Self::Noop;
        };
        match obj.get("type").and_then(Value::as_str) {
            Some("sparkle") => Self::Sparkle,
            Some("showLevel") => obj
                .get("value")
                .and_then(Value::as_f64)
                .filter(|v| v.is_finite())
                .map_or(Self::Noop, Self::ShowLevel),
            Some("setZoom") => obj
                .get("value")
                .and_then(Value::as_f64)
                .filter(|v| v.is_finite())
                .map_or(Self::Noop, Self::SetZoom),
            _ => Self::Noop,
        }
    }
}

/// Convert a raw action array, preserving order
#[must_use]
pub fn actions_from_values(values: &[Value]) -> Vec<Action> {
    values.iter().map(Action::from_value).collect()
}

/// Summary of one applied action batch
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Applied {
    /// Celebration effects requested
    pub sparkles: usize,
    /// Level changes performed
    pub level_changes: usize,
    /// Zoom updates performed
    pub zoom_changes: usize,
    /// Actions skipped as invalid
    pub skipped: usize,
}

/// Apply a batch of actions in order
///
/// Application is partial: invalid entries are counted and skipped, the
/// remaining actions still run.
pub fn apply_actions(state: &mut VisualizationState, actions: &[Action]) -> Applied {
    let mut applied = Applied::default();
    for action in actions {
        match action {
            Action::ShowLevel(value) => {
                let level = state.show_level(*value);
                tracing::debug!(requested = value, level = level.value, "show level");
                applied.level_changes += 1;
            }
            Action::Sparkle => applied.sparkles += 1,
            Action::SetZoom(value) => {
                state.set_zoom(*value);
                applied.zoom_changes += 1;
            }
            Action::Noop => applied.skipped += 1,
        }
    }
    applied
}
