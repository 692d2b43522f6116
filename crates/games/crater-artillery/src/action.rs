use std::f32::consts::{FRAC_PI_2, PI};

use serde::{Deserialize, Serialize};

use crater_core::game_trait::ActionError;

use crate::config::TurnConfig;

/// A player action as it travels through the relay.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum Action {
    /// Walk `distance` pixels (the configured default when absent).
    Move {
        direction: f32,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        distance: Option<f32>,
    },
    Jump {
        direction: f32,
    },
    /// Turn the active unit's aim without ending the turn.
    Aim {
        angle: f32,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        facing_right: Option<bool>,
    },
    Shoot {
        angle: f32,
        power: f32,
    },
}

impl Action {
    /// Decode and range-check a payload. Nothing is clamped: a value out of
    /// range rejects the whole action.
    pub fn parse(value: &serde_json::Value, config: &TurnConfig) -> Result<Self, ActionError> {
        let action: Self = serde_json::from_value(value.clone())
            .map_err(|e| ActionError::Malformed(e.to_string()))?;
        action.validate(config)?;
        Ok(action)
    }

    pub fn validate(&self, config: &TurnConfig) -> Result<(), ActionError> {
        match *self {
            Self::Move {
                direction,
                distance,
            } => {
                check("direction", direction, |d| d == 1.0 || d == -1.0)?;
                if let Some(distance) = distance {
                    check("distance", distance, |d| d > 0.0 && d <= config.max_move_distance)?;
                }
            },
            Self::Jump { direction } => {
                check("direction", direction, |d| d == 1.0 || d == -1.0 || d == 0.0)?;
            },
            Self::Aim { angle, .. } => check("angle", angle, valid_angle)?,
            Self::Shoot { angle, power } => {
                check("angle", angle, valid_angle)?;
                check("power", power, |p| p > 0.0 && p <= 1.0)?;
            },
        }
        Ok(())
    }

    pub fn to_value(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or(serde_json::Value::Null)
    }
}

/// Aim angles live in the upper hemisphere, `-PI` (left) to `0` (right).
fn valid_angle(angle: f32) -> bool {
    (-PI..=0.0).contains(&angle)
}

fn check(field: &'static str, value: f32, ok: impl Fn(f32) -> bool) -> Result<(), ActionError> {
    if value.is_finite() && ok(value) {
        Ok(())
    } else {
        Err(ActionError::OutOfRange { field, value })
    }
}

/// Facing implied by an aim angle.
pub fn faces_right(angle: f32) -> bool {
    angle > -FRAC_PI_2
}
