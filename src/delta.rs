//! Per-tick delta encoding against the last broadcast snapshot.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::constants::{SYNC_ANG, SYNC_POS, SYNC_VEL};
use crate::state::PlayerState;
use crate::vector::shortest_arc_diff;

/// The subset of a [`PlayerState`] that differs from the last broadcast by
/// more than the corresponding threshold. Fields that didn't change enough
/// are omitted from the wire payload. Also doubles as the payload shape for
/// a debug `updateState` message.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PlayerDelta {
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub x: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub y: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub angle: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub vx: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub vy: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub angular_velocity: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub is_sleeping: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub is_thrusting: Option<bool>,
}

impl PlayerDelta {
    pub fn is_empty(&self) -> bool {
        self.x.is_none()
            && self.y.is_none()
            && self.angle.is_none()
            && self.vx.is_none()
            && self.vy.is_none()
            && self.angular_velocity.is_none()
            && self.is_sleeping.is_none()
            && self.is_thrusting.is_none()
    }
}

/// Tracks, per session, the most recent values actually sent to clients,
/// and computes/merges per-tick deltas against it.
#[derive(Default)]
pub struct DeltaEncoder {
    last_broadcast: HashMap<String, PlayerState>,
}

impl DeltaEncoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Computes the delta for `candidate` against whatever was last sent
    /// for this session. Does not mutate the last-broadcast snapshot —
    /// call [`Self::merge`] after the delta has actually been sent.
    pub fn compute_delta(&self, candidate: &PlayerState) -> PlayerDelta {
        let Some(previous) = self.last_broadcast.get(&candidate.session_id) else {
            // No prior snapshot: include every field.
            return PlayerDelta {
                x: Some(candidate.x),
                y: Some(candidate.y),
                angle: Some(candidate.angle),
                vx: Some(candidate.vx),
                vy: Some(candidate.vy),
                angular_velocity: Some(candidate.angular_velocity),
                is_sleeping: Some(candidate.is_sleeping),
                is_thrusting: Some(candidate.is_thrusting),
            };
        };

        let mut delta = PlayerDelta::default();

        let dx = candidate.x - previous.x;
        let dy = candidate.y - previous.y;
        if dx.abs() > SYNC_POS || dy.abs() > SYNC_POS {
            delta.x = Some(candidate.x);
            delta.y = Some(candidate.y);
        }

        let dvx = candidate.vx - previous.vx;
        let dvy = candidate.vy - previous.vy;
        if dvx.abs() > SYNC_VEL || dvy.abs() > SYNC_VEL {
            delta.vx = Some(candidate.vx);
            delta.vy = Some(candidate.vy);
        }

        if shortest_arc_diff(candidate.angle, previous.angle).abs() > SYNC_ANG {
            delta.angle = Some(candidate.angle);
        }

        if (candidate.angular_velocity - previous.angular_velocity).abs() > SYNC_ANG {
            delta.angular_velocity = Some(candidate.angular_velocity);
        }

        if candidate.is_sleeping != previous.is_sleeping {
            delta.is_sleeping = Some(candidate.is_sleeping);
        }
        if candidate.is_thrusting != previous.is_thrusting {
            delta.is_thrusting = Some(candidate.is_thrusting);
        }

        delta
    }

    /// Merges a sent delta into the last-broadcast snapshot: resent fields
    /// are updated, unsent fields keep their previously-sent values.
    pub fn merge(&mut self, session_id: &str, candidate: &PlayerState, delta: &PlayerDelta) {
        let entry = self
            .last_broadcast
            .entry(session_id.to_string())
            .or_insert_with(|| candidate.clone());

        if delta.x.is_some() {
            entry.x = candidate.x;
        }
        if delta.y.is_some() {
            entry.y = candidate.y;
        }
        if delta.angle.is_some() {
            entry.angle = candidate.angle;
        }
        if delta.vx.is_some() {
            entry.vx = candidate.vx;
        }
        if delta.vy.is_some() {
            entry.vy = candidate.vy;
        }
        if delta.angular_velocity.is_some() {
            entry.angular_velocity = candidate.angular_velocity;
        }
        if delta.is_sleeping.is_some() {
            entry.is_sleeping = candidate.is_sleeping;
        }
        if delta.is_thrusting.is_some() {
            entry.is_thrusting = candidate.is_thrusting;
        }
    }

    /// Erases a session's last-broadcast entry, on player leave.
    pub fn remove(&mut self, session_id: &str) {
        self.last_broadcast.remove(session_id);
    }

    pub fn has_snapshot(&self, session_id: &str) -> bool {
        self.last_broadcast.contains_key(session_id)
    }
}
