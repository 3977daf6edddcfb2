//! Per-player input queue and validation.

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

use crate::constants::DEFAULT_INPUT_QUEUE_CAPACITY;
use crate::metrics::RoomMetrics;

/// One of the three input shapes a client may send for a given player,
/// plus an optional monotonic sequence number.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "input", rename_all = "snake_case")]
pub enum InputMessage {
    ThrustStart,
    ThrustStop,
    SetAngle { value: f64 },
}

/// Wire-level input payload, carrying the optional `seq` alongside the
/// variant. Arrives as `{"input": "...", "seq": n, "value": n}`.
#[derive(Debug, Clone, Deserialize)]
pub struct RawInputMessage {
    pub input: String,
    pub value: Option<serde_json::Value>,
    pub seq: Option<u64>,
}

impl RawInputMessage {
    /// Validates and converts into an [`InputMessage`]. `set_angle` is
    /// rejected unless `value` is a finite JSON number (NaN, null, and
    /// strings are all rejected).
    pub fn validate(&self) -> Result<InputMessage, String> {
        match self.input.as_str() {
            "thrust_start" => Ok(InputMessage::ThrustStart),
            "thrust_stop" => Ok(InputMessage::ThrustStop),
            "set_angle" => {
                let value = self
                    .value
                    .as_ref()
                    .and_then(|v| v.as_f64())
                    .filter(|v| v.is_finite())
                    .ok_or_else(|| format!("set_angle requires a finite numeric value, got {:?}", self.value))?;
                Ok(InputMessage::SetAngle { value })
            }
            other => Err(format!("unknown input variant: {other}")),
        }
    }
}

/// A sequenced, enqueued input: `seq` gaps are tolerated, it is only
/// carried through for observability, not used to reorder.
#[derive(Debug, Clone, PartialEq)]
pub struct QueuedInput {
    pub message: InputMessage,
    pub seq: Option<u64>,
}

/// Bounded per-player FIFO. Overflow drops the OLDEST entries.
pub struct InputQueue {
    queue: VecDeque<QueuedInput>,
    capacity: usize,
}

impl Default for InputQueue {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_INPUT_QUEUE_CAPACITY)
    }
}

impl InputQueue {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            queue: VecDeque::with_capacity(capacity.min(1024)),
            capacity,
        }
    }

    /// Validates and enqueues a raw message. Returns `Ok(())` if accepted,
    /// `Err` with the rejection reason otherwise (the caller is expected
    /// to log it and bump the dropped-input metric).
    pub fn enqueue_raw(&mut self, raw: &RawInputMessage, metrics: &mut RoomMetrics) -> Result<(), String> {
        match raw.validate() {
            Ok(message) => {
                self.enqueue(QueuedInput { message, seq: raw.seq }, metrics);
                Ok(())
            }
            Err(reason) => {
                metrics.inputs_dropped += 1;
                Err(reason)
            }
        }
    }

    fn enqueue(&mut self, input: QueuedInput, metrics: &mut RoomMetrics) {
        if self.queue.len() >= self.capacity {
            self.queue.pop_front();
            metrics.queue_overflows += 1;
        }
        self.queue.push_back(input);
        metrics.inputs_accepted += 1;
    }

    /// Returns every message received since the previous drain, in arrival
    /// order, and clears the queue.
    pub fn drain_for_step(&mut self) -> Vec<QueuedInput> {
        self.queue.drain(..).collect()
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(input: &str, value: Option<serde_json::Value>) -> RawInputMessage {
        RawInputMessage {
            input: input.to_string(),
            value,
            seq: None,
        }
    }

    #[test]
    fn accepts_the_three_known_shapes() {
        assert_eq!(raw("thrust_start", None).validate().unwrap(), InputMessage::ThrustStart);
        assert_eq!(raw("thrust_stop", None).validate().unwrap(), InputMessage::ThrustStop);
        assert_eq!(
            raw("set_angle", Some(serde_json::json!(1.5))).validate().unwrap(),
            InputMessage::SetAngle { value: 1.5 }
        );
    }

    #[test]
    fn rejects_nan_and_null_and_string_angle() {
        assert!(raw("set_angle", Some(serde_json::json!(null))).validate().is_err());
        assert!(raw("set_angle", Some(serde_json::json!("NaN"))).validate().is_err());
        assert!(raw("set_angle", None).validate().is_err());
    }

    #[test]
    fn rejects_unknown_variant() {
        assert!(raw("teleport", None).validate().is_err());
    }

    #[test]
    fn fifo_preserves_arrival_order() {
        let mut queue = InputQueue::with_capacity(10);
        let mut metrics = RoomMetrics::default();
        for i in 0..5u64 {
            queue.enqueue(
                QueuedInput {
                    message: InputMessage::SetAngle { value: i as f64 },
                    seq: Some(i),
                },
                &mut metrics,
            );
        }
        let drained = queue.drain_for_step();
        let values: Vec<f64> = drained
            .into_iter()
            .map(|q| match q.message {
                InputMessage::SetAngle { value } => value,
                _ => unreachable!(),
            })
            .collect();
        assert_eq!(values, vec![0.0, 1.0, 2.0, 3.0, 4.0]);
    }

    #[test]
    fn drain_clears_the_queue() {
        let mut queue = InputQueue::with_capacity(10);
        let mut metrics = RoomMetrics::default();
        queue.enqueue(QueuedInput { message: InputMessage::ThrustStart, seq: None }, &mut metrics);
        assert_eq!(queue.drain_for_step().len(), 1);
        assert!(queue.is_empty());
    }

    #[test]
    fn overflow_drops_oldest_and_counts() {
        let mut queue = InputQueue::with_capacity(2);
        let mut metrics = RoomMetrics::default();
        queue.enqueue(QueuedInput { message: InputMessage::ThrustStart, seq: Some(1) }, &mut metrics);
        queue.enqueue(QueuedInput { message: InputMessage::ThrustStop, seq: Some(2) }, &mut metrics);
        queue.enqueue(QueuedInput { message: InputMessage::SetAngle { value: 0.1 }, seq: Some(3) }, &mut metrics);
        assert_eq!(metrics.queue_overflows, 1);
        let drained = queue.drain_for_step();
        assert_eq!(drained.len(), 2);
        assert_eq!(drained[0].seq, Some(2));
        assert_eq!(drained[1].seq, Some(3));
    }
}
