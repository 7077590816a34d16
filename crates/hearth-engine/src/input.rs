//! Client movement intent and the per-session latest-input buffer.

use std::collections::BTreeMap;

use hearth_ecs::entity::EntityId;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Which movement keys a client holds. Copied into the entity every tick.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct InputIntent {
    pub forward: bool,
    pub backward: bool,
    pub left: bool,
    pub right: bool,
}

impl InputIntent {
    /// Decode an `"input"` message payload.
    ///
    /// Anything other than a JSON object yields `None`. Missing fields read
    /// as `false`; other values coerce by truthiness (`0`, `""`, `null`
    /// are false, any other number, string, array or object is true).
    pub fn from_payload(payload: &Value) -> Option<Self> {
        let fields = payload.as_object()?;
        let flag = |key: &str| fields.get(key).is_some_and(truthy);
        Some(Self {
            forward: flag("forward"),
            backward: flag("backward"),
            left: flag("left"),
            right: flag("right"),
        })
    }

    pub fn is_idle(&self) -> bool {
        *self == Self::default()
    }
}

fn truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0 && !f.is_nan()),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

/// Horizontal `[x, z]` velocity a player with `intent` aims for.
///
/// Forward is +Z, backward -Z, right +X, left -X. Active directions are
/// summed and normalized, so diagonals are no faster than straight lines and
/// opposing keys cancel out.
pub fn desired_velocity(intent: &InputIntent, speed: f32) -> [f32; 2] {
    let mut x = 0.0f32;
    let mut z = 0.0f32;
    if intent.forward {
        z += 1.0;
    }
    if intent.backward {
        z -= 1.0;
    }
    if intent.right {
        x += 1.0;
    }
    if intent.left {
        x -= 1.0;
    }
    let len = (x * x + z * z).sqrt();
    if len == 0.0 {
        return [0.0, 0.0];
    }
    [x / len * speed, z / len * speed]
}

// ---------------------------------------------------------------------------
// InputBuffer
// ---------------------------------------------------------------------------

/// Latest intent received for each entity. A newer message replaces the
/// previous one wholesale; nothing is queued.
#[derive(Debug, Clone, Default)]
pub struct InputBuffer {
    latest: BTreeMap<EntityId, InputIntent>,
}

impl InputBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, entity: EntityId, intent: InputIntent) {
        self.latest.insert(entity, intent);
    }

    pub fn latest(&self, entity: EntityId) -> Option<InputIntent> {
        self.latest.get(&entity).copied()
    }

    /// Drop whatever was buffered for `entity`.
    pub fn forget(&mut self, entity: EntityId) -> Option<InputIntent> {
        self.latest.remove(&entity)
    }

    pub fn len(&self) -> usize {
        self.latest.len()
    }

    pub fn is_empty(&self) -> bool {
        self.latest.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn speed_of(v: [f32; 2]) -> f32 {
        (v[0] * v[0] + v[1] * v[1]).sqrt()
    }

    #[test]
    fn payload_with_all_flags() {
        let intent = InputIntent::from_payload(&json!({
            "forward": true, "backward": false, "left": true, "right": false
        }))
        .unwrap();
        assert_eq!(
            intent,
            InputIntent { forward: true, backward: false, left: true, right: false }
        );
    }

    #[test]
    fn missing_fields_default_to_false() {
        let intent = InputIntent::from_payload(&json!({ "right": true })).unwrap();
        assert_eq!(intent, InputIntent { right: true, ..Default::default() });
        assert!(InputIntent::from_payload(&json!({})).unwrap().is_idle());
    }

    #[test]
    fn values_coerce_by_truthiness() {
        let intent = InputIntent::from_payload(&json!({
            "forward": 1, "backward": "", "left": "yes", "right": null
        }))
        .unwrap();
        assert_eq!(
            intent,
            InputIntent { forward: true, backward: false, left: true, right: false }
        );
        let zero = InputIntent::from_payload(&json!({ "forward": 0 })).unwrap();
        assert!(!zero.forward);
    }

    #[test]
    fn non_object_payload_is_rejected() {
        for payload in [json!(null), json!(true), json!([1, 2]), json!("forward")] {
            assert_eq!(InputIntent::from_payload(&payload), None, "{payload}");
        }
    }

    #[test]
    fn forward_moves_along_positive_z() {
        let v = desired_velocity(&InputIntent { forward: true, ..Default::default() }, 5.0);
        assert_eq!(v, [0.0, 5.0]);
        let v = desired_velocity(&InputIntent { left: true, ..Default::default() }, 5.0);
        assert_eq!(v, [-5.0, 0.0]);
    }

    #[test]
    fn diagonal_is_normalized() {
        let intent = InputIntent { forward: true, right: true, ..Default::default() };
        let v = desired_velocity(&intent, 5.0);
        assert!((speed_of(v) - 5.0).abs() < 1e-5);
        assert!(v[0] > 0.0 && v[1] > 0.0);
    }

    #[test]
    fn opposing_keys_cancel() {
        let all = InputIntent { forward: true, backward: true, left: true, right: true };
        assert_eq!(desired_velocity(&all, 5.0), [0.0, 0.0]);
        assert_eq!(desired_velocity(&InputIntent::default(), 5.0), [0.0, 0.0]);
    }

    #[test]
    fn buffer_keeps_only_latest() {
        let mut buffer = InputBuffer::new();
        let e = EntityId::new(0, 0);
        buffer.record(e, InputIntent { forward: true, ..Default::default() });
        buffer.record(e, InputIntent { left: true, ..Default::default() });
        assert_eq!(buffer.len(), 1);
        assert_eq!(buffer.latest(e), Some(InputIntent { left: true, ..Default::default() }));
        assert!(buffer.forget(e).is_some());
        assert_eq!(buffer.latest(e), None);
        assert!(buffer.is_empty());
    }
}
