//! Property tests for session churn.
//!
//! Random interleavings of joins, leaves, input messages and ticks must keep
//! the session map, entity store, physics world and replicated state in
//! agreement.

use std::collections::BTreeSet;

use hearth_engine::prelude::*;
use proptest::prelude::*;
use serde_json::json;

#[derive(Debug, Clone)]
enum RoomOp {
    Join(u8),
    Leave(u8),
    Input(u8, bool, bool, bool, bool),
    Tick,
}

fn room_op_strategy() -> impl Strategy<Value = RoomOp> {
    prop_oneof![
        3 => (0..8u8).prop_map(RoomOp::Join),
        2 => (0..8u8).prop_map(RoomOp::Leave),
        2 => (0..8u8, any::<bool>(), any::<bool>(), any::<bool>(), any::<bool>())
            .prop_map(|(s, f, b, l, r)| RoomOp::Input(s, f, b, l, r)),
        3 => Just(RoomOp::Tick),
    ]
}

fn session(n: u8) -> SessionId {
    SessionId::new(format!("s{n}"))
}

fn config() -> RoomConfig {
    RoomConfig {
        terrain: TerrainConfig {
            width: 48.0,
            height: 48.0,
            subdivisions: 8,
            height_scale: 2.0,
            ..Default::default()
        },
        ..Default::default()
    }
}

fn scheduler() -> TickScheduler {
    TickScheduler::new(Room::with_noise_terrain(config()).unwrap())
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(48))]

    /// Structural invariants hold after every operation, and after a tick
    /// the replicated players are exactly the joined sessions.
    #[test]
    fn churn_keeps_subsystems_in_agreement(ops in prop::collection::vec(room_op_strategy(), 1..60)) {
        let mut sched = scheduler();
        let mut joined: BTreeSet<SessionId> = BTreeSet::new();

        for op in ops {
            match op {
                RoomOp::Join(n) => {
                    let result = sched.room_mut().on_join(session(n));
                    if joined.insert(session(n)) {
                        prop_assert!(result.is_ok());
                    } else {
                        let is_duplicate = matches!(result, Err(JoinError::AlreadyJoined { .. }));
                        prop_assert!(is_duplicate);
                    }
                }
                RoomOp::Leave(n) => {
                    let left = sched.room_mut().on_leave(&session(n));
                    prop_assert_eq!(left, joined.remove(&session(n)));
                }
                RoomOp::Input(n, forward, backward, left, right) => {
                    let accepted = sched.room_mut().on_message(
                        &session(n),
                        &json!({ "forward": forward, "backward": backward, "left": left, "right": right }),
                    );
                    prop_assert_eq!(accepted, joined.contains(&session(n)));
                }
                RoomOp::Tick => {
                    let completed = matches!(sched.tick(), TickReport::Completed { .. });
                    prop_assert!(completed);
                    let players: BTreeSet<SessionId> =
                        sched.room().replicated().players().keys().cloned().collect();
                    prop_assert_eq!(&players, &joined);
                }
            }

            let room = sched.room();
            prop_assert_eq!(room.sessions().len(), joined.len());
            prop_assert_eq!(room.store().len(), joined.len());
            prop_assert_eq!(room.physics().body_count(), joined.len() + 1);
            for s in &joined {
                let body = room.body_of(s);
                prop_assert!(body.is_some_and(|b| room.physics().contains(b)));
            }
            // Between ticks, views only exist for sessions that are still joined.
            for s in room.replicated().players().keys() {
                prop_assert!(joined.contains(s));
            }
        }
    }

    /// On level ground, intent never pushes a player faster than the
    /// configured speed.
    #[test]
    fn horizontal_speed_is_bounded(
        inputs in prop::collection::vec((any::<bool>(), any::<bool>(), any::<bool>(), any::<bool>()), 1..30)
    ) {
        let room = Room::new(config(), Box::new(FlatTerrain { height: 0.0 })).unwrap();
        let mut sched = TickScheduler::new(room);
        let a = session(0);
        let entity = sched.room_mut().on_join(a.clone()).unwrap().entity;
        let speed = sched.room().config().player_speed;

        for (forward, backward, left, right) in inputs {
            sched.room_mut().on_message(
                &a,
                &json!({ "forward": forward, "backward": backward, "left": left, "right": right }),
            );
            sched.tick();
            let v = sched.room().store().get::<Velocity>(entity).copied().unwrap();
            prop_assert!((v.x * v.x + v.z * v.z).sqrt() <= speed + 1e-3);
        }
    }
}
