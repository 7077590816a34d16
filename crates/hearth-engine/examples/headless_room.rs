//! Headless room driven by simulated clients.
//!
//! Three bots join, wander for a couple of seconds and leave while the
//! real-time scheduler ticks the room. Each published state is summarized
//! on stdout.
//!
//! Run with: `RUST_LOG=info cargo run --example headless_room [config.json]`

use std::sync::mpsc;
use std::thread;
use std::time::Duration;

use hearth_engine::prelude::*;
use serde_json::json;

/// Prints a one-line digest of every published state.
struct ConsoleTransport {
    publishes: u64,
}

impl Transport for ConsoleTransport {
    fn force_leave(&mut self, session: &SessionId) {
        println!("force leave: {session}");
    }

    fn publish(&mut self, state: &ReplicatedState) {
        self.publishes += 1;
        if self.publishes % 10 != 0 {
            return;
        }
        let positions: Vec<String> = state
            .players()
            .iter()
            .map(|(id, p)| format!("{id}=({:.1}, {:.1}, {:.1})", p.x, p.y, p.z))
            .collect();
        println!(
            "publish #{:<4} hash {} players [{}]",
            self.publishes,
            &state.state_hash()[..12],
            positions.join(", ")
        );
    }
}

fn bot(events: mpsc::Sender<NetworkEvent>, name: &'static str, moves: [serde_json::Value; 3]) {
    let session = SessionId::from(name);
    let send = |event| events.send(event).is_ok();
    if !send(NetworkEvent::Join { session: session.clone() }) {
        return;
    }
    for payload in moves {
        thread::sleep(Duration::from_millis(700));
        if !send(NetworkEvent::Message { session: session.clone(), payload }) {
            return;
        }
    }
    thread::sleep(Duration::from_millis(700));
    send(NetworkEvent::Leave { session });
}

fn main() -> Result<(), anyhow::Error> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let config = match std::env::args().nth(1) {
        Some(path) => RoomConfig::from_json(&std::fs::read_to_string(path)?)?,
        None => RoomConfig::default(),
    };
    let mut scheduler = TickScheduler::new(Room::with_noise_terrain(config)?);

    let (tx, rx) = mpsc::channel();
    let bots = [
        ("ada", [json!({ "forward": true }), json!({ "forward": true, "left": true }), json!({})]),
        ("bo", [json!({ "right": true }), json!({ "backward": true }), json!({ "left": true })]),
        ("cy", [json!({ "backward": true, "right": true }), json!({}), json!({ "forward": true })]),
    ];
    let handles: Vec<_> = bots
        .into_iter()
        .map(|(name, moves)| {
            let tx = tx.clone();
            thread::spawn(move || bot(tx, name, moves))
        })
        .collect();
    drop(tx);

    let mut transport = ConsoleTransport { publishes: 0 };
    let ticks = scheduler.run(&rx, &mut transport);

    for handle in handles {
        let _ = handle.join();
    }
    println!("ran {ticks} ticks, {} publishes", transport.publishes);
    Ok(())
}
