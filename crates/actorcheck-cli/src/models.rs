//! Bundled demo models.

use actorcheck_mc::{invariant, Invariant, Kripke, ModelError, World};
use actorcheck_model::{Environment, Event, HandlerResult, MachineId, MachineSpec, StateMachine};

/// Machines and invariants ready to hand to [`Kripke::new`].
pub struct Model {
    pub machines: Vec<StateMachine>,
    pub invariants: Vec<Box<dyn Invariant>>,
}

impl Model {
    /// Invariant names, used as the description in trace logs.
    pub fn description(&self) -> String {
        self.invariants
            .iter()
            .map(|inv| inv.name())
            .collect::<Vec<_>>()
            .join(", ")
    }

    pub fn into_kripke(self) -> Result<Kripke, ModelError> {
        Kripke::new(self.machines, self.invariants)
    }
}

/// A named model shipped with the CLI.
pub struct DemoModel {
    pub name: &'static str,
    pub summary: &'static str,
    build: fn() -> Model,
}

impl DemoModel {
    pub fn build(&self) -> Model {
        (self.build)()
    }
}

pub const MODELS: &[DemoModel] = &[
    DemoModel {
        name: "ping-pong",
        summary: "bounded ping/pong exchange between two machines",
        build: ping_pong,
    },
    DemoModel {
        name: "racy-lock",
        summary: "two clients and a lock server that grants without checking",
        build: racy_lock,
    },
    DemoModel {
        name: "retry-loop",
        summary: "sender retrying over a lossy channel until acknowledged",
        build: retry_loop,
    },
];

pub fn find(name: &str) -> Option<&'static DemoModel> {
    MODELS.iter().find(|m| m.name == name)
}

fn state_is(world: &World, machine: &str, state: &str) -> bool {
    world
        .env()
        .machine(machine)
        .is_some_and(|m| m.state().is(state))
}

const PING_ROUNDS: u32 = 3;

fn ping_pong() -> Model {
    let pinger = MachineSpec::builder("Pinger", "Start")
        .on_effect("Start", "Entry", |env, id, _| {
            env.set_field(id, "rounds", 1)?;
            env.send("ponger", Event::new("Ping").with_detail(id.as_str()))?;
            env.goto(id, "Waiting")
        })
        .on_effect("Waiting", "Pong", |env, id, _| {
            let rounds: u32 = env.require_field(id, "rounds")?;
            if rounds >= PING_ROUNDS {
                env.goto(id, "Done")?;
                return env.halt(id);
            }
            env.set_field(id, "rounds", rounds + 1)?;
            env.send("ponger", Event::new("Ping").with_detail(id.as_str()))
        })
        .build();
    let ponger = MachineSpec::builder("Ponger", "Ready")
        .on_effect("Ready", "Ping", |env, _, ev| {
            env.send(ev.detail(), Event::new("Pong"))
        })
        .build();

    Model {
        machines: vec![
            StateMachine::new("pinger", pinger).with_field("rounds", 0),
            StateMachine::new("ponger", ponger),
        ],
        invariants: vec![invariant("pinger stays within its rounds", |w: &World| {
            w.env()
                .machine("pinger")
                .and_then(|m| m.field_as::<u32>("rounds"))
                .is_some_and(|n| n <= PING_ROUNDS)
        })],
    }
}

const CLIENTS: [&str; 2] = ["alice", "bob"];

fn racy_lock() -> Model {
    // Grants every request; nothing tracks the current holder.
    let lock = MachineSpec::builder("Lock", "Serving")
        .on_effect("Serving", "Acquire", |env, _, ev| {
            env.send(ev.detail(), Event::new("Granted"))
        })
        .build();
    let client = MachineSpec::builder("Client", "Idle")
        .on_effect("Idle", "Entry", |env, id, _| {
            env.send("lock", Event::new("Acquire").with_detail(id.as_str()))?;
            env.goto(id, "Waiting")
        })
        .on_effect("Waiting", "Granted", |env, id, _| {
            env.send(id, Event::new("Leave"))?;
            env.goto(id, "Critical")
        })
        .on_effect("Critical", "Leave", |env, id, _| {
            env.send("lock", Event::new("Release").with_detail(id.as_str()))?;
            env.goto(id, "Done")
        })
        .build();

    let mut machines = vec![StateMachine::new("lock", lock)];
    machines.extend(CLIENTS.iter().map(|c| StateMachine::new(*c, client.clone())));

    Model {
        machines,
        invariants: vec![invariant("at most one client in the critical section", |w: &World| {
            CLIENTS
                .iter()
                .filter(|c| state_is(w, c, "Critical"))
                .count()
                <= 1
        })],
    }
}

fn retry_loop() -> Model {
    let sender = MachineSpec::builder("Sender", "Start")
        .on_effect("Start", "Entry", |env, id, _| {
            env.send("channel", Event::new("Msg").with_detail(id.as_str()))?;
            env.goto(id, "Waiting")
        })
        .on_effect("Waiting", "Nack", |env, id, _| {
            env.send("channel", Event::new("Msg").with_detail(id.as_str()))
        })
        .on_effect("Waiting", "Ack", |env, id, _| env.goto(id, "Done"))
        .build();
    // Either delivers or loses each message.
    let channel = MachineSpec::builder("Channel", "Up")
        .on(
            "Up",
            "Msg",
            |env: Environment, _: &MachineId, ev: &Event| -> HandlerResult {
                let mut delivered = env.clone();
                delivered.send(ev.detail(), Event::new("Ack"))?;
                let mut lost = env;
                lost.send(ev.detail(), Event::new("Nack"))?;
                Ok(vec![delivered.into(), lost.into()])
            },
        )
        .build();

    Model {
        machines: vec![
            StateMachine::new("sender", sender),
            StateMachine::new("channel", channel),
        ],
        invariants: vec![invariant("at most one message in flight", |w: &World| {
            w.env()
                .queue("channel")
                .map_or(0, |q| q.iter().filter(|ev| ev.name() == "Msg").count())
                <= 1
        })],
    }
}
