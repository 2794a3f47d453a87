//! State machines and their handler tables.

use crate::environment::{Environment, LocalState};
use crate::error::{HandlerError, HandlerResult};
use crate::event::Event;
use std::borrow::Borrow;
use std::collections::BTreeMap;
use std::fmt;
use std::ops::Deref;
use std::str::FromStr;
use std::sync::Arc;

/// Stable identifier of a machine, unique within an environment.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MachineId(String);

impl MachineId {
    pub fn new(id: impl Into<String>) -> Self {
        MachineId(id.into())
    }

    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Deref for MachineId {
    type Target = str;

    fn deref(&self) -> &str {
        &self.0
    }
}

impl Borrow<str> for MachineId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl From<&str> for MachineId {
    fn from(s: &str) -> Self {
        MachineId(s.to_string())
    }
}

impl From<String> for MachineId {
    fn from(s: String) -> Self {
        MachineId(s)
    }
}

impl fmt::Debug for MachineId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "MachineId({})", self.0)
    }
}

impl fmt::Display for MachineId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A machine state: a name used for handler dispatch plus an opaque detail.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StateTag {
    name: String,
    detail: String,
}

impl StateTag {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            detail: String::new(),
        }
    }

    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = detail.into();
        self
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    pub fn detail(&self) -> &str {
        &self.detail
    }

    /// Whether handlers registered for `name` apply to this state.
    #[inline]
    pub fn is(&self, name: &str) -> bool {
        self.name == name
    }
}

impl From<&str> for StateTag {
    fn from(name: &str) -> Self {
        StateTag::new(name)
    }
}

impl fmt::Display for StateTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.detail.is_empty() {
            write!(f, "{}", self.name)
        } else {
            write!(f, "{}({})", self.name, self.detail)
        }
    }
}

/// Reaction of a machine to an event.
///
/// The handler owns a copy of the environment in which the event has already
/// been dequeued. It may change any machine's state, halt machines and send
/// events, and returns every resulting environment as a separate outcome.
pub trait Handler: Send + Sync {
    fn handle(&self, env: Environment, machine: &MachineId, event: &Event) -> HandlerResult;
}

impl<F> Handler for F
where
    F: Fn(Environment, &MachineId, &Event) -> HandlerResult + Send + Sync,
{
    fn handle(&self, env: Environment, machine: &MachineId, event: &Event) -> HandlerResult {
        self(env, machine, event)
    }
}

/// A handler guarded by the event name it reacts to.
#[derive(Clone)]
pub struct HandlerEntry {
    event: String,
    handler: Arc<dyn Handler>,
}

impl HandlerEntry {
    #[inline]
    pub fn event(&self) -> &str {
        &self.event
    }

    #[inline]
    pub fn accepts(&self, event: &Event) -> bool {
        self.event == event.name()
    }

    pub fn handler(&self) -> &Arc<dyn Handler> {
        &self.handler
    }
}

impl fmt::Debug for HandlerEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HandlerEntry")
            .field("event", &self.event)
            .finish_non_exhaustive()
    }
}

/// Shared definition of a kind of machine: its name, initial state and
/// handler table.
#[derive(Debug)]
pub struct MachineSpec {
    name: String,
    initial: StateTag,
    /// Per state name, handlers in registration order.
    handlers: Vec<(String, Vec<HandlerEntry>)>,
}

impl MachineSpec {
    pub fn builder(name: impl Into<String>, initial: impl Into<StateTag>) -> MachineSpecBuilder {
        MachineSpecBuilder {
            spec: MachineSpec {
                name: name.into(),
                initial: initial.into(),
                handlers: Vec::new(),
            },
        }
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    pub fn initial(&self) -> &StateTag {
        &self.initial
    }

    /// Handlers registered for the given state, or `None` if the state has no
    /// entry in the table at all.
    pub fn handlers_for(&self, state: &StateTag) -> Option<&[HandlerEntry]> {
        self.handlers
            .iter()
            .find(|(name, _)| state.is(name))
            .map(|(_, entries)| entries.as_slice())
    }
}

/// Builder for [`MachineSpec`].
pub struct MachineSpecBuilder {
    spec: MachineSpec,
}

impl MachineSpecBuilder {
    /// Register a handler that may fork into several outcomes.
    pub fn on<F>(self, state: &str, event: &str, handler: F) -> Self
    where
        F: Fn(Environment, &MachineId, &Event) -> HandlerResult + Send + Sync + 'static,
    {
        self.handler(state, event, handler)
    }

    /// Register a handler that mutates the environment in place and yields
    /// exactly one outcome.
    pub fn on_effect<F>(self, state: &str, event: &str, effect: F) -> Self
    where
        F: Fn(&mut Environment, &MachineId, &Event) -> Result<(), HandlerError>
            + Send
            + Sync
            + 'static,
    {
        self.on(
            state,
            event,
            move |mut env: Environment, id: &MachineId, ev: &Event| {
                effect(&mut env, id, ev)?;
                Ok(vec![LocalState::new(env)])
            },
        )
    }

    /// Register any [`Handler`] implementation.
    pub fn handler(mut self, state: &str, event: &str, handler: impl Handler + 'static) -> Self {
        let entry = HandlerEntry {
            event: event.to_string(),
            handler: Arc::new(handler),
        };
        match self.spec.handlers.iter_mut().find(|(name, _)| name == state) {
            Some((_, entries)) => entries.push(entry),
            None => self.spec.handlers.push((state.to_string(), vec![entry])),
        }
        self
    }

    pub fn build(self) -> Arc<MachineSpec> {
        Arc::new(self.spec)
    }
}

/// A machine instance: identity, current state, halted flag and data fields.
///
/// Cloning is cheap for the handler table, which is shared.
#[derive(Clone)]
pub struct StateMachine {
    id: MachineId,
    spec: Arc<MachineSpec>,
    state: StateTag,
    halted: bool,
    fields: BTreeMap<String, String>,
}

impl StateMachine {
    /// Create a machine in its spec's initial state.
    pub fn new(id: impl Into<MachineId>, spec: Arc<MachineSpec>) -> Self {
        let state = spec.initial().clone();
        Self {
            id: id.into(),
            spec,
            state,
            halted: false,
            fields: BTreeMap::new(),
        }
    }

    pub fn with_field(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        self.fields.insert(key.into(), value.to_string());
        self
    }

    #[inline]
    pub fn id(&self) -> &MachineId {
        &self.id
    }

    /// Name of the machine's kind.
    #[inline]
    pub fn name(&self) -> &str {
        self.spec.name()
    }

    #[inline]
    pub fn spec(&self) -> &Arc<MachineSpec> {
        &self.spec
    }

    #[inline]
    pub fn state(&self) -> &StateTag {
        &self.state
    }

    #[inline]
    pub fn is_halted(&self) -> bool {
        self.halted
    }

    pub fn field(&self, key: &str) -> Option<&str> {
        self.fields.get(key).map(String::as_str)
    }

    /// Parse a field, e.g. a counter stored as text.
    pub fn field_as<T: FromStr>(&self, key: &str) -> Option<T> {
        self.field(key).and_then(|v| v.parse().ok())
    }

    /// Data fields in key order.
    pub fn fields(&self) -> impl Iterator<Item = (&str, &str)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Opaque detail string: the data fields as `key=value` pairs.
    pub fn details(&self) -> String {
        self.fields
            .iter()
            .map(|(k, v)| format!("{}={}", k, v))
            .collect::<Vec<_>>()
            .join(",")
    }

    pub(crate) fn set_state(&mut self, state: StateTag) {
        self.state = state;
    }

    pub(crate) fn halt(&mut self) {
        self.halted = true;
    }

    pub(crate) fn set_field(&mut self, key: String, value: String) {
        self.fields.insert(key, value);
    }
}

impl fmt::Debug for StateMachine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StateMachine")
            .field("id", &self.id)
            .field("name", &self.spec.name())
            .field("state", &self.state)
            .field("halted", &self.halted)
            .field("fields", &self.fields)
            .finish()
    }
}
