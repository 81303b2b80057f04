use crate::core::StateError;
use serde_json::{Map, Value};
use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;

pub type SubscriptionId = u64;

/// Change listener, invoked after every committed mutation
pub type Listener = Rc<dyn Fn()>;

/// State container contract the persistence layer plugs into
pub trait StateStore {
    /// Stable identifier of this store instance
    fn id(&self) -> &str;

    /// Current state, as a JSON object
    fn snapshot(&self) -> Value;

    /// Merge `partial` into the live state, overwriting only the fields it carries
    fn patch(&self, partial: Map<String, Value>) -> Result<(), StateError>;

    fn subscribe(&self, listener: Listener) -> SubscriptionId;

    /// Returns false when the subscription was already gone
    fn unsubscribe(&self, id: SubscriptionId) -> bool;
}

/// Name of a JSON value's kind, for error messages
pub fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Recursive merge: nested objects are merged field by field, every other
/// value (arrays included) replaces what was there.
pub fn merge_into(target: &mut Map<String, Value>, partial: Map<String, Value>) {
    for (field, incoming) in partial {
        match incoming {
            Value::Object(nested) => {
                if let Some(Value::Object(existing)) = target.get_mut(&field) {
                    merge_into(existing, nested);
                } else {
                    target.insert(field, Value::Object(nested));
                }
            }
            other => {
                target.insert(field, other);
            }
        }
    }
}

// ============================================================================
// In-memory reactive store
// ============================================================================

/// Reactive in-memory state container.
///
/// Mutations go through [`Store::set`], [`Store::update`] or
/// [`StateStore::patch`]; each one notifies every subscriber once. No borrow
/// is held while listeners run, so a listener may read or mutate the store.
pub struct Store {
    id: String,
    state: RefCell<Map<String, Value>>,
    listeners: RefCell<Vec<(SubscriptionId, Listener)>>,
    next_subscription: Cell<SubscriptionId>,
}

impl Store {
    pub fn new(id: impl Into<String>, state: Map<String, Value>) -> Self {
        Self {
            id: id.into(),
            state: RefCell::new(state),
            listeners: RefCell::new(Vec::new()),
            next_subscription: Cell::new(1),
        }
    }

    /// Build from any JSON value; it must be an object
    pub fn from_value(id: impl Into<String>, state: Value) -> Result<Self, StateError> {
        match state {
            Value::Object(map) => Ok(Self::new(id, map)),
            other => Err(StateError::NotAnObject(json_kind(&other))),
        }
    }

    pub fn get(&self, field: &str) -> Option<Value> {
        self.state.borrow().get(field).cloned()
    }

    pub fn set(&self, field: &str, value: Value) {
        self.state.borrow_mut().insert(field.to_string(), value);
        self.notify();
    }

    pub fn update<F>(&self, mutate: F)
    where
        F: FnOnce(&mut Map<String, Value>),
    {
        mutate(&mut *self.state.borrow_mut());
        self.notify();
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.borrow().len()
    }

    fn notify(&self) {
        let listeners: Vec<Listener> = self
            .listeners
            .borrow()
            .iter()
            .map(|(_, listener)| listener.clone())
            .collect();
        for listener in listeners {
            listener();
        }
    }
}

impl StateStore for Store {
    fn id(&self) -> &str {
        &self.id
    }

    fn snapshot(&self) -> Value {
        Value::Object(self.state.borrow().clone())
    }

    fn patch(&self, partial: Map<String, Value>) -> Result<(), StateError> {
        merge_into(&mut *self.state.borrow_mut(), partial);
        self.notify();
        Ok(())
    }

    fn subscribe(&self, listener: Listener) -> SubscriptionId {
        let id = self.next_subscription.get();
        self.next_subscription.set(id + 1);
        self.listeners.borrow_mut().push((id, listener));
        id
    }

    fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut listeners = self.listeners.borrow_mut();
        let before = listeners.len();
        listeners.retain(|(existing, _)| *existing != id);
        listeners.len() != before
    }
}

impl fmt::Debug for Store {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Store")
            .field("id", &self.id)
            .field("state", &self.state.borrow())
            .field("listeners", &self.listener_count())
            .finish()
    }
}
