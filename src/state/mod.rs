pub mod store;

pub use store::{Listener, StateStore, Store, SubscriptionId, json_kind, merge_into};
