use super::config::Paths;
use log::debug;
use serde_json::{Map, Value};

/// Select the part of a snapshot a strategy persists.
///
/// Without paths the snapshot is returned as is. With paths, a new object
/// holds exactly the named top-level fields; a field missing from the
/// snapshot is written out as `null`.
pub fn project(snapshot: Value, paths: Option<&Paths>) -> Value {
    let Some(paths) = paths else {
        return snapshot;
    };

    let mut partial = Map::with_capacity(paths.len());
    for field in paths.iter() {
        let value = match snapshot.get(field) {
            Some(value) => value.clone(),
            None => {
                debug!("persist: path '{}' not present in state, writing null", field);
                Value::Null
            }
        };
        partial.insert(field.to_string(), value);
    }
    Value::Object(partial)
}
