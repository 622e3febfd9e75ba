//! Attribute inspection for dotted-path reads

use serde_json::Value;

/// One step of attribute traversal
pub enum Attr<'a> {
    /// A plain value; further path segments index into JSON objects
    Value(Value),
    /// A nested object that can be traversed further
    Object(&'a dyn Inspect),
}

/// Types whose state can be read by attribute name
pub trait Inspect {
    /// Look up a single attribute
    fn attr(&self, name: &str) -> Option<Attr<'_>>;

    /// Value form of the whole object when a path ends on it
    fn to_value(&self) -> Option<Value> {
        None
    }
}

/// Resolve `a.b.c` against `root`, returning `None` if any step is missing
pub fn resolve_path(root: &dyn Inspect, path: &str) -> Option<Value> {
    let mut segments = path.split('.');
    let mut current = root;

    while let Some(segment) = segments.next() {
        match current.attr(segment)? {
            Attr::Object(next) => current = next,
            Attr::Value(value) => {
                let mut value = value;
                for rest in segments.by_ref() {
                    value = value.as_object_mut()?.remove(rest)?;
                }
                return Some(value);
            }
        }
    }

    current.to_value()
}
