use std::collections::HashMap;

use foldhash::fast::RandomState;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Reply of `system/introspect`: interface name → method name → metadata.
///
/// Method metadata is kept as received; only the method names are used.
#[derive(Serialize, Deserialize, Debug, Default, Clone, PartialEq, Eq)]
#[serde(transparent)]
pub struct Introspection(
    HashMap<String, HashMap<String, Value, RandomState>, RandomState>,
);

impl Introspection {
    #[must_use]
    pub fn contains(&self, interface: &str) -> bool {
        self.0.contains_key(interface)
    }

    pub fn interfaces(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    /// Method names of `interface`, or `None` if the server does not expose it.
    pub fn methods(&self, interface: &str) -> Option<impl Iterator<Item = &str>> {
        self.0
            .get(interface)
            .map(|methods| methods.keys().map(String::as_str))
    }

    #[must_use]
    pub fn metadata(&self, interface: &str, method: &str) -> Option<&Value> {
        self.0.get(interface)?.get(method)
    }
}
