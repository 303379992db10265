use std::{collections::HashMap, sync::Arc};

use foldhash::fast::RandomState;
use serde_json::Value;

use crate::{Error, ErrorKind, Invocable, Result};

/// Methods of one loaded interface, keyed by method name.
#[derive(Clone, Debug)]
pub struct Interface {
    name: String,
    methods: Arc<HashMap<String, Invocable, RandomState>>,
}

impl Interface {
    pub fn new(
        name: impl Into<String>,
        methods: impl IntoIterator<Item = (String, Invocable)>,
    ) -> Self {
        Self {
            name: name.into(),
            methods: Arc::new(methods.into_iter().collect()),
        }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn method(&self, method: &str) -> Option<&Invocable> {
        self.methods.get(method)
    }

    pub fn method_names(&self) -> impl Iterator<Item = &str> {
        self.methods.keys().map(String::as_str)
    }

    /// # Errors
    ///
    /// Fails with [`ErrorKind::MethodNotFound`] if the interface has no such method.
    pub async fn call(&self, method: &str, args: Value) -> Result<Value> {
        let Some(invocable) = self.method(method) else {
            return Err(Error::new(
                ErrorKind::MethodNotFound,
                format!("{}/{method}", self.name),
            ));
        };
        invocable.call(args).await
    }
}

/// Interface table assembled by `Client::load`.
///
/// Loading writes one entry per requested interface that the server
/// exposes; other entries are left as they are.
#[derive(Default)]
pub struct Api {
    interfaces: dashmap::DashMap<String, Interface, RandomState>,
}

impl Api {
    #[must_use]
    pub fn interface(&self, name: &str) -> Option<Interface> {
        self.interfaces.get(name).map(|entry| entry.value().clone())
    }

    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.interfaces.contains_key(name)
    }

    #[must_use]
    pub fn names(&self) -> Vec<String> {
        self.interfaces.iter().map(|entry| entry.key().clone()).collect()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.interfaces.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.interfaces.is_empty()
    }

    /// Calls `interface/method` with `args`.
    ///
    /// # Errors
    ///
    /// Fails with [`ErrorKind::InterfaceNotFound`] for an interface that was
    /// not loaded, besides the errors of [`Interface::call`].
    pub async fn call(&self, interface: &str, method: &str, args: Value) -> Result<Value> {
        let Some(interface) = self.interface(interface) else {
            return Err(Error::new(ErrorKind::InterfaceNotFound, interface.to_string()));
        };
        interface.call(method, args).await
    }

    pub(crate) fn insert(&self, interface: Interface) {
        self.interfaces.insert(interface.name.clone(), interface);
    }
}

impl std::fmt::Debug for Api {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Api")
            .field("interfaces", &self.names())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{HttpSocket, Target, invoke::Route};
    use serde_json::json;

    fn invocable(interface: &str, method: &str) -> (String, Invocable) {
        let route = Route::Http(Arc::new(HttpSocket::new("127.0.0.1:1")));
        (
            method.to_string(),
            Invocable::new(Target::new(interface, None, method), route),
        )
    }

    #[tokio::test]
    async fn test_api_lookup() {
        let api = Api::default();
        assert!(api.is_empty());

        api.insert(Interface::new("auth", [invocable("auth", "signIn")]));
        api.insert(Interface::new("files", [invocable("files", "list")]));
        assert_eq!(api.len(), 2);

        let auth = api.interface("auth").unwrap();
        assert_eq!(auth.name(), "auth");
        assert_eq!(auth.method_names().collect::<Vec<_>>(), ["signIn"]);
        assert_eq!(
            auth.method("signIn").unwrap().target().to_string(),
            "auth/signIn"
        );

        // Re-inserting replaces only that interface.
        api.insert(Interface::new("auth", [invocable("auth", "signOut")]));
        let auth = api.interface("auth").unwrap();
        assert!(auth.method("signIn").is_none());
        assert!(api.contains("files"));

        let error = api.call("chat", "send", json!({})).await.unwrap_err();
        assert_eq!(error.kind, ErrorKind::InterfaceNotFound);
        let error = api.call("auth", "signIn", json!({})).await.unwrap_err();
        assert_eq!(error.kind, ErrorKind::MethodNotFound);
        assert_eq!(error.msg, "auth/signIn");
    }
}
