//! Request handlers and exact-path routing.

use std::collections::HashMap;
use std::sync::Arc;

use crate::parser::{HttpRequest, Method};
use crate::server::{Error, HttpResponse};

/// A request handler: reads the request and populates the response in place.
pub type Handler = Arc<dyn Fn(&HttpRequest, &mut HttpResponse) + Send + Sync>;

/// Maps `(method, path)` to a handler.
///
/// Paths match byte for byte: no trailing-slash normalisation, no wildcards, no
/// query-string stripping.
#[derive(Default, Clone)]
pub struct Router {
    get: HashMap<String, Handler>,
    post: HashMap<String, Handler>,
}

impl Router {
    /// Create an empty router.
    pub fn new() -> Self {
        Self::default()
    }

    fn table(&self, method: Method) -> Option<&HashMap<String, Handler>> {
        match method {
            Method::GET => Some(&self.get),
            Method::POST => Some(&self.post),
            Method::Unsupported => None,
        }
    }

    /// Register `handler` for `method` and `path`, replacing any earlier handler for
    /// the same pair.
    ///
    /// Returns `false`, registering nothing, for [`Method::Unsupported`].
    pub fn register<F>(&mut self, method: Method, path: impl Into<String>, handler: F) -> bool
    where
        F: Fn(&HttpRequest, &mut HttpResponse) + Send + Sync + 'static,
    {
        let table = match method {
            Method::GET => &mut self.get,
            Method::POST => &mut self.post,
            Method::Unsupported => return false,
        };
        table.insert(path.into(), Arc::new(handler));
        true
    }

    /// Find the handler registered for exactly `method` and `path`.
    ///
    /// Fails with [`Error::UnsupportedMethod`] for methods that can never be routed and
    /// [`Error::NotFound`] when nothing is registered for the pair.
    pub fn resolve(&self, method: Method, path: &str) -> Result<&Handler, Error> {
        let table = self
            .table(method)
            .ok_or_else(|| Error::UnsupportedMethod(path.to_string()))?;
        table
            .get(path)
            .ok_or_else(|| Error::NotFound(method, path.to_string()))
    }

    /// All registered `(method, path)` pairs, GET routes first, each group sorted.
    pub fn routes(&self) -> Vec<(Method, &str)> {
        let mut routes = Vec::with_capacity(self.len());
        for method in [Method::GET, Method::POST] {
            if let Some(table) = self.table(method) {
                let mut paths: Vec<&str> = table.keys().map(String::as_str).collect();
                paths.sort_unstable();
                routes.extend(paths.into_iter().map(|path| (method, path)));
            }
        }
        routes
    }

    /// Number of registered routes.
    pub fn len(&self) -> usize {
        self.get.len() + self.post.len()
    }

    /// Whether no route is registered.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl std::fmt::Debug for Router {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Router")
            .field("routes", &self.routes())
            .finish()
    }
}
