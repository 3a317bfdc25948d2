use std::borrow::Cow;
use std::collections::HashMap;
use std::sync::Arc;

use http::Method;
use tracing::{debug, info, warn};

use super::radix::RadixTree;
use crate::endpoint::{parse_form, Operation};
use crate::types::{TypeInfo, TypeRef};

/// An operation together with the endpoint type exposing it.
pub struct RoutedOperation {
    pub owner: TypeRef,
    pub operation: Arc<dyn Operation>,
}

impl std::fmt::Debug for RoutedOperation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RoutedOperation")
            .field("owner", &self.owner.to_string())
            .field("operation", &self.operation.name())
            .finish()
    }
}

/// Result of matching a request target to a route.
#[derive(Debug, Clone)]
pub struct RouteMatch {
    pub route: Arc<RoutedOperation>,
    /// Captured `{placeholder}` segments, percent-decoded
    pub path_params: HashMap<String, String>,
    /// Decoded query string; later duplicates win
    pub query_params: HashMap<String, String>,
}

impl RouteMatch {
    #[inline]
    #[must_use]
    pub fn get_path_param(&self, name: &str) -> Option<&str> {
        self.path_params.get(name).map(String::as_str)
    }

    #[inline]
    #[must_use]
    pub fn get_query_param(&self, name: &str) -> Option<&str> {
        self.query_params.get(name).map(String::as_str)
    }
}

/// One row of the route table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteInfo {
    pub method: Method,
    pub template: String,
    pub owner: String,
    pub operation: String,
}

/// Routes requests to the operations of endpoint types.
///
/// Operations are treated alike whether they were generated at startup or
/// written by hand: the router only sees their [`RouteAnnotation`](crate::endpoint::RouteAnnotation).
#[derive(Default)]
pub struct Router {
    tree: RadixTree<RoutedOperation>,
    routes: Vec<RouteInfo>,
}

impl Router {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Build the route table from endpoint types, in order.
    ///
    /// When two operations claim the same method and template the later one
    /// wins and a warning is logged.
    pub fn from_endpoints<'a>(types: impl IntoIterator<Item = &'a Arc<TypeInfo>>) -> Self {
        let mut router = Self::new();
        for ty in types {
            for operation in &ty.operations {
                router.add(ty.type_ref(), Arc::clone(operation));
            }
        }
        info!(routes = router.routes.len(), "route table built");
        router
    }

    /// Add one operation to the table.
    pub fn add(&mut self, owner: TypeRef, operation: Arc<dyn Operation>) {
        let route = operation.route();
        let (method, template) = (route.method.clone(), route.template.clone());
        let info = RouteInfo {
            method: method.clone(),
            template: template.clone(),
            owner: owner.to_string(),
            operation: operation.name().to_string(),
        };
        let replaced = self
            .tree
            .insert(method.clone(), &template, RoutedOperation { owner, operation });
        if let Some(previous) = replaced {
            warn!(
                method = %method,
                route = %template,
                previous = %previous.operation.name(),
                replacement = %info.operation,
                "duplicate route; later operation wins"
            );
            self.routes
                .retain(|r| !(r.method == method && r.template == template));
        } else {
            debug!(method = %method, route = %template, operation = %info.operation, "route added");
        }
        self.routes.push(info);
    }

    /// Match `target` (path plus optional query string).
    #[must_use]
    pub fn route(&self, method: &Method, target: &str) -> Option<RouteMatch> {
        let (path, query) = match target.split_once('?') {
            Some((path, query)) => (path, Some(query)),
            None => (target, None),
        };
        let (route, captures) = self.tree.route(method, path)?;
        let path_params = captures
            .into_iter()
            .map(|(name, raw)| {
                let decoded = urlencoding::decode(&raw).map(Cow::into_owned).ok();
                (name, decoded.unwrap_or(raw))
            })
            .collect();
        Some(RouteMatch {
            route,
            path_params,
            query_params: query.map(parse_form).unwrap_or_default(),
        })
    }

    /// Route table in insertion order.
    #[must_use]
    pub fn routes(&self) -> &[RouteInfo] {
        &self.routes
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.routes.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }
}
