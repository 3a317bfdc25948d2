//! Radix tree for route matching.
//!
//! Paths are split into `/`-separated segments. Static segments match exactly,
//! `{name}` segments match any single segment and capture it. Values are stored
//! at terminal nodes keyed by HTTP method, so lookup is O(k) in the path length
//! rather than O(n) in the number of routes.

use std::borrow::Cow;
use std::collections::HashMap;
use std::sync::Arc;

use http::Method;

struct RadixNode<T> {
    /// Path segment this node matches (empty for the root and parameter nodes)
    segment: Cow<'static, str>,
    /// Terminal values per HTTP method
    routes: HashMap<Method, Arc<T>>,
    /// Capture name when this node is a `{param}` segment
    param_name: Option<Cow<'static, str>>,
    children: Vec<RadixNode<T>>,
    /// Parameter children; one per distinct parameter name at this position
    param_children: Vec<RadixNode<T>>,
}

impl<T> RadixNode<T> {
    fn new(segment: Cow<'static, str>) -> Self {
        Self {
            segment,
            routes: HashMap::new(),
            param_name: None,
            children: Vec::new(),
            param_children: Vec::new(),
        }
    }

    fn new_param(param_name: Cow<'static, str>) -> Self {
        Self {
            param_name: Some(param_name),
            ..Self::new(Cow::Borrowed(""))
        }
    }

    /// Store `value`, returning the value it replaced.
    fn insert(&mut self, segments: &[&str], method: Method, value: Arc<T>) -> Option<Arc<T>> {
        let Some((&segment, remaining)) = segments.split_first() else {
            return self.routes.insert(method, value);
        };

        if let Some(param_name) = segment.strip_prefix('{').and_then(|s| s.strip_suffix('}')) {
            if let Some(child) = self
                .param_children
                .iter_mut()
                .find(|c| c.param_name.as_deref() == Some(param_name))
            {
                return child.insert(remaining, method, value);
            }
            let mut child = RadixNode::new_param(Cow::Owned(param_name.to_string()));
            let replaced = child.insert(remaining, method, value);
            self.param_children.push(child);
            return replaced;
        }

        if let Some(child) = self.children.iter_mut().find(|c| c.segment == segment) {
            return child.insert(remaining, method, value);
        }
        let mut child = RadixNode::new(Cow::Owned(segment.to_string()));
        let replaced = child.insert(remaining, method, value);
        self.children.push(child);
        replaced
    }

    fn search(
        &self,
        segments: &[&str],
        method: &Method,
        params: &mut HashMap<String, String>,
    ) -> Option<Arc<T>> {
        let Some((&segment, remaining)) = segments.split_first() else {
            return self.routes.get(method).cloned();
        };

        // static children win over parameters
        for child in &self.children {
            if child.segment == segment {
                if let Some(found) = child.search(remaining, method, params) {
                    return Some(found);
                }
            }
        }

        for child in &self.param_children {
            if let Some(name) = &child.param_name {
                params.insert(name.to_string(), segment.to_string());
                if let Some(found) = child.search(remaining, method, params) {
                    return Some(found);
                }
                params.remove(name.as_ref());
            }
        }
        None
    }
}

fn split(path: &str) -> Vec<&str> {
    path.trim_start_matches('/')
        .split('/')
        .filter(|s| !s.is_empty())
        .collect()
}

/// Radix tree keyed by `(method, route template)`.
pub struct RadixTree<T> {
    root: RadixNode<T>,
    len: usize,
}

impl<T> Default for RadixTree<T> {
    fn default() -> Self {
        Self {
            root: RadixNode::new(Cow::Borrowed("")),
            len: 0,
        }
    }
}

impl<T> RadixTree<T> {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert `value` under `template` (e.g. `/users/{id}`), returning the value
    /// previously stored for the same method and template.
    pub fn insert(&mut self, method: Method, template: &str, value: T) -> Option<Arc<T>> {
        let replaced = self.root.insert(&split(template), method, Arc::new(value));
        if replaced.is_none() {
            self.len += 1;
        }
        replaced
    }

    /// Match a concrete request path, returning the value and captured parameters.
    #[must_use]
    pub fn route(&self, method: &Method, path: &str) -> Option<(Arc<T>, HashMap<String, String>)> {
        let mut params = HashMap::new();
        let found = self.root.search(&split(path), method, &mut params)?;
        Some((found, params))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.len
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}
