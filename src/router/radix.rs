//! Radix tree for route matching.
//!
//! Paths are matched segment by segment in O(k) where k is the segment count.
//! At every level static children are tried before parameter children, with
//! backtracking, so a literal segment always beats a placeholder at the same
//! position regardless of registration order. Terminal nodes keep their
//! routes in registration order, which makes the `Allow` list of a 405
//! deterministic and makes "first registered wins" hold for exact duplicates.

use http::Method;
use std::sync::Arc;

use super::core::ParamVec;
use crate::route::{RouteMeta, Segment};

#[derive(Clone, Default)]
struct RadixNode {
    /// Literal children, keyed by their segment text.
    children: Vec<(String, RadixNode)>,
    /// Parameter children. Multiple entries handle routes that use different
    /// parameter names at the same position.
    param_children: Vec<(Arc<str>, RadixNode)>,
    /// Terminal routes at this node, in registration order.
    routes: Vec<(Method, Arc<RouteMeta>)>,
}

/// Outcome of a tree lookup, before it is translated to a `ServiceError`.
pub enum RadixLookup {
    Matched {
        route: Arc<RouteMeta>,
        params: ParamVec,
    },
    /// The path reached a terminal node but no route there matches the
    /// request method. `allow` lists the methods that would have matched.
    MethodMismatch { allow: Vec<Method> },
    NoMatch,
}

impl RadixNode {
    /// Insert a route. Returns `false` if an identical (method, template)
    /// registration already exists; the earlier one is kept.
    fn insert(&mut self, segments: &[Segment], method: Method, route: Arc<RouteMeta>) -> bool {
        let Some((head, rest)) = segments.split_first() else {
            if self.routes.iter().any(|(m, _)| *m == method) {
                return false;
            }
            self.routes.push((method, route));
            return true;
        };

        match head {
            Segment::Literal(lit) => {
                for (seg, child) in &mut self.children {
                    if seg == lit {
                        return child.insert(rest, method, route);
                    }
                }
                let mut child = RadixNode::default();
                let inserted = child.insert(rest, method, route);
                self.children.push((lit.clone(), child));
                inserted
            }
            Segment::Param(name) => {
                for (param, child) in &mut self.param_children {
                    if param == name {
                        return child.insert(rest, method, route);
                    }
                }
                let mut child = RadixNode::default();
                let inserted = child.insert(rest, method, route);
                self.param_children.push((Arc::clone(name), child));
                inserted
            }
        }
    }

    /// Depth-first search: static children first, then parameter children
    /// with backtracking. Bindings accumulate in `params` in path order,
    /// which equals template declaration order. Method mismatches at fully
    /// matched terminals are collected into `allow`.
    fn search(
        &self,
        segments: &[&str],
        method: &Method,
        params: &mut ParamVec,
        allow: &mut Vec<Method>,
    ) -> Option<Arc<RouteMeta>> {
        let Some((head, rest)) = segments.split_first() else {
            for (m, route) in &self.routes {
                if m == method {
                    return Some(Arc::clone(route));
                }
            }
            for (m, _) in &self.routes {
                if !allow.contains(m) {
                    allow.push(m.clone());
                }
            }
            return None;
        };

        for (seg, child) in &self.children {
            if seg == head {
                if let Some(route) = child.search(rest, method, params, allow) {
                    return Some(route);
                }
            }
        }

        for (param, child) in &self.param_children {
            let mark = params.len();
            params.push((Arc::clone(param), (*head).to_string()));
            if let Some(route) = child.search(rest, method, params, allow) {
                return Some(route);
            }
            params.truncate(mark);
        }

        None
    }
}

/// Radix tree router. Immutable after construction and shared across all
/// dispatchers without locking.
#[derive(Clone)]
pub struct RadixRouter {
    root: RadixNode,
}

impl RadixRouter {
    /// Build a tree from validated route metadata. Duplicate registrations
    /// (same method and template) keep the first entry; the duplicates are
    /// returned so the caller can log them.
    pub fn new(routes: Vec<RouteMeta>) -> (Self, Vec<RouteMeta>) {
        let mut root = RadixNode::default();
        let mut duplicates = Vec::new();
        for route in routes {
            let method = route.method.clone();
            let segments = route.segments.clone();
            let shared = Arc::new(route);
            if !root.insert(&segments, method, Arc::clone(&shared)) {
                // Arc has no other holders at this point, unwrap is safe
                duplicates.push(Arc::try_unwrap(shared).unwrap_or_else(|a| (*a).clone()));
            }
        }
        (Self { root }, duplicates)
    }

    /// Resolve a path. Empty segments collapse, so trailing and doubled
    /// slashes do not affect matching; whitespace inside segments is
    /// preserved literally.
    pub fn lookup(&self, method: &Method, path: &str) -> RadixLookup {
        let segments: Vec<&str> = path
            .trim_start_matches('/')
            .split('/')
            .filter(|s| !s.is_empty())
            .collect();

        let mut params = ParamVec::new();
        let mut allow = Vec::new();
        match self.root.search(&segments, method, &mut params, &mut allow) {
            Some(route) => RadixLookup::Matched { route, params },
            None if !allow.is_empty() => RadixLookup::MethodMismatch { allow },
            None => RadixLookup::NoMatch,
        }
    }
}
