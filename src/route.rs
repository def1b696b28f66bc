//! Route templates and their validation.
//!
//! A template is an ordered sequence of `/`-separated segments, each either a
//! literal (`subcommand`) or a named placeholder (`{param_a}`). Templates are
//! validated eagerly at registration so a malformed table is a startup error,
//! never a per-request surprise.

use http::Method;
use std::sync::Arc;
use thiserror::Error;

/// One parsed segment of a route template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    /// Matches this exact string. Whitespace is significant.
    Literal(String),
    /// Matches any single segment, binding it to the named parameter.
    Param(Arc<str>),
}

/// Template rejected at registration time.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TemplateError {
    #[error("template must start with '/': {0}")]
    MissingLeadingSlash(String),
    #[error("empty parameter name in template {0}")]
    EmptyParamName(String),
    #[error("duplicate parameter name {name} in template {template}")]
    DuplicateParam { template: String, name: String },
    #[error("unbalanced braces in segment {0}")]
    UnbalancedBraces(String),
}

/// Metadata for one registered route.
#[derive(Debug, Clone)]
pub struct RouteMeta {
    /// HTTP method this route answers.
    pub method: Method,
    /// The original template string, e.g. `/test/{param_a}/subcommand/{param_b}`.
    pub path_pattern: String,
    /// Parsed segments, in template order.
    pub segments: Vec<Segment>,
    /// Name the dispatcher uses to find the handler.
    pub handler_name: Arc<str>,
    /// When set, a request without a body fails with 400 before dispatch.
    pub requires_body: bool,
}

impl RouteMeta {
    /// Parse and validate a template.
    pub fn new(
        method: Method,
        path_pattern: &str,
        handler_name: &str,
    ) -> Result<Self, TemplateError> {
        let segments = parse_template(path_pattern)?;
        Ok(Self {
            method,
            path_pattern: path_pattern.to_string(),
            segments,
            handler_name: Arc::from(handler_name),
            requires_body: false,
        })
    }

    #[must_use]
    pub fn with_required_body(mut self) -> Self {
        self.requires_body = true;
        self
    }

    /// Parameter names in declaration order.
    #[must_use]
    pub fn param_names(&self) -> Vec<Arc<str>> {
        self.segments
            .iter()
            .filter_map(|s| match s {
                Segment::Param(name) => Some(Arc::clone(name)),
                Segment::Literal(_) => None,
            })
            .collect()
    }

    /// Substitute captured parameters back into the template. Returns `None`
    /// if a placeholder has no binding. The inverse of matching: for any path
    /// P matched by this route, rendering the captured params recovers P.
    #[must_use]
    pub fn render_path(&self, params: &[(Arc<str>, String)]) -> Option<String> {
        let mut out = String::with_capacity(self.path_pattern.len());
        for segment in &self.segments {
            out.push('/');
            match segment {
                Segment::Literal(lit) => out.push_str(lit),
                Segment::Param(name) => {
                    let (_, value) = params.iter().find(|(k, _)| k == name)?;
                    out.push_str(value);
                }
            }
        }
        if out.is_empty() {
            out.push('/');
        }
        Some(out)
    }
}

/// Split a template into validated segments.
///
/// Trailing empty segments are ignored (`/health/` equals `/health`), matching
/// how request paths are segmented at match time.
pub fn parse_template(pattern: &str) -> Result<Vec<Segment>, TemplateError> {
    let Some(rest) = pattern.strip_prefix('/') else {
        return Err(TemplateError::MissingLeadingSlash(pattern.to_string()));
    };

    let mut segments = Vec::new();
    let mut seen: Vec<&str> = Vec::new();
    for raw in rest.split('/').filter(|s| !s.is_empty()) {
        if let Some(inner) = raw.strip_prefix('{') {
            let Some(name) = inner.strip_suffix('}') else {
                return Err(TemplateError::UnbalancedBraces(raw.to_string()));
            };
            if name.is_empty() {
                return Err(TemplateError::EmptyParamName(pattern.to_string()));
            }
            if seen.contains(&name) {
                return Err(TemplateError::DuplicateParam {
                    template: pattern.to_string(),
                    name: name.to_string(),
                });
            }
            seen.push(name);
            segments.push(Segment::Param(Arc::from(name)));
        } else if raw.contains('{') || raw.contains('}') {
            return Err(TemplateError::UnbalancedBraces(raw.to_string()));
        } else {
            segments.push(Segment::Literal(raw.to_string()));
        }
    }
    Ok(segments)
}
