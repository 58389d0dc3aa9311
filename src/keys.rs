//! Cache key construction.
//!
//! Every producer and consumer of a cached value builds its key here, so they
//! always agree. Keys are relative to their namespace; [`NamespaceCache`]
//! adds the namespace prefix.
//!
//! | Namespace      | Keys |
//! |----------------|------|
//! | `event`        | `detail:<id>`, `attendees:<id>`, `list:<filter>` |
//! | `user`         | `profile:<id>`, `events:<id>`, `list:<filter>` |
//! | `image`        | `item:<id>`, `event:<event id>` |
//! | `video`        | `item:<id>`, `event:<event id>` |
//! | `document`     | `item:<id>`, `event:<event id>` |
//! | `coordination` | `event:<event id>` |
//! | `api`          | `<route>:<filter>` |
//!
//! [`NamespaceCache`]: crate::cache::NamespaceCache

use std::collections::BTreeMap;
use std::fmt;

/// Prefix shared by every list view in a namespace.
pub const LIST_PREFIX: &str = "list:";

/// Prefix of per-member event lists in the `user` namespace.
pub const USER_EVENTS_PREFIX: &str = "events:";

// == List Filter ==
/// Filter descriptor of a list view.
///
/// Fields render in sorted order, so two filters with the same fields always
/// produce the same key no matter how they were built.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListFilter {
    fields: BTreeMap<String, String>,
}

impl ListFilter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds or replaces a field. Empty values are ignored.
    pub fn with(mut self, field: impl Into<String>, value: impl ToString) -> Self {
        let value = value.to_string();
        if !value.is_empty() {
            self.fields.insert(field.into(), value);
        }
        self
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

impl fmt::Display for ListFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.fields.is_empty() {
            return f.write_str("all");
        }
        let mut first = true;
        for (field, value) in &self.fields {
            if !first {
                f.write_str("&")?;
            }
            first = false;
            write!(f, "{}={}", sanitize(field), sanitize(value))?;
        }
        Ok(())
    }
}

/// Percent-encodes separators, glob characters, whitespace and `%` itself.
///
/// The mapping is injective: distinct segments always yield distinct output.
fn sanitize(segment: &str) -> String {
    let mut out = String::with_capacity(segment.len());
    for c in segment.chars() {
        match c {
            '%' | ':' | '&' | '=' | '*' | '?' | '[' | ']' | '\\' => push_escaped(&mut out, c),
            c if c.is_whitespace() => push_escaped(&mut out, c),
            c => out.push(c),
        }
    }
    out
}

fn push_escaped(out: &mut String, c: char) {
    let mut buf = [0u8; 4];
    for byte in c.encode_utf8(&mut buf).bytes() {
        out.push_str(&format!("%{byte:02X}"));
    }
}

// == Event Namespace ==

pub fn event_detail(event_id: &str) -> String {
    format!("detail:{event_id}")
}

/// Attendee list and counts of one event.
pub fn event_attendees(event_id: &str) -> String {
    format!("attendees:{event_id}")
}

pub fn event_list(filter: &ListFilter) -> String {
    format!("{LIST_PREFIX}{filter}")
}

// == User Namespace ==

pub fn user_profile(user_id: &str) -> String {
    format!("profile:{user_id}")
}

/// Events a member is registered for.
pub fn user_events(user_id: &str) -> String {
    format!("{USER_EVENTS_PREFIX}{user_id}")
}

pub fn user_list(filter: &ListFilter) -> String {
    format!("{LIST_PREFIX}{filter}")
}

// == Media and Documents ==
// Shared by the `image`, `video` and `document` namespaces.

pub fn media_item(id: &str) -> String {
    format!("item:{id}")
}

/// All media of one kind attached to an event.
pub fn event_media(event_id: &str) -> String {
    format!("event:{event_id}")
}

// == Coordination Namespace ==

pub fn coordination(event_id: &str) -> String {
    format!("event:{event_id}")
}

// == API Namespace ==

pub fn api_response(route: &str, filter: &ListFilter) -> String {
    format!("{}:{filter}", sanitize(route))
}
