//! Ward mutation workflows.
//!
//! Each workflow performs its EMR writes, turns the outcome into a
//! [`Notification`], and then invalidates the ward view whether or not the
//! writes succeeded. Write failures never surface as `Err`.

mod actions;
mod admission_form;
mod bed_fee;

pub use actions::*;
pub use admission_form::*;
pub use bed_fee::*;

use serde::{Deserialize, Serialize};

use crate::models::ResourceRef;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum NotificationKind {
    Success,
    Warning,
    Error,
}

/// User-facing outcome of a workflow.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Notification {
    pub kind: NotificationKind,
    pub title: String,
    #[serde(default)]
    pub subtitle: Option<String>,
}

impl Notification {
    fn new(kind: NotificationKind, title: &str, subtitle: Option<String>) -> Self {
        Self {
            kind,
            title: title.to_string(),
            subtitle,
        }
    }

    pub fn success(title: &str, subtitle: Option<String>) -> Self {
        Self::new(NotificationKind::Success, title, subtitle)
    }

    pub fn warning(title: &str, subtitle: Option<String>) -> Self {
        Self::new(NotificationKind::Warning, title, subtitle)
    }

    pub fn error(title: &str, subtitle: impl Into<String>) -> Self {
        Self::new(NotificationKind::Error, title, Some(subtitle.into()))
    }

    pub fn is_success(&self) -> bool {
        self.kind == NotificationKind::Success
    }
}

/// The signed-in user's session: where they work and who they are.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Session {
    pub location: ResourceRef,
    #[serde(default)]
    pub provider: Option<ResourceRef>,
}

impl Session {
    pub fn new(location_uuid: impl Into<String>, provider_uuid: Option<String>) -> Self {
        Self {
            location: ResourceRef::new(location_uuid),
            provider: provider_uuid.map(ResourceRef::new),
        }
    }
}
