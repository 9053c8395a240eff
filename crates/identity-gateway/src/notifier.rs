//! Tells identities holding access rules on an attribute that it changed.

use std::collections::BTreeSet;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc::UnboundedSender;

use crate::access::AccessRightsEngine;
use crate::attributes::AttributeEvent;
use crate::error::Result;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeKind {
    Created,
    Updated,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttributeNotification {
    /// Identity pattern of the rule holder being notified.
    pub identity: String,
    pub user_id: String,
    pub attr_type: String,
    pub id: String,
    pub change: ChangeKind,
}

pub struct AttributeNotifier {
    access: Arc<AccessRightsEngine>,
    sender: UnboundedSender<AttributeNotification>,
}

impl AttributeNotifier {
    pub fn new(access: Arc<AccessRightsEngine>, sender: UnboundedSender<AttributeNotification>) -> Self {
        Self { access, sender }
    }

    /// Send one notification per distinct identity whose live rules cover the
    /// attribute or anything below it. Returns how many were sent.
    pub fn notify(&self, event: &AttributeEvent) -> Result<usize> {
        let (key, change) = match event {
            AttributeEvent::Created { key } => (key, ChangeKind::Created),
            AttributeEvent::Updated { key } => (key, ChangeKind::Updated),
            AttributeEvent::Deleted { .. } => return Ok(0),
        };

        let filter = format!("{}*", key.path());
        let identities: BTreeSet<String> = self
            .access
            .list(&key.user_id, Some(&filter))?
            .into_iter()
            .map(|rule| rule.identity)
            .collect();

        let mut sent = 0;
        for identity in identities {
            let notification = AttributeNotification {
                identity,
                user_id: key.user_id.clone(),
                attr_type: key.attr_type.clone(),
                id: key.id.clone(),
                change,
            };
            if self.sender.send(notification).is_err() {
                log::debug!("attribute notification receiver dropped");
                break;
            }
            sent += 1;
        }
        log::debug!("notified {sent} identities about {key}");
        Ok(sent)
    }
}
