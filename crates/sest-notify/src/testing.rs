//! Test doubles for the notification side.

use std::sync::Mutex;

use chrono::{TimeZone, Utc};
use sest_engine::Reaction;
use sest_types::{ActionKind, Channel, Field, NotificationTarget, OperatorKind, Record, Rule};

use crate::error::DispatchError;
use crate::transport::{Notification, NotificationTransport};

/// Records every message; optionally refuses them all.
#[derive(Default)]
pub struct RecordingTransport {
    pub sent: Mutex<Vec<Notification>>,
    pub reject: bool,
}

impl RecordingTransport {
    pub fn sent(&self) -> Vec<Notification> {
        self.sent.lock().unwrap().clone()
    }
}

impl NotificationTransport for RecordingTransport {
    async fn send(&self, notification: &Notification) -> Result<u32, DispatchError> {
        self.sent.lock().unwrap().push(notification.clone());
        if self.reject {
            return Err(DispatchError::Rejected {
                address: notification.address.clone(),
                code: 300,
                message: "Invalid email request".into(),
            });
        }
        Ok(1)
    }
}

pub fn reaction(action: ActionKind, target: Option<&str>) -> Reaction {
    let channel = Channel {
        id: 12,
        owner: "test".into(),
        title: "boiler room".into(),
        description: String::new(),
        write_key: "key".into(),
        max_fields: 2,
        last_update: Utc::now(),
        notification_target: target.map(|address| NotificationTarget {
            address: address.into(),
            owner: "test".into(),
        }),
        encodings: Default::default(),
        rules: Vec::new(),
    };
    let rule = Rule {
        id: 3,
        channel_id: 12,
        operator: OperatorKind::Gt,
        position: 1,
        value: "90".into(),
        value_optional: None,
        action,
    };
    let record = Record {
        id: 40,
        channel_id: 12,
        insertion_time: Utc.with_ymd_and_hms(2024, 3, 9, 14, 5, 7).unwrap(),
        fields: vec![Field {
            record_id: 40,
            position: 1,
            raw: "97.5".into(),
        }],
    };
    Reaction { channel, rule, record }
}
