use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub mod db;

use crate::data::class::Class;
use crate::data::user::User;
use crate::role::Role;

pub static NOTIFICATION_COLLECTION_NAME: &str = "flowNotifications";

/// Recipient id shared by every administrator.
pub static ADMIN_RECIPIENT: &str = "admin";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    pub id: String,
    /// [`ADMIN_RECIPIENT`] or a user id.
    pub user_id: String,
    #[serde(flatten)]
    pub payload: NotificationPayload,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub read: bool,
    /// Class the notification is about. Records written before this field
    /// existed don't have it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub class_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum NotificationPayload {
    NewClass(NewClassData),
    ClassCancelled(ClassCancelledData),
    Test(TestData),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewClassData {
    pub teacher: String,
    pub class_name: String,
    pub date: String,
    pub hour: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassCancelledData {
    pub cancelled_by: String,
    pub class_name: String,
    pub date: String,
    pub hour: String,
    pub teacher: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestData {
    pub message: String,
    pub timestamp: DateTime<Utc>,
}

impl NotificationPayload {
    pub fn new_class(class: &Class, scheduled_by: &User) -> NotificationPayload {
        NotificationPayload::NewClass(NewClassData {
            teacher: scheduled_by.username.clone(),
            class_name: class.name.clone(),
            date: class.date.clone(),
            hour: class.hour.clone(),
        })
    }

    pub fn class_cancelled(class: &Class, cancelled_by: &User) -> NotificationPayload {
        NotificationPayload::ClassCancelled(ClassCancelledData {
            cancelled_by: cancelled_by.username.clone(),
            class_name: class.name.clone(),
            date: class.date.clone(),
            hour: class.hour.clone(),
            teacher: class.teacher.clone(),
        })
    }
}

impl Notification {
    pub fn new(
        user_id: impl ToString,
        payload: NotificationPayload,
        class_id: Option<String>,
        timestamp: DateTime<Utc>,
    ) -> Notification {
        Notification {
            id: Uuid::new_v4().to_string(),
            user_id: user_id.to_string(),
            payload,
            timestamp,
            read: false,
            class_id,
        }
    }

    pub fn is_addressed_to(&self, viewer: &User) -> bool {
        if self.user_id == viewer.id {
            return true;
        }
        match viewer.effective_role() {
            Role::Admin => self.user_id == ADMIN_RECIPIENT,
            Role::Teacher | Role::Student => false,
        }
    }
}

/// Everyone told about a cancellation: the admins always, the scheduling
/// teacher while they still exist, and the student. Whoever cancelled isn't
/// told. Admins only ever get the shared [`ADMIN_RECIPIENT`] copy.
pub fn cancellation_recipients(class: &Class, actor: &User, users: &[User]) -> Vec<String> {
    let mut recipients = vec![ADMIN_RECIPIENT.to_string()];

    let creator = class
        .created_by
        .as_deref()
        .and_then(|id| users.iter().find(|u| u.id == id))
        .filter(|u| u.effective_role() != Role::Admin)
        .map(|u| &u.id);

    for party in [creator, class.student_id.as_ref()].into_iter().flatten() {
        if *party != actor.id && !recipients.contains(party) {
            recipients.push(party.clone());
        }
    }

    recipients
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn user(id: &str, role: Role) -> User {
        User {
            id: id.to_string(),
            username: format!("{}-name", id),
            code: "0".to_string(),
            is_admin: role == Role::Admin,
            role,
        }
    }

    fn class() -> Class {
        Class {
            id: "c".to_string(),
            date: "2030-01-10".to_string(),
            hour: "15:00".to_string(),
            teacher: "Tamar".to_string(),
            location: "Zoom".to_string(),
            name: "Grammar".to_string(),
            student_id: Some("s".to_string()),
            created_by: Some("t".to_string()),
        }
    }

    #[test]
    fn keeps_the_stored_wire_shape() {
        let stored = json!({
            "id": "1700000000000",
            "userId": "admin",
            "type": "class_cancelled",
            "data": {
                "cancelledBy": "dana",
                "className": "Grammar",
                "date": "2030-01-10",
                "hour": "15:00",
                "teacher": "Tamar"
            },
            "timestamp": "2024-05-01T10:00:00.000Z",
            "read": false
        });

        let notification: Notification = serde_json::from_value(stored.clone()).expect("stored notification");
        assert_eq!(notification.class_id, None);
        assert!(matches!(
            notification.payload,
            NotificationPayload::ClassCancelled(ref data) if data.cancelled_by == "dana"
        ));

        let written = serde_json::to_value(&notification).unwrap();
        assert_eq!(written["type"], stored["type"]);
        assert_eq!(written["data"], stored["data"]);
        assert_eq!(written["userId"], "admin");
        assert!(written.get("classId").is_none());
    }

    #[test]
    fn test_payload_shape() {
        let at = "2024-05-01T10:00:00Z".parse::<DateTime<Utc>>().unwrap();
        let notification = Notification::new(
            "u",
            NotificationPayload::Test(TestData {
                message: "ping".to_string(),
                timestamp: at,
            }),
            None,
            at,
        );
        let written = serde_json::to_value(&notification).unwrap();
        assert_eq!(written["type"], "test");
        assert_eq!(written["data"]["message"], "ping");
    }

    #[test]
    fn admins_read_the_shared_feed() {
        let shared = Notification::new(
            ADMIN_RECIPIENT,
            NotificationPayload::new_class(&class(), &user("t", Role::Teacher)),
            None,
            Utc::now(),
        );

        assert!(shared.is_addressed_to(&user("a", Role::Admin)));
        assert!(!shared.is_addressed_to(&user("t", Role::Teacher)));
        assert!(!shared.is_addressed_to(&user("s", Role::Student)));
    }

    #[test]
    fn recipients_skip_the_actor() {
        let class = class();
        let users = vec![user("t", Role::Teacher), user("s", Role::Student)];

        assert_eq!(
            cancellation_recipients(&class, &user("a", Role::Admin), &users),
            vec!["admin", "t", "s"]
        );
        assert_eq!(
            cancellation_recipients(&class, &user("t", Role::Teacher), &users),
            vec!["admin", "s"]
        );
        assert_eq!(
            cancellation_recipients(&class, &user("s", Role::Student), &users),
            vec!["admin", "t"]
        );

        let mut unassigned = class.clone();
        unassigned.student_id = None;
        assert_eq!(
            cancellation_recipients(&unassigned, &user("t", Role::Teacher), &users),
            vec!["admin"]
        );
    }

    #[test]
    fn admin_creators_share_the_admin_copy() {
        let mut class = class();
        class.created_by = Some("a".to_string());
        let users = vec![user("a", Role::Admin), user("s", Role::Student)];

        assert_eq!(
            cancellation_recipients(&class, &user("s", Role::Student), &users),
            vec!["admin"]
        );
    }

    #[test]
    fn departed_creators_are_skipped() {
        let class = class();
        let users = vec![user("s", Role::Student)];

        assert_eq!(
            cancellation_recipients(&class, &user("s", Role::Student), &users),
            vec!["admin"]
        );
    }
}
