use super::{Notification, NotificationPayload, TestData, NOTIFICATION_COLLECTION_NAME};
use crate::data::user::User;
use crate::error::SchedulingError;
use crate::store::{DocumentStore, SchedulingStore};

#[allow(async_fn_in_trait)]
pub trait NotificationDbExt {
    /// Appends one notification per recipient in a single write.
    async fn notify(
        &self,
        recipients: &[String],
        payload: NotificationPayload,
        class_id: Option<&str>,
    ) -> Result<Vec<Notification>, SchedulingError>;

    /// Newest first.
    async fn notifications_for(&self, viewer: &User) -> Result<Vec<Notification>, SchedulingError>;

    async fn send_test_notification(&self, user: &User) -> Result<Notification, SchedulingError>;
}

impl<S: DocumentStore> NotificationDbExt for SchedulingStore<S> {
    #[tracing::instrument(skip(self, payload))]
    async fn notify(
        &self,
        recipients: &[String],
        payload: NotificationPayload,
        class_id: Option<&str>,
    ) -> Result<Vec<Notification>, SchedulingError> {
        if recipients.is_empty() {
            return Ok(vec![]);
        }

        let now = self.now();
        let created: Vec<Notification> = recipients
            .iter()
            .map(|r| Notification::new(r, payload.clone(), class_id.map(str::to_string), now))
            .collect();

        self.update_collection(
            NOTIFICATION_COLLECTION_NAME,
            |notifications: &mut Vec<Notification>| {
                notifications.extend(created.iter().cloned());
                Ok(())
            },
        )
        .await?;

        tracing::debug!("{} notifications sent", created.len());
        Ok(created)
    }

    async fn notifications_for(&self, viewer: &User) -> Result<Vec<Notification>, SchedulingError> {
        let mut notifications: Vec<Notification> = self
            .collection::<Notification>(NOTIFICATION_COLLECTION_NAME)
            .await?
            .into_iter()
            .filter(|n| n.is_addressed_to(viewer))
            .collect();

        notifications.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        Ok(notifications)
    }

    #[tracing::instrument(skip(self, user), fields(user = %user.username))]
    async fn send_test_notification(&self, user: &User) -> Result<Notification, SchedulingError> {
        let payload = NotificationPayload::Test(TestData {
            message: format!("Test notification for {}", user.username),
            timestamp: self.now(),
        });

        let mut sent = self.notify(&[user.id.clone()], payload, None).await?;
        sent.pop()
            .ok_or_else(|| SchedulingError::Conflict(NOTIFICATION_COLLECTION_NAME.to_string()))
    }
}
