use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::{CancellationStatus, Class, CLASS_COLLECTION_NAME};
use crate::data::notification::db::NotificationDbExt;
use crate::data::notification::{
    cancellation_recipients, Notification, NotificationPayload, ADMIN_RECIPIENT,
    NOTIFICATION_COLLECTION_NAME,
};
use crate::data::user::{User, USER_COLLECTION_NAME};
use crate::error::SchedulingError;
use crate::store::{DocumentStore, SchedulingStore};

/// Editable fields of a class.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct ClassDetails {
    #[schema(example = "2030-01-10")]
    pub date: String,
    #[schema(example = "15:00")]
    pub hour: String,
    pub teacher: String,
    pub location: String,
    pub name: String,
}

impl ClassDetails {
    pub fn validate(&self) -> Result<(), SchedulingError> {
        for (value, field) in [
            (&self.date, "date"),
            (&self.hour, "hour"),
            (&self.teacher, "teacher"),
            (&self.location, "location"),
            (&self.name, "name"),
        ] {
            if value.trim().is_empty() {
                return Err(SchedulingError::MissingField(field));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ClassCreateData {
    #[serde(flatten)]
    pub details: ClassDetails,
    #[serde(default)]
    pub student_id: Option<String>,
}

/// A class as listed to a particular viewer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct ClassView {
    #[serde(flatten)]
    pub class: Class,
    pub cancellation: CancellationStatus,
}

#[allow(async_fn_in_trait)]
pub trait ClassDbExt {
    async fn list_classes(&self) -> Result<Vec<Class>, SchedulingError>;
    async fn find_class(&self, id: &str) -> Result<Option<Class>, SchedulingError>;

    /// Classes on the viewer's calendar, earliest first. Classes whose start
    /// can't be parsed go last.
    async fn classes_for(
        &self,
        viewer: &User,
        query: Option<&str>,
    ) -> Result<Vec<Class>, SchedulingError>;

    async fn create_class(
        &self,
        data: ClassCreateData,
        creator: Option<&User>,
    ) -> Result<Class, SchedulingError>;
    async fn update_class(&self, id: &str, details: ClassDetails)
        -> Result<Class, SchedulingError>;
    async fn cancel_class(&self, id: &str, actor: &User) -> Result<Class, SchedulingError>;
    async fn delete_class(&self, id: &str) -> Result<Class, SchedulingError>;

    fn cancellation_status(&self, class: &Class, viewer: &User) -> CancellationStatus;
}

impl<S: DocumentStore> ClassDbExt for SchedulingStore<S> {
    async fn list_classes(&self) -> Result<Vec<Class>, SchedulingError> {
        self.collection(CLASS_COLLECTION_NAME).await
    }

    async fn find_class(&self, id: &str) -> Result<Option<Class>, SchedulingError> {
        Ok(self.list_classes().await?.into_iter().find(|c| c.id == id))
    }

    async fn classes_for(
        &self,
        viewer: &User,
        query: Option<&str>,
    ) -> Result<Vec<Class>, SchedulingError> {
        let query = query.map(str::trim).filter(|q| !q.is_empty());

        let mut classes: Vec<Class> = self
            .list_classes()
            .await?
            .into_iter()
            .filter(|c| c.is_visible_to(viewer))
            .filter(|c| query.map_or(true, |q| c.matches(q)))
            .collect();

        classes.sort_by_cached_key(|c| match c.starts_at() {
            Ok(start) => (false, Some(start)),
            Err(_) => (true, None),
        });

        Ok(classes)
    }

    #[tracing::instrument(skip(self, creator))]
    async fn create_class(
        &self,
        data: ClassCreateData,
        creator: Option<&User>,
    ) -> Result<Class, SchedulingError> {
        data.details.validate()?;

        let class = Class::new(
            data.details,
            data.student_id,
            creator.map(|u| u.id.clone()),
        );

        self.update_collection(CLASS_COLLECTION_NAME, |classes: &mut Vec<Class>| {
            classes.push(class.clone());
            Ok(())
        })
        .await?;

        tracing::info!("Class '{}' scheduled on {} {}.", class.name, class.date, class.hour);

        if let Some(creator) = creator {
            self.notify(
                &[ADMIN_RECIPIENT.to_string()],
                NotificationPayload::new_class(&class, creator),
                Some(&class.id),
            )
            .await?;
        }

        Ok(class)
    }

    #[tracing::instrument(skip(self))]
    async fn update_class(
        &self,
        id: &str,
        details: ClassDetails,
    ) -> Result<Class, SchedulingError> {
        details.validate()?;

        self.update_collection(CLASS_COLLECTION_NAME, |classes: &mut Vec<Class>| {
            let class = classes
                .iter_mut()
                .find(|c| c.id == id)
                .ok_or_else(|| SchedulingError::ClassNotFound(id.to_string()))?;
            class.apply(details.clone());
            Ok(class.clone())
        })
        .await
    }

    #[tracing::instrument(skip(self, actor), fields(actor = %actor.username))]
    async fn cancel_class(&self, id: &str, actor: &User) -> Result<Class, SchedulingError> {
        let now = self.now();

        let class = self
            .update_collection(CLASS_COLLECTION_NAME, |classes: &mut Vec<Class>| {
                let index = classes
                    .iter()
                    .position(|c| c.id == id)
                    .ok_or_else(|| SchedulingError::ClassNotFound(id.to_string()))?;
                classes[index].check_cancellation(actor, now)?;
                Ok(classes.remove(index))
            })
            .await?;

        let users: Vec<User> = self.collection(USER_COLLECTION_NAME).await?;
        let recipients = cancellation_recipients(&class, actor, &users);
        self.notify(
            &recipients,
            NotificationPayload::class_cancelled(&class, actor),
            Some(&class.id),
        )
        .await
        .map_err(|e| {
            tracing::error!("Class '{}' cancelled but nobody was notified.", class.id);
            e
        })?;

        tracing::info!(
            "Class '{}' cancelled by '{}', {} recipients notified.",
            class.name,
            actor.username,
            recipients.len()
        );
        Ok(class)
    }

    #[tracing::instrument(skip(self))]
    async fn delete_class(&self, id: &str) -> Result<Class, SchedulingError> {
        let removed = self
            .update_collection(CLASS_COLLECTION_NAME, |classes: &mut Vec<Class>| {
                let index = classes
                    .iter()
                    .position(|c| c.id == id)
                    .ok_or_else(|| SchedulingError::ClassNotFound(id.to_string()))?;
                Ok(classes.remove(index))
            })
            .await?;

        let dropped = self
            .update_collection(
                NOTIFICATION_COLLECTION_NAME,
                |notifications: &mut Vec<Notification>| {
                    let before = notifications.len();
                    notifications.retain(|n| n.class_id.as_deref() != Some(id));
                    Ok(before - notifications.len())
                },
            )
            .await?;

        tracing::info!("Deleted class '{}' and {} notifications about it.", removed.name, dropped);
        Ok(removed)
    }

    fn cancellation_status(&self, class: &Class, viewer: &User) -> CancellationStatus {
        class.cancellation_status(viewer, self.now())
    }
}
