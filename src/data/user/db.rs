use serde::Deserialize;
use utoipa::ToSchema;

use super::{bootstrap_admin_id, User, USER_COLLECTION_NAME};
use crate::data::class::db::ClassDetails;
use crate::data::class::{Class, CLASS_COLLECTION_NAME};
use crate::data::notification::{Notification, NOTIFICATION_COLLECTION_NAME};
use crate::error::SchedulingError;
use crate::role::Role;
use crate::store::{DocumentStore, SchedulingStore};

#[derive(Clone, Deserialize, ToSchema)]
pub struct LoginData {
    pub username: String,
    #[schema(format = Password)]
    pub code: String,
}

impl std::fmt::Debug for LoginData {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "LoginData:{}", self.username)
    }
}

/// Add-user wizard submission. Classes are booked for the new user.
#[derive(Clone, Deserialize, ToSchema)]
pub struct UserCreateData {
    pub username: String,
    pub code: String,
    #[serde(default)]
    pub role: Role,
    #[serde(default)]
    pub classes: Vec<ClassDetails>,
}

impl std::fmt::Debug for UserCreateData {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "UserCreateData:{}:{}:{} classes",
            self.username,
            self.role,
            self.classes.len()
        )
    }
}

#[derive(Clone, Deserialize, ToSchema)]
pub struct UserUpdateData {
    pub username: String,
    pub code: String,
}

impl std::fmt::Debug for UserUpdateData {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "UserUpdateData:{}", self.username)
    }
}

fn require(value: &str, field: &'static str) -> Result<(), SchedulingError> {
    if value.trim().is_empty() {
        return Err(SchedulingError::MissingField(field));
    }
    Ok(())
}

#[allow(async_fn_in_trait)]
pub trait UserDbExt {
    /// Seeds the configured superuser, rewriting its code and admin flags. A
    /// record already holding the username is taken over and everything that
    /// pointed at it is moved to the superuser.
    async fn bootstrap(&self) -> Result<User, SchedulingError>;

    async fn list_users(&self, query: Option<&str>) -> Result<Vec<User>, SchedulingError>;
    async fn find_user(&self, id: &str) -> Result<Option<User>, SchedulingError>;

    async fn create_user(
        &self,
        username: &str,
        code: &str,
        role: Role,
    ) -> Result<User, SchedulingError>;
    /// Teacher creators own the booked classes; admin bookings have no owner.
    async fn create_user_with_classes(
        &self,
        data: UserCreateData,
        creator: Option<&User>,
    ) -> Result<(User, Vec<Class>), SchedulingError>;
    async fn update_user(
        &self,
        id: &str,
        username: &str,
        code: &str,
    ) -> Result<User, SchedulingError>;

    /// Removes the user, then their classes, then their notifications. A
    /// failure part way leaves the earlier steps applied.
    async fn delete_user(&self, id: &str) -> Result<User, SchedulingError>;

    async fn authenticate(&self, username: &str, code: &str) -> Result<User, SchedulingError>;
}

impl<S: DocumentStore> UserDbExt for SchedulingStore<S> {
    #[tracing::instrument(skip(self))]
    async fn bootstrap(&self) -> Result<User, SchedulingError> {
        let admin = User::bootstrap_admin(&self.settings().bootstrap_admin);

        let replaced = self
            .update_collection(USER_COLLECTION_NAME, |users: &mut Vec<User>| {
                let mut replaced = vec![];
                users.retain(|u| {
                    let taken = u.username == admin.username && u.id != admin.id;
                    if taken {
                        replaced.push(u.id.clone());
                    }
                    !taken
                });

                match users.iter_mut().find(|u| u.id == admin.id) {
                    Some(existing) => *existing = admin.clone(),
                    None => users.push(admin.clone()),
                }
                Ok(replaced)
            })
            .await?;

        if !replaced.is_empty() {
            tracing::warn!(
                "Took over {} stored record(s) named '{}' for the bootstrap admin.",
                replaced.len(),
                admin.username
            );
            reassign(self, &replaced, &admin.id).await?;
        }

        tracing::info!("Bootstrap admin '{}' is in place.", admin.username);
        Ok(admin)
    }

    async fn list_users(&self, query: Option<&str>) -> Result<Vec<User>, SchedulingError> {
        let users: Vec<User> = self.collection(USER_COLLECTION_NAME).await?;

        Ok(match query.map(str::trim).filter(|q| !q.is_empty()) {
            Some(query) => users.into_iter().filter(|u| u.matches(query)).collect(),
            None => users,
        })
    }

    async fn find_user(&self, id: &str) -> Result<Option<User>, SchedulingError> {
        let users: Vec<User> = self.collection(USER_COLLECTION_NAME).await?;
        Ok(users.into_iter().find(|u| u.id == id))
    }

    #[tracing::instrument(skip(self, code))]
    async fn create_user(
        &self,
        username: &str,
        code: &str,
        role: Role,
    ) -> Result<User, SchedulingError> {
        require(username, "username")?;
        require(code, "code")?;

        let user = User::new(username, code, role);

        self.update_collection(USER_COLLECTION_NAME, |users: &mut Vec<User>| {
            if users.iter().any(|u| u.username == username) {
                return Err(SchedulingError::DuplicateUsername(username.to_string()));
            }
            users.push(user.clone());
            Ok(())
        })
        .await?;

        Ok(user)
    }

    #[tracing::instrument(skip(self, creator))]
    async fn create_user_with_classes(
        &self,
        data: UserCreateData,
        creator: Option<&User>,
    ) -> Result<(User, Vec<Class>), SchedulingError> {
        for details in &data.classes {
            details.validate()?;
        }

        let user = self.create_user(&data.username, &data.code, data.role).await?;
        if data.classes.is_empty() {
            return Ok((user, vec![]));
        }

        let owner = creator
            .filter(|c| c.effective_role() == Role::Teacher)
            .map(|c| c.id.clone());
        let booked: Vec<Class> = data
            .classes
            .into_iter()
            .map(|details| Class::new(details, Some(user.id.clone()), owner.clone()))
            .collect();

        self.update_collection(CLASS_COLLECTION_NAME, |classes: &mut Vec<Class>| {
            classes.extend(booked.iter().cloned());
            Ok(())
        })
        .await
        .map_err(|e| {
            tracing::error!("User '{}' created but their classes weren't saved.", user.username);
            e
        })?;

        tracing::info!("Booked {} classes for '{}'.", booked.len(), user.username);
        Ok((user, booked))
    }

    #[tracing::instrument(skip(self, code))]
    async fn update_user(
        &self,
        id: &str,
        username: &str,
        code: &str,
    ) -> Result<User, SchedulingError> {
        require(username, "username")?;
        require(code, "code")?;

        if id == bootstrap_admin_id(&self.settings().bootstrap_admin.username) {
            return Err(SchedulingError::forbidden(
                "the bootstrap admin is managed through configuration",
            ));
        }

        self.update_collection(USER_COLLECTION_NAME, |users: &mut Vec<User>| {
            if users.iter().any(|u| u.username == username && u.id != id) {
                return Err(SchedulingError::DuplicateUsername(username.to_string()));
            }

            let user = users
                .iter_mut()
                .find(|u| u.id == id)
                .ok_or_else(|| SchedulingError::UserNotFound(id.to_string()))?;
            user.username = username.to_string();
            user.code = code.to_string();
            Ok(user.clone())
        })
        .await
    }

    #[tracing::instrument(skip(self))]
    async fn delete_user(&self, id: &str) -> Result<User, SchedulingError> {
        if id == bootstrap_admin_id(&self.settings().bootstrap_admin.username) {
            return Err(SchedulingError::forbidden("the bootstrap admin can't be deleted"));
        }

        let removed = self
            .update_collection(USER_COLLECTION_NAME, |users: &mut Vec<User>| {
                let index = users
                    .iter()
                    .position(|u| u.id == id)
                    .ok_or_else(|| SchedulingError::UserNotFound(id.to_string()))?;
                Ok(users.remove(index))
            })
            .await?;

        let classes_removed = self
            .update_collection(CLASS_COLLECTION_NAME, |classes: &mut Vec<Class>| {
                let before = classes.len();
                classes.retain(|c| {
                    c.student_id.as_deref() != Some(id) && c.created_by.as_deref() != Some(id)
                });
                Ok(before - classes.len())
            })
            .await?;

        let notifications_removed = self
            .update_collection(
                NOTIFICATION_COLLECTION_NAME,
                |notifications: &mut Vec<Notification>| {
                    let before = notifications.len();
                    notifications.retain(|n| n.user_id != id);
                    Ok(before - notifications.len())
                },
            )
            .await?;

        tracing::info!(
            "Deleted user '{}' with {} classes and {} notifications.",
            removed.username,
            classes_removed,
            notifications_removed
        );
        Ok(removed)
    }

    #[tracing::instrument(skip(self, code))]
    async fn authenticate(&self, username: &str, code: &str) -> Result<User, SchedulingError> {
        let users: Vec<User> = self.collection(USER_COLLECTION_NAME).await?;

        let configured = &self.settings().bootstrap_admin;
        if username == configured.username {
            if code != configured.code {
                tracing::debug!("rejected login for '{}'", username);
                return Err(SchedulingError::InvalidCredentials);
            }

            let admin = User::bootstrap_admin(configured);
            let in_place = users
                .iter()
                .filter(|u| u.username == admin.username)
                .eq(std::iter::once(&admin));
            if in_place {
                return Ok(admin);
            }

            tracing::warn!("Bootstrap admin record was missing or altered, seeding it again.");
            return self.bootstrap().await;
        }

        if let Some(user) = users
            .into_iter()
            .find(|u| u.username == username && u.code == code)
        {
            return Ok(user);
        }

        tracing::debug!("rejected login for '{}'", username);
        Err(SchedulingError::InvalidCredentials)
    }
}

/// Points classes and notifications owned by `from` at `to`.
async fn reassign<S: DocumentStore>(
    store: &SchedulingStore<S>,
    from: &[String],
    to: &str,
) -> Result<(), SchedulingError> {
    let moved = |id: &mut Option<String>| {
        if id.as_ref().is_some_and(|old| from.contains(old)) {
            *id = Some(to.to_string());
        }
    };

    store
        .update_collection(CLASS_COLLECTION_NAME, |classes: &mut Vec<Class>| {
            for class in classes.iter_mut() {
                moved(&mut class.created_by);
                moved(&mut class.student_id);
            }
            Ok(())
        })
        .await?;

    store
        .update_collection(
            NOTIFICATION_COLLECTION_NAME,
            |notifications: &mut Vec<Notification>| {
                for notification in notifications.iter_mut() {
                    if from.contains(&notification.user_id) {
                        notification.user_id = to.to_string();
                    }
                }
                Ok(())
            },
        )
        .await
}
