use rocket::serde::json::Json;
use rocket::State;

use crate::data::notification::db::NotificationDbExt;
use crate::data::notification::Notification;
use crate::resp::problem::Problem;
use crate::resp::session::Actor;
use crate::Store;

#[utoipa::path(
    responses(
        (status = 200, description = "Caller's notifications, newest first"),
        (status = 401, description = "Not signed in", body = Problem),
    )
)]
#[get("/notifications")]
#[tracing::instrument(skip(store))]
pub async fn notification_list(
    actor: Actor,
    store: &State<Store>,
) -> Result<Json<Vec<Notification>>, Problem> {
    Ok(Json(store.notifications_for(&actor.0).await?))
}

#[utoipa::path(responses((status = 200, description = "Test notification sent to the caller")))]
#[post("/notifications/test")]
#[tracing::instrument(skip(store))]
pub async fn notification_test(
    actor: Actor,
    store: &State<Store>,
) -> Result<Json<Notification>, Problem> {
    Ok(Json(store.send_test_notification(&actor.0).await?))
}
