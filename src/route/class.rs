use rocket::serde::json::Json;
use rocket::State;

use crate::data::class::db::{ClassCreateData, ClassDbExt, ClassDetails, ClassView};
use crate::data::class::Class;
use crate::error::SchedulingError;
use crate::resp::problem::Problem;
use crate::resp::session::Actor;
use crate::Store;

#[utoipa::path(
    responses(
        (status = 200, description = "Classes on the caller's calendar, earliest first", body = [ClassView]),
        (status = 401, description = "Not signed in", body = Problem),
    )
)]
#[get("/class?<q>")]
#[tracing::instrument(skip(store))]
pub async fn class_list(
    q: Option<&str>,
    actor: Actor,
    store: &State<Store>,
) -> Result<Json<Vec<ClassView>>, Problem> {
    let classes = store.classes_for(&actor.0, q).await?;

    Ok(Json(
        classes
            .into_iter()
            .map(|class| ClassView {
                cancellation: store.cancellation_status(&class, &actor.0),
                class,
            })
            .collect(),
    ))
}

#[utoipa::path(
    request_body = ClassCreateData,
    responses(
        (status = 200, description = "Class scheduled", body = Class),
        (status = 403, description = "Students can't schedule classes", body = Problem),
    )
)]
#[post("/class", format = "application/json", data = "<class>")]
#[tracing::instrument(skip(store))]
pub async fn class_create(
    class: Json<ClassCreateData>,
    actor: Actor,
    store: &State<Store>,
) -> Result<Json<Class>, Problem> {
    if !actor.role().can_schedule() {
        return Err(SchedulingError::forbidden("only admins and teachers schedule classes").into());
    }

    Ok(Json(store.create_class(class.into_inner(), Some(&actor.0)).await?))
}

#[utoipa::path(
    request_body = ClassDetails,
    responses(
        (status = 200, description = "Class updated", body = Class),
        (status = 404, description = "No such class", body = Problem),
    )
)]
#[put("/class/<id>", format = "application/json", data = "<details>")]
#[tracing::instrument(skip(store))]
pub async fn class_update(
    id: &str,
    details: Json<ClassDetails>,
    actor: Actor,
    store: &State<Store>,
) -> Result<Json<Class>, Problem> {
    actor.require_admin()?;

    Ok(Json(store.update_class(id, details.into_inner()).await?))
}

#[utoipa::path(
    responses(
        (status = 200, description = "Removed class", body = Class),
        (status = 404, description = "No such class", body = Problem),
    )
)]
#[delete("/class/<id>")]
#[tracing::instrument(skip(store))]
pub async fn class_delete(id: &str, actor: Actor, store: &State<Store>) -> Result<Json<Class>, Problem> {
    actor.require_admin()?;

    Ok(Json(store.delete_class(id).await?))
}

#[utoipa::path(
    responses(
        (status = 200, description = "Cancelled class", body = Class),
        (status = 403, description = "Not the admin, scheduling teacher or student", body = Problem),
        (status = 422, description = "Class starts in 3 hours or less", body = Problem),
    )
)]
#[post("/class/<id>/cancel")]
#[tracing::instrument(skip(store))]
pub async fn class_cancel(id: &str, actor: Actor, store: &State<Store>) -> Result<Json<Class>, Problem> {
    Ok(Json(store.cancel_class(id, &actor.0).await?))
}
