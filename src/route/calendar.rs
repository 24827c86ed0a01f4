use chrono::NaiveDate;
use rocket::serde::json::Json;
use rocket::State;

use crate::calendar::class_days_in_month;
use crate::data::class::db::ClassDbExt;
use crate::resp::problem::problems::invalid_month;
use crate::resp::problem::Problem;
use crate::resp::session::Actor;
use crate::Store;

#[utoipa::path(
    responses(
        (status = 200, description = "Days of the month with a class for the caller", body = [String]),
        (status = 400, description = "No such month", body = Problem),
    )
)]
#[get("/calendar/<year>/<month>")]
#[tracing::instrument(skip(store))]
pub async fn calendar_month(
    year: i32,
    month: u32,
    actor: Actor,
    store: &State<Store>,
) -> Result<Json<Vec<NaiveDate>>, Problem> {
    let classes = store.list_classes().await?;

    class_days_in_month(&classes, year, month, &actor.0)
        .map(Json)
        .ok_or_else(|| invalid_month(year, month))
}
