use rocket::http::{Cookie, CookieJar, Status};
use rocket::serde::json::Json;
use rocket::State;

use crate::data::user::db::{LoginData, UserDbExt};
use crate::data::user::UserResponse;
use crate::resp::problem::Problem;
use crate::resp::session::{session_cookie, session_id, Actor, SESSION_COOKIE_NAME};
use crate::Store;

#[utoipa::path(
    request_body = LoginData,
    responses(
        (status = 200, description = "Logged in", body = UserResponse),
        (status = 401, description = "Invalid username or code", body = Problem),
    )
)]
#[post("/login", format = "application/json", data = "<login>")]
#[tracing::instrument(skip(cookies, store))]
pub async fn login(
    login: Json<LoginData>,
    cookies: &CookieJar<'_>,
    store: &State<Store>,
) -> Result<Json<UserResponse>, Problem> {
    let user = store.authenticate(&login.username, &login.code).await?;

    // a login never continues a session id the client brought along
    if let Some(previous) = session_id(cookies) {
        store.session(&previous).clear().await?;
    }
    let cookie = session_cookie();
    let sid = cookie.value().to_owned();
    cookies.add(cookie);
    store.session(&sid).set_current_user(&user).await?;

    if let Err(e) = store.prune_sessions().await {
        tracing::warn!("Unable to prune expired sessions: {}", e);
    }

    tracing::info!("'{}' logged in", user.username);
    Ok(Json(UserResponse::from(user)))
}

#[utoipa::path(responses((status = 204, description = "Logged out")))]
#[post("/logout")]
#[tracing::instrument(skip(cookies, store))]
pub async fn logout(cookies: &CookieJar<'_>, store: &State<Store>) -> Result<Status, Problem> {
    if let Some(sid) = session_id(cookies) {
        store.session(&sid).clear().await?;
        cookies.remove(Cookie::from(SESSION_COOKIE_NAME));
    }
    Ok(Status::NoContent)
}

#[utoipa::path(
    responses(
        (status = 200, description = "Current user", body = UserResponse),
        (status = 401, description = "Not signed in", body = Problem),
    )
)]
#[get("/session")]
#[tracing::instrument]
pub async fn session_get(actor: Actor) -> Json<UserResponse> {
    Json(UserResponse::from(actor.0))
}
