use std::collections::BTreeMap;

use rocket::http::Status;
use rocket::serde::json::Json;
use rocket::{Build, Request, Rocket, Route};

pub mod calendar;
pub mod class;
pub mod notifications;
pub mod session;
pub mod users;

use calendar::*;
use class::*;
use notifications::*;
use session::*;
use users::*;

use utoipa::OpenApi;

use crate::{
    data::{
        class::{
            db::{ClassCreateData, ClassDetails, ClassView},
            CancellationStatus, Class,
        },
        user::db::{LoginData, UserCreateData, UserUpdateData},
        user::UserResponse,
    },
    resp::problem::Problem,
    resp::session::SESSION_COOKIE_NAME,
    role::Role,
};

#[derive(OpenApi)]
#[openapi(
    paths(
        login,
        logout,
        session_get,
        user_list,
        user_create,
        user_update,
        user_delete,
        class_list,
        class_create,
        class_update,
        class_delete,
        class_cancel,
        notification_list,
        notification_test,
        calendar_month
    ),
    components(schemas(
        Role,
        Class,
        ClassDetails,
        ClassCreateData,
        ClassView,
        CancellationStatus,
        UserResponse,
        UserCreatedResponse,
        LoginData,
        UserCreateData,
        UserUpdateData,
        Problem
    )),
    modifiers(&SessionAuth, &V1_PREFIX)
)]
pub struct ApiDocV1;

pub struct PathPrefix(pub &'static str);
static V1_PREFIX: PathPrefix = PathPrefix("/api/v1");

impl utoipa::Modify for PathPrefix {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        let mut new_paths = BTreeMap::new();

        for (path, item) in std::mem::take(&mut openapi.paths.paths) {
            new_paths.insert(self.0.to_string() + path.as_ref(), item);
        }

        openapi.paths.paths = new_paths;
    }
}

/// Documents the session cookie set by `/login`.
pub struct SessionAuth;

impl utoipa::Modify for SessionAuth {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        use utoipa::openapi::security::{ApiKey, ApiKeyValue, SecurityScheme};

        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "session",
                SecurityScheme::ApiKey(ApiKey::Cookie(ApiKeyValue::new(SESSION_COOKIE_NAME))),
            );
        }
    }
}

#[get("/openapi.json")]
pub fn openapi_json() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDocV1::openapi())
}

/// Guard failures and unmatched routes answer with a problem document too.
#[catch(default)]
pub fn problem_catcher(status: Status, _req: &Request<'_>) -> Problem {
    Problem::new_untyped(status, status.reason().unwrap_or("Problem"))
}

pub fn api_v1() -> Vec<Route> {
    routes![
        login,
        logout,
        session_get,
        user_list,
        user_create,
        user_update,
        user_delete,
        class_list,
        class_create,
        class_update,
        class_delete,
        class_cancel,
        notification_list,
        notification_test,
        calendar_month,
        openapi_json
    ]
}

pub fn mount_api(rocket: Rocket<Build>) -> Rocket<Build> {
    rocket
        .mount("/api/v1", api_v1())
        .register("/", catchers![problem_catcher])
}

#[cfg(test)]
pub(crate) async fn test_client() -> rocket::local::asynchronous::Client {
    use crate::config::Config;
    use crate::data::user::db::UserDbExt;
    use crate::store::{Backend, MemoryStore, SchedulingStore, StoreSettings};

    let store = SchedulingStore::new(
        Backend::Memory(MemoryStore::new()),
        StoreSettings::from(&Config::in_memory()),
    );
    store.bootstrap().await.expect("unable to seed bootstrap admin");

    rocket::local::asynchronous::Client::tracked(crate::build(store))
        .await
        .expect("invalid backend")
}

/// Logs the tracked client in, returning the user JSON.
#[cfg(test)]
pub(crate) async fn login_as(
    client: &rocket::local::asynchronous::Client,
    username: &str,
    code: &str,
) -> serde_json::Value {
    use rocket::http::ContentType;

    let response = client
        .post("/api/v1/login")
        .header(ContentType::JSON)
        .body(serde_json::json!({"username": username, "code": code}).to_string())
        .dispatch()
        .await;
    assert_eq!(response.status(), Status::Ok, "unable to log in as {}", username);
    response.into_json().await.expect("invalid response json")
}

#[cfg(test)]
pub(crate) async fn log_out(client: &rocket::local::asynchronous::Client) {
    let response = client.post("/api/v1/logout").dispatch().await;
    assert_eq!(response.status(), Status::NoContent);
}

#[cfg(test)]
mod api_docs {
    use rocket::http::Status;
    use serde_json::Value;

    use super::test_client;

    #[rocket::async_test]
    async fn v1_openapi_lists_prefixed_paths() {
        let client = test_client().await;

        let response = client.get("/api/v1/openapi.json").dispatch().await;
        assert_eq!(response.status(), Status::Ok);

        let doc: Value = response.into_json().await.expect("invalid openapi json");
        assert!(doc["paths"]["/api/v1/login"].is_object());
        assert!(doc["paths"]["/api/v1/class/{id}/cancel"].is_object());
        assert!(doc["components"]["securitySchemes"]["session"].is_object());
    }

    #[rocket::async_test]
    async fn unknown_routes_answer_with_problems() {
        let client = test_client().await;

        let response = client.get("/api/v1/nothing-here").dispatch().await;
        assert_eq!(response.status(), Status::NotFound);
        let problem: Value = response.into_json().await.expect("invalid problem json");
        assert_eq!(problem["status"], 404);
    }
}
