use rocket::serde::json::Json;
use rocket::State;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::data::class::Class;
use crate::data::user::db::{UserCreateData, UserDbExt, UserUpdateData};
use crate::data::user::UserResponse;
use crate::error::SchedulingError;
use crate::resp::problem::Problem;
use crate::resp::session::Actor;
use crate::Store;

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct UserCreatedResponse {
    pub user: UserResponse,
    pub classes: Vec<Class>,
}

#[utoipa::path(
    responses(
        (status = 200, description = "Users matching the query", body = [UserResponse]),
        (status = 403, description = "Not an admin", body = Problem),
    )
)]
#[get("/user?<q>")]
#[tracing::instrument(skip(store))]
pub async fn user_list(
    q: Option<&str>,
    actor: Actor,
    store: &State<Store>,
) -> Result<Json<Vec<UserResponse>>, Problem> {
    actor.require_admin()?;

    let users = store.list_users(q).await?;
    Ok(Json(users.into_iter().map(UserResponse::from).collect()))
}

#[utoipa::path(
    request_body = UserCreateData,
    responses(
        (status = 200, description = "User created", body = UserCreatedResponse),
        (status = 403, description = "Role can't create that account", body = Problem),
        (status = 409, description = "Username taken", body = Problem),
    )
)]
#[post("/user", format = "application/json", data = "<create_user>")]
#[tracing::instrument(skip(store))]
pub async fn user_create(
    create_user: Json<UserCreateData>,
    actor: Actor,
    store: &State<Store>,
) -> Result<Json<UserCreatedResponse>, Problem> {
    let role = create_user.role;
    if !actor.role().can_create(role) {
        return Err(SchedulingError::forbidden(format!(
            "a {} can't create {} accounts",
            actor.role(),
            role
        ))
        .into());
    }

    let (user, classes) = store
        .create_user_with_classes(create_user.into_inner(), Some(&actor.0))
        .await?;

    Ok(Json(UserCreatedResponse {
        user: UserResponse::from(user),
        classes,
    }))
}

#[utoipa::path(
    request_body = UserUpdateData,
    responses(
        (status = 200, description = "User updated", body = UserResponse),
        (status = 404, description = "No such user", body = Problem),
        (status = 409, description = "Username taken", body = Problem),
    )
)]
#[put("/user/<id>", format = "application/json", data = "<update>")]
#[tracing::instrument(skip(store))]
pub async fn user_update(
    id: &str,
    update: Json<UserUpdateData>,
    actor: Actor,
    store: &State<Store>,
) -> Result<Json<UserResponse>, Problem> {
    actor.require_admin()?;

    let user = store.update_user(id, &update.username, &update.code).await?;
    Ok(Json(UserResponse::from(user)))
}

#[utoipa::path(
    responses(
        (status = 200, description = "Id of the removed user", body = String),
        (status = 403, description = "Not an admin, or the bootstrap admin", body = Problem),
        (status = 404, description = "No such user", body = Problem),
    )
)]
#[delete("/user/<id>")]
#[tracing::instrument(skip(store))]
pub async fn user_delete(id: &str, actor: Actor, store: &State<Store>) -> Result<String, Problem> {
    actor.require_admin()?;

    let removed = store.delete_user(id).await?;
    Ok(removed.id)
}

///////////////////////
//       TESTS
///////////////////////

#[cfg(test)]
mod user_endpoints {
    use rocket::http::{ContentType, Status};
    use serde_json::{json, Value};

    use super::UserCreatedResponse;
    use crate::data::class::db::ClassDbExt;
    use crate::data::user::db::UserDbExt;
    use crate::role::Role;
    use crate::route::{login_as, test_client};
    use crate::Store;

    #[rocket::async_test]
    async fn v1_user_create_books_classes() {
        let client = test_client().await;
        login_as(&client, "tamar", "4378").await;

        let response = client
            .post("/api/v1/user")
            .header(ContentType::JSON)
            .body(
                json!({
                    "username": "dana",
                    "code": "1234",
                    "role": "student",
                    "classes": [{
                        "date": "2099-05-01",
                        "hour": "10:00",
                        "teacher": "Noa",
                        "location": "Room 1",
                        "name": "Grammar",
                    }],
                })
                .to_string(),
            )
            .dispatch()
            .await;
        assert_eq!(response.status(), Status::Ok, "an ok response");
        assert_eq!(response.content_type(), Some(ContentType::JSON));

        let created: UserCreatedResponse =
            response.into_json().await.expect("invalid response json");
        assert_eq!(created.user.username, "dana");
        assert_eq!(created.user.role, Role::Student);
        assert_eq!(created.classes.len(), 1);
        assert_eq!(created.classes[0].student_id.as_deref(), Some(created.user.id.as_str()));

        let store: &Store = client.rocket().state().expect("store not managed");
        assert_eq!(store.list_classes().await.unwrap(), created.classes);

        let response = client
            .post("/api/v1/user")
            .header(ContentType::JSON)
            .body(json!({"username": "dana", "code": "9"}).to_string())
            .dispatch()
            .await;
        assert_eq!(response.status(), Status::Conflict);
    }

    #[rocket::async_test]
    async fn v1_teachers_only_create_students() {
        let client = test_client().await;
        let store: &Store = client.rocket().state().expect("store not managed");
        store.create_user("noa", "1", Role::Teacher).await.unwrap();
        login_as(&client, "noa", "1").await;

        let response = client
            .post("/api/v1/user")
            .header(ContentType::JSON)
            .body(json!({"username": "yael", "code": "2", "role": "teacher"}).to_string())
            .dispatch()
            .await;
        assert_eq!(response.status(), Status::Forbidden);

        let response = client
            .post("/api/v1/user")
            .header(ContentType::JSON)
            .body(json!({"username": "dana", "code": "2"}).to_string())
            .dispatch()
            .await;
        assert_eq!(response.status(), Status::Ok);

        let response = client.get("/api/v1/user").dispatch().await;
        assert_eq!(response.status(), Status::Forbidden);
    }

    #[rocket::async_test]
    async fn v1_teacher_sees_classes_booked_in_the_wizard() {
        let client = test_client().await;
        let store: &Store = client.rocket().state().expect("store not managed");
        let noa = store.create_user("noa", "1", Role::Teacher).await.unwrap();
        login_as(&client, "noa", "1").await;

        let response = client
            .post("/api/v1/user")
            .header(ContentType::JSON)
            .body(
                json!({
                    "username": "dana",
                    "code": "2",
                    "classes": [{
                        "date": "2099-05-01",
                        "hour": "10:00",
                        "teacher": "Noa",
                        "location": "Room 1",
                        "name": "Grammar",
                    }],
                })
                .to_string(),
            )
            .dispatch()
            .await;
        assert_eq!(response.status(), Status::Ok);

        let response = client.get("/api/v1/class").dispatch().await;
        assert_eq!(response.status(), Status::Ok);
        let classes: Vec<Value> = response.into_json().await.expect("invalid response json");
        assert_eq!(classes.len(), 1);
        assert_eq!(classes[0]["createdBy"], noa.id.as_str());
        assert_eq!(classes[0]["cancellation"]["permitted"], true);
    }

    #[rocket::async_test]
    async fn v1_admin_manages_users() {
        let client = test_client().await;
        let store: &Store = client.rocket().state().expect("store not managed");
        let dana = store.create_user("dana", "1", Role::Student).await.unwrap();
        login_as(&client, "tamar", "4378").await;

        let response = client.get("/api/v1/user?q=DAN").dispatch().await;
        assert_eq!(response.status(), Status::Ok);
        let users: Vec<Value> = response.into_json().await.expect("invalid response json");
        assert_eq!(users.len(), 1);
        assert_eq!(users[0]["id"], dana.id.as_str());

        let response = client
            .put(format!("/api/v1/user/{}", dana.id))
            .header(ContentType::JSON)
            .body(json!({"username": "dana.k", "code": "2"}).to_string())
            .dispatch()
            .await;
        assert_eq!(response.status(), Status::Ok);
        assert_eq!(
            store.find_user(&dana.id).await.unwrap().map(|u| u.username),
            Some("dana.k".to_string())
        );

        let response = client.delete(format!("/api/v1/user/{}", dana.id)).dispatch().await;
        assert_eq!(response.status(), Status::Ok);
        assert_eq!(response.into_string().await, Some(dana.id.clone()));

        let response = client.delete(format!("/api/v1/user/{}", dana.id)).dispatch().await;
        assert_eq!(response.status(), Status::NotFound);
    }

    #[rocket::async_test]
    async fn v1_bootstrap_admin_cant_be_deleted() {
        let client = test_client().await;
        let admin = login_as(&client, "tamar", "4378").await;

        let response = client
            .delete(format!("/api/v1/user/{}", admin["id"].as_str().unwrap()))
            .dispatch()
            .await;
        assert_eq!(response.status(), Status::Forbidden);
    }

    #[rocket::async_test]
    async fn v1_user_endpoints_need_a_session() {
        let client = test_client().await;

        let response = client.get("/api/v1/user").dispatch().await;
        assert_eq!(response.status(), Status::Unauthorized);

        let response = client.delete("/api/v1/user/anything").dispatch().await;
        assert_eq!(response.status(), Status::Unauthorized);
    }
}
