use rocket::http::{Cookie, CookieJar, Status};
use rocket::outcome::Outcome::{Error, Success};
use rocket::request::{self, FromRequest, Request};
use uuid::Uuid;

use crate::data::user::User;
use crate::resp::problem::problems::{admin_only, auth_problem};
use crate::resp::problem::Problem;
use crate::role::Role;
use crate::Store;

pub static SESSION_COOKIE_NAME: &str = "flow_session";

/// Opens a new browser session, returning its cookie.
pub fn session_cookie() -> Cookie<'static> {
    Cookie::build((SESSION_COOKIE_NAME, Uuid::new_v4().to_string()))
        .path("/")
        .http_only(true)
        .build()
}

pub fn session_id(cookies: &CookieJar<'_>) -> Option<String> {
    cookies
        .get(SESSION_COOKIE_NAME)
        .map(|it| it.value().to_owned())
}

/// Logged in user making the request.
#[derive(Clone)]
pub struct Actor(pub User);

impl std::fmt::Debug for Actor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Actor:{}:{}", self.0.username, self.role())
    }
}

impl Actor {
    pub fn role(&self) -> Role {
        self.0.effective_role()
    }

    pub fn require_admin(&self) -> Result<(), Problem> {
        if !self.role().can_manage_accounts() {
            return Err(admin_only());
        }
        Ok(())
    }
}

#[rocket::async_trait]
impl<'r> FromRequest<'r> for Actor {
    type Error = Problem;

    async fn from_request(req: &'r Request<'_>) -> request::Outcome<Self, Self::Error> {
        let sid = match session_id(req.cookies()) {
            Some(it) => it,
            None => {
                tracing::debug!("no session cookie");
                return Error((Status::Unauthorized, auth_problem()));
            }
        };

        let store = match req.rocket().state::<Store>() {
            Some(it) => it,
            None => {
                tracing::error!("store isn't managed by rocket");
                return Error((
                    Status::InternalServerError,
                    Problem::new_untyped(Status::InternalServerError, "Storage isn't available."),
                ));
            }
        };

        match store.session(&sid).current_user().await {
            Ok(Some(user)) => {
                tracing::trace!("request made by {}", user.username);
                Success(Actor(user))
            }
            Ok(None) => Error((Status::Unauthorized, auth_problem())),
            Err(e) => {
                let problem = Problem::from(e);
                Error((problem.status, problem))
            }
        }
    }
}
