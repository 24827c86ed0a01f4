use std::io::Cursor;

use rocket::http::ContentType;
use rocket::http::Status;
use rocket::response::Responder;
use rocket::{response, Request, Response};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt::{Display, Formatter};
use utoipa::ToSchema;

use crate::error::{SchedulingError, StoreError};

/// Implements [RFC7807](https://tools.ietf.org/html/rfc7807).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Problem {
    #[serde(skip)]
    pub status: Status,
    pub type_uri: String,
    pub title: String,

    pub detail: Option<String>,

    #[schema(value_type = Object)]
    pub body: Map<String, Value>,
}

impl Default for Problem {
    fn default() -> Self {
        Problem {
            status: Status::InternalServerError,
            type_uri: "about:blank".to_string(),
            title: "Problem".to_string(),
            detail: None,
            body: Map::new(),
        }
    }
}

impl Problem {
    pub fn new_untyped(status: Status, title: impl ToString) -> Problem {
        Problem {
            status,
            type_uri: "about:blank".to_string(),
            title: title.to_string(),
            ..Default::default()
        }
    }

    pub fn detail(&mut self, value: impl ToString) -> &mut Problem {
        self.detail = Some(value.to_string());
        self
    }

    pub fn insert_str(&mut self, key: impl ToString, value: impl ToString) -> &mut Problem {
        self.body
            .insert(key.to_string(), Value::String(value.to_string()));
        self
    }
}

impl Display for Problem {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.status, self.title)
    }
}

impl std::error::Error for Problem {}

impl<'r> Responder<'r, 'static> for Problem {
    fn respond_to(self, _: &'r Request<'_>) -> response::Result<'static> {
        let mut body = self.body;

        // Following are required by rfc7807
        body.insert(String::from("type"), Value::from(self.type_uri));
        body.insert(String::from("title"), Value::from(self.title));

        // Optional parameters as specified by rfc7807
        if let Some(detail) = self.detail {
            body.insert(String::from("detail"), Value::from(detail));
        }
        body.insert(String::from("status"), Value::from(self.status.code));

        let body_string =
            serde_json::to_string(&body).map_err(|_| Status::InternalServerError)?;

        Response::build()
            .status(self.status)
            .header(ContentType::new("application", "problem+json"))
            .raw_header("Content-Language", "en")
            .sized_body(body_string.len(), Cursor::new(body_string))
            .ok()
    }
}

pub mod problems {
    use crate::resp::problem::Problem;
    use rocket::http::Status;

    #[inline]
    pub fn auth_problem() -> Problem {
        Problem::new_untyped(Status::Unauthorized, "Not signed in.")
    }

    #[inline]
    pub fn admin_only() -> Problem {
        Problem::new_untyped(Status::Forbidden, "Only administrators can do that.")
    }

    #[inline]
    pub fn invalid_month(year: i32, month: u32) -> Problem {
        Problem::new_untyped(Status::BadRequest, "There is no such month.")
            .detail(format!("{}-{}", year, month))
            .clone()
    }
}

impl From<StoreError> for Problem {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::Timeout(after) => Problem::new_untyped(
                Status::InternalServerError,
                "A timeout occurred while accessing storage.",
            )
            .detail(format!("no answer within {:?}", after))
            .clone(),
            StoreError::Malformed { key, .. } => Problem::new_untyped(
                Status::InternalServerError,
                "Stored data couldn't be read.",
            )
            .insert_str("collection", key)
            .clone(),
            StoreError::Database(_) | StoreError::Bson(_) => Problem::new_untyped(
                Status::InternalServerError,
                "MongoDB failed while processing request.",
            ),
            StoreError::Json(_) => Problem::new_untyped(
                Status::InternalServerError,
                "An error occurred while processing JSON data.",
            ),
        }
    }
}

impl From<SchedulingError> for Problem {
    fn from(e: SchedulingError) -> Self {
        let detail = e.to_string();
        let mut problem = match e {
            SchedulingError::DuplicateUsername(username) => {
                Problem::new_untyped(Status::Conflict, "Username is already taken.")
                    .insert_str("username", username)
                    .clone()
            }
            SchedulingError::InvalidCredentials => {
                Problem::new_untyped(Status::Unauthorized, "Invalid username or code.")
            }
            SchedulingError::TooSoon => Problem::new_untyped(
                Status::UnprocessableEntity,
                "Classes can only be cancelled more than 3 hours in advance.",
            ),
            SchedulingError::Forbidden(_) => {
                Problem::new_untyped(Status::Forbidden, "Not allowed.")
            }
            SchedulingError::UserNotFound(_) => {
                Problem::new_untyped(Status::NotFound, "User not found.")
            }
            SchedulingError::ClassNotFound(_) => {
                Problem::new_untyped(Status::NotFound, "Class not found.")
            }
            SchedulingError::MissingField(field) => {
                Problem::new_untyped(Status::BadRequest, "A required field is missing.")
                    .insert_str("field", field)
                    .clone()
            }
            SchedulingError::InvalidSchedule(_) => {
                Problem::new_untyped(Status::BadRequest, "Class date or hour is invalid.")
            }
            SchedulingError::Conflict(_) => Problem::new_untyped(
                Status::Conflict,
                "Data was changed concurrently, try again.",
            ),
            SchedulingError::Persistence(e) => {
                tracing::error!("storage failure: {}", e);
                return e.into();
            }
        };
        problem.detail(detail);
        problem
    }
}
