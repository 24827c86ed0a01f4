use chrono::{DateTime, Duration, Local, NaiveDate, NaiveTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

pub mod db;

use crate::data::user::User;
use crate::error::SchedulingError;
use crate::role::Role;
use crate::util::contains_ignore_case;

use db::ClassDetails;

pub static CLASS_COLLECTION_NAME: &str = "flowClasses";

/// Minimum lead time, in hours, for cancelling a class.
pub const CANCELLATION_NOTICE_HOURS: i64 = 3;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Class {
    pub id: String,
    /// `YYYY-MM-DD`
    pub date: String,
    /// `HH:MM`
    pub hour: String,
    pub teacher: String,
    pub location: String,
    pub name: String,

    /// Attending student.
    #[serde(default)]
    pub student_id: Option<String>,
    /// User who scheduled the class.
    #[serde(default)]
    pub created_by: Option<String>,
}

impl Class {
    pub fn new(details: ClassDetails, student_id: Option<String>, created_by: Option<String>) -> Class {
        Class {
            id: Uuid::new_v4().to_string(),
            date: details.date,
            hour: details.hour,
            teacher: details.teacher,
            location: details.location,
            name: details.name,
            student_id,
            created_by,
        }
    }

    pub fn apply(&mut self, details: ClassDetails) {
        self.date = details.date;
        self.hour = details.hour;
        self.teacher = details.teacher;
        self.location = details.location;
        self.name = details.name;
    }

    /// Start of the class, reading `date` and `hour` as local time.
    pub fn starts_at(&self) -> Result<DateTime<Local>, SchedulingError> {
        let date = NaiveDate::parse_from_str(self.date.trim(), "%Y-%m-%d")
            .map_err(|e| SchedulingError::InvalidSchedule(format!("date '{}': {}", self.date, e)))?;
        let hour = NaiveTime::parse_from_str(self.hour.trim(), "%H:%M")
            .or_else(|_| NaiveTime::parse_from_str(self.hour.trim(), "%H:%M:%S"))
            .map_err(|e| SchedulingError::InvalidSchedule(format!("hour '{}': {}", self.hour, e)))?;

        Local
            .from_local_datetime(&date.and_time(hour))
            .earliest()
            .ok_or_else(|| {
                SchedulingError::InvalidSchedule(format!(
                    "{} {} doesn't exist in local time",
                    self.date, self.hour
                ))
            })
    }

    pub fn time_until_start(&self, now: DateTime<Utc>) -> Result<Duration, SchedulingError> {
        Ok(self
            .starts_at()?
            .with_timezone(&Utc)
            .signed_duration_since(now))
    }

    /// Whether the class belongs on the viewer's calendar and class list.
    pub fn is_visible_to(&self, viewer: &User) -> bool {
        match viewer.effective_role() {
            Role::Admin => true,
            Role::Teacher => self.created_by.as_deref() == Some(viewer.id.as_str()),
            Role::Student => self.student_id.as_deref() == Some(viewer.id.as_str()),
        }
    }

    pub fn may_be_cancelled_by(&self, actor: &User) -> bool {
        // Same ownership rule as visibility: whoever sees a class may cancel it.
        self.is_visible_to(actor)
    }

    /// Cancellation policy: the notice window is checked before authorization.
    pub fn check_cancellation(&self, actor: &User, now: DateTime<Utc>) -> Result<(), SchedulingError> {
        if !notice_window_open(self.time_until_start(now)?) {
            return Err(SchedulingError::TooSoon);
        }

        if !self.may_be_cancelled_by(actor) {
            return Err(SchedulingError::forbidden(
                "only admins, the scheduling teacher or the assigned student can cancel a class",
            ));
        }

        Ok(())
    }

    pub fn cancellation_status(&self, viewer: &User, now: DateTime<Utc>) -> CancellationStatus {
        CancellationStatus {
            window_open: self
                .time_until_start(now)
                .map(notice_window_open)
                .unwrap_or(false),
            permitted: self.may_be_cancelled_by(viewer),
        }
    }

    pub fn matches(&self, query: &str) -> bool {
        contains_ignore_case(&self.name, query)
            || contains_ignore_case(&self.teacher, query)
            || contains_ignore_case(&self.location, query)
            || self.date.contains(query)
    }
}

/// Cancellation needs strictly more than [`CANCELLATION_NOTICE_HOURS`] of lead time.
pub fn notice_window_open(until_start: Duration) -> bool {
    until_start > Duration::hours(CANCELLATION_NOTICE_HOURS)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CancellationStatus {
    pub window_open: bool,
    pub permitted: bool,
}

impl CancellationStatus {
    pub fn can_cancel(&self) -> bool {
        self.window_open && self.permitted
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user(id: &str, role: Role) -> User {
        User {
            id: id.to_string(),
            username: id.to_string(),
            code: "0000".to_string(),
            is_admin: role == Role::Admin,
            role,
        }
    }

    fn class_at(date: &str, hour: &str) -> Class {
        Class {
            id: "c1".to_string(),
            date: date.to_string(),
            hour: hour.to_string(),
            teacher: "Tamar".to_string(),
            location: "Room 2".to_string(),
            name: "Conversation".to_string(),
            student_id: Some("s".to_string()),
            created_by: Some("t".to_string()),
        }
    }

    fn local(date: &str, time: &str) -> DateTime<Utc> {
        let naive = NaiveDate::parse_from_str(date, "%Y-%m-%d")
            .unwrap()
            .and_time(NaiveTime::parse_from_str(time, "%H:%M:%S").unwrap());
        Local
            .from_local_datetime(&naive)
            .earliest()
            .unwrap()
            .with_timezone(&Utc)
    }

    #[test]
    fn parses_local_start() {
        let class = class_at("2030-01-10", "15:00");
        assert_eq!(
            class.starts_at().unwrap().with_timezone(&Utc),
            local("2030-01-10", "15:00:00")
        );
    }

    #[test]
    fn rejects_malformed_schedule() {
        assert!(matches!(
            class_at("10/01/2030", "15:00").starts_at(),
            Err(SchedulingError::InvalidSchedule(_))
        ));
        assert!(matches!(
            class_at("2030-01-10", "3pm").starts_at(),
            Err(SchedulingError::InvalidSchedule(_))
        ));
    }

    #[test]
    fn notice_window_is_strict() {
        assert!(notice_window_open(Duration::hours(3) + Duration::seconds(1)));
        assert!(!notice_window_open(Duration::hours(3)));
        assert!(!notice_window_open(Duration::minutes(179)));
        assert!(!notice_window_open(Duration::hours(-1)));
    }

    #[test]
    fn too_soon_is_reported_before_authorization() {
        let class = class_at("2030-01-10", "15:00");
        let stranger = user("x", Role::Student);
        let now = local("2030-01-10", "13:00:00");

        assert!(matches!(
            class.check_cancellation(&stranger, now),
            Err(SchedulingError::TooSoon)
        ));
    }

    #[test]
    fn authorization_matrix() {
        let class = class_at("2030-01-10", "15:00");
        let now = local("2030-01-09", "09:00:00");

        assert!(class.check_cancellation(&user("a", Role::Admin), now).is_ok());
        assert!(class.check_cancellation(&user("t", Role::Teacher), now).is_ok());
        assert!(class.check_cancellation(&user("s", Role::Student), now).is_ok());

        for other in [user("t2", Role::Teacher), user("s2", Role::Student)] {
            assert!(matches!(
                class.check_cancellation(&other, now),
                Err(SchedulingError::Forbidden(_))
            ));
        }

        // a student id in created_by doesn't grant a student anything
        let mut swapped = class.clone();
        swapped.created_by = Some("s".to_string());
        swapped.student_id = None;
        assert!(swapped
            .check_cancellation(&user("s", Role::Student), now)
            .is_err());
    }

    #[test]
    fn status_reports_both_halves() {
        let class = class_at("2030-01-10", "15:00");
        let status = class.cancellation_status(&user("t", Role::Teacher), local("2030-01-10", "12:30:00"));
        assert!(status.permitted);
        assert!(!status.window_open);
        assert!(!status.can_cancel());
    }

    #[test]
    fn search_covers_text_fields_and_date() {
        let class = class_at("2030-01-10", "15:00");
        assert!(class.matches("conv"));
        assert!(class.matches("TAMAR"));
        assert!(class.matches("room"));
        assert!(class.matches("2030-01"));
        assert!(!class.matches("grammar"));
    }
}
