//! Month view annotations for the dashboard calendar.

use chrono::{Datelike, NaiveDate};

use crate::data::class::Class;
use crate::data::user::User;

/// Whether the viewer has a class on `date`. Classes are matched on their
/// stored `date` string.
pub fn has_class_on_date(classes: &[Class], date: NaiveDate, viewer: &User) -> bool {
    let date = date.format("%Y-%m-%d").to_string();
    classes
        .iter()
        .any(|c| c.date.trim() == date && c.is_visible_to(viewer))
}

/// Days of the month that carry a class for the viewer, or `None` for an
/// invalid month.
pub fn class_days_in_month(
    classes: &[Class],
    year: i32,
    month: u32,
    viewer: &User,
) -> Option<Vec<NaiveDate>> {
    let first = NaiveDate::from_ymd_opt(year, month, 1)?;

    Some(
        first
            .iter_days()
            .take_while(|day| day.month() == first.month())
            .filter(|day| has_class_on_date(classes, *day, viewer))
            .collect(),
    )
}
