pub mod class;
pub mod notification;
pub mod user;

pub use class::Class;
pub use notification::{Notification, NotificationPayload};
pub use user::User;
