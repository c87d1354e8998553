pub mod command;
pub mod dispatcher;

pub use self::command::{Intent, interpret};
pub use self::dispatcher::Dispatcher;

/// Reply texts. The fallback display name is a constant so resolver failures
/// never leak error detail into a user-visible record.
pub const CHECKIN_SUCCESS_MESSAGE: &str = "You have successfully checked in!";
pub const NO_RECORDS_MESSAGE: &str = "No check-in records found.";
pub const HELP_MESSAGE: &str =
    "Available commands:\n打卡 (check-in): record a check-in\n查詢 (query): list your check-in history";
pub const FALLBACK_DISPLAY_NAME: &str = "LINE user";
