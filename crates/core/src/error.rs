use thiserror::Error;

/// Errors surfaced by timetable loading and calendar export.
#[derive(Debug, Error)]
pub enum TimetableError {
	#[error("invalid {field} {value:?}: expected HH:MM")]
	InvalidTime { field: &'static str, value: String },

	#[error("local time {0} does not exist in time zone {1}")]
	NonexistentLocalTime(chrono::NaiveDateTime, chrono_tz::Tz),

	#[error("unknown time zone {0:?}")]
	UnknownTimeZone(String),

	#[error("optimizer reported a failure: {0}")]
	Backend(String),

	#[error("malformed timetable payload: {0}")]
	Payload(#[from] serde_json::Error),

	#[error("IO error: {0}")]
	Io(#[from] std::io::Error),
}

pub type Result<T, E = TimetableError> = std::result::Result<T, E>;
