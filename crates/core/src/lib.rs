#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions, clippy::missing_errors_doc)]

//! Timetable utilities for RSU students: overlap detection and ICS export
//! for the weekly plans produced by the course optimizer.

pub mod calendar;
pub mod conflict;
pub mod error;
pub mod meeting;
pub mod tracing;
pub mod week;

pub use calendar::{
	parse_timezone, write_ics_file, CalendarExporter, ExportOptions, ICS_FILE_NAME, ICS_MIME_TYPE, PRODUCT_ID,
};
pub use conflict::detect_conflicts;
pub use error::{Result, TimetableError};
pub use meeting::{
	filter_courses, load_records, read_payload, MeetingRecord, Payload, PlanResponse, Preference, SavedTimetable,
};
pub use self::tracing::{init_tracing, LogFormat, TracingConfig, TracingError};
pub use week::{group_by_day, WeekView};
