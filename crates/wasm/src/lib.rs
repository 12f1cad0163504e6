#![warn(clippy::pedantic)]

//! Browser bindings. The page passes the timetable JSON it received from the
//! optimizer and turns the returned calendar text into a download named
//! [`ics_file_name`] with type [`ics_mime_type`].

use rsu_timetable_core::{load_records, parse_timezone, CalendarExporter, ExportOptions, ICS_FILE_NAME, ICS_MIME_TYPE};
use wasm_bindgen::{prelude::wasm_bindgen, JsError};

/// Returns the overlap messages as a JSON array of strings.
#[wasm_bindgen]
pub fn detect_conflicts(timetable_json: &str) -> Result<String, JsError> {
	let records = load_records(timetable_json.as_bytes())?;
	let conflicts = rsu_timetable_core::detect_conflicts(&records);

	Ok(serde_json::to_string(&conflicts)?)
}

/// Renders the calendar. `timezone` is the IANA zone the meeting times are
/// in, normally `Intl.DateTimeFormat().resolvedOptions().timeZone`; UTC when
/// omitted.
#[wasm_bindgen]
pub fn export_ics(timetable_json: &str, calendar_name: &str, timezone: Option<String>) -> Result<String, JsError> {
	let records = load_records(timetable_json.as_bytes())?;
	let exporter = CalendarExporter::new(export_options(calendar_name, timezone.as_deref())?);

	Ok(exporter.render(&records)?)
}

fn export_options(calendar_name: &str, timezone: Option<&str>) -> rsu_timetable_core::Result<ExportOptions> {
	let options = ExportOptions::default().with_calendar_name(calendar_name);

	Ok(match timezone.filter(|tz| !tz.is_empty()) {
		Some(tz) => options.with_timezone(parse_timezone(tz)?),
		None => options,
	})
}

#[wasm_bindgen]
#[must_use]
pub fn ics_file_name() -> String {
	ICS_FILE_NAME.to_string()
}

#[wasm_bindgen]
#[must_use]
pub fn ics_mime_type() -> String {
	ICS_MIME_TYPE.to_string()
}
