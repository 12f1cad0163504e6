//! Meeting records and the JSON payloads they arrive in.
//!
//! Records come from the optimizer backend either as a bare array, as the
//! plan response (`{status, timetable, preference}`), or as a snapshot saved
//! after a previous run (`{student_id, saved_at, rows, preference}`).

use std::{collections::HashSet, io};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::error::{Result, TimetableError};

/// One scheduled class occurrence.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "RawMeetingRecord")]
pub struct MeetingRecord {
	#[serde(skip_serializing_if = "Option::is_none")]
	pub day: Option<String>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub start_time: Option<String>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub end_time: Option<String>,
	pub course_code: String,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub course_name: Option<String>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub room: Option<String>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub instructor: Option<String>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub section_code: Option<String>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub credits: Option<String>,
}

impl MeetingRecord {
	pub fn new(course_code: impl Into<String>) -> Self {
		Self {
			course_code: course_code.into(),
			..Self::default()
		}
	}

	#[must_use]
	pub fn on(mut self, day: &str, start_time: &str, end_time: &str) -> Self {
		self.day = Some(day.to_string());
		self.start_time = Some(start_time.to_string());
		self.end_time = Some(end_time.to_string());
		self
	}

	#[must_use]
	pub fn named(mut self, name: &str) -> Self {
		self.course_name = Some(name.to_string());
		self
	}

	#[must_use]
	pub fn in_room(mut self, room: &str) -> Self {
		self.room = Some(room.to_string());
		self
	}

	/// The weekday, or `None` when absent or empty.
	pub fn day(&self) -> Option<&str> {
		non_empty(self.day.as_deref())
	}

	pub fn start_time(&self) -> Option<&str> {
		non_empty(self.start_time.as_deref())
	}

	pub fn end_time(&self) -> Option<&str> {
		non_empty(self.end_time.as_deref())
	}

	pub fn course_name(&self) -> Option<&str> {
		non_empty(self.course_name.as_deref())
	}
}

fn non_empty(s: Option<&str>) -> Option<&str> {
	s.filter(|s| !s.is_empty())
}

/// Wire shape of a record, before field fallbacks are applied.
#[derive(Deserialize)]
struct RawMeetingRecord {
	#[serde(default, deserialize_with = "lenient_string")]
	day: Option<String>,
	#[serde(default, deserialize_with = "lenient_string")]
	start_time: Option<String>,
	#[serde(default, deserialize_with = "lenient_string")]
	end_time: Option<String>,
	#[serde(default, deserialize_with = "lenient_string")]
	course_code: Option<String>,
	#[serde(default, deserialize_with = "lenient_string")]
	course_name: Option<String>,
	#[serde(default, deserialize_with = "lenient_string")]
	full_course_name: Option<String>,
	#[serde(default, deserialize_with = "lenient_string")]
	room: Option<String>,
	#[serde(default, deserialize_with = "lenient_string")]
	instructor: Option<String>,
	#[serde(default, deserialize_with = "lenient_string")]
	section_code: Option<String>,
	#[serde(default, deserialize_with = "lenient_string")]
	section: Option<String>,
	#[serde(default, deserialize_with = "lenient_string")]
	credits: Option<String>,
	#[serde(default, deserialize_with = "lenient_string")]
	credit: Option<String>,
}

impl From<RawMeetingRecord> for MeetingRecord {
	fn from(raw: RawMeetingRecord) -> Self {
		let course_name = match raw.course_name {
			Some(name) if !name.is_empty() => Some(name),
			_ => raw.full_course_name,
		};

		Self {
			day: raw.day,
			start_time: raw.start_time,
			end_time: raw.end_time,
			course_code: raw.course_code.unwrap_or_default(),
			course_name,
			room: raw.room,
			instructor: raw.instructor,
			section_code: raw.section_code.or(raw.section),
			credits: raw.credits.or(raw.credit),
		}
	}
}

/// Accepts strings and numbers; anything else reads as absent.
fn lenient_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
	D: Deserializer<'de>,
{
	Ok(match Option::<Value>::deserialize(deserializer)? {
		Some(Value::String(s)) => Some(s),
		Some(Value::Number(n)) => Some(n.to_string()),
		Some(Value::Bool(b)) => Some(b.to_string()),
		_ => None,
	})
}

fn lenient_flag<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
	D: Deserializer<'de>,
{
	Ok(match Option::<Value>::deserialize(deserializer)? {
		Some(Value::Bool(b)) => b,
		Some(Value::Number(n)) => n.as_f64().is_some_and(|n| n != 0.0),
		Some(Value::String(s)) => matches!(s.as_str(), "1" | "true" | "yes"),
		_ => false,
	})
}

/// Scheduling preferences echoed back by the optimizer.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Preference {
	#[serde(default, deserialize_with = "lenient_flag")]
	pub avoid_monday: bool,
	#[serde(default, deserialize_with = "lenient_string")]
	pub prefer_time: Option<String>,
}

/// The last generated timetable, kept so it can be reopened without asking
/// the optimizer again.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SavedTimetable {
	#[serde(default, deserialize_with = "lenient_string")]
	pub student_id: Option<String>,
	#[serde(default)]
	pub saved_at: Option<DateTime<Utc>>,
	pub rows: Vec<MeetingRecord>,
	#[serde(default)]
	pub preference: Option<Preference>,
}

impl SavedTimetable {
	pub fn new(
		student_id: impl Into<String>,
		rows: Vec<MeetingRecord>,
		preference: Option<Preference>,
		saved_at: DateTime<Utc>,
	) -> Self {
		Self {
			student_id: Some(student_id.into()),
			saved_at: Some(saved_at),
			rows,
			preference,
		}
	}

	/// Whether the snapshot was saved for `student_id`.
	pub fn belongs_to(&self, student_id: &str) -> bool {
		self.student_id.as_deref() == Some(student_id)
	}

	pub fn write_to<W: io::Write>(&self, writer: W) -> Result<()> {
		serde_json::to_writer_pretty(writer, self)?;
		Ok(())
	}

	pub fn read_from<R: io::Read>(reader: R) -> Result<Self> {
		Ok(serde_json::from_reader(reader)?)
	}
}

/// Optimizer response for a plan request.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PlanResponse {
	#[serde(default)]
	pub status: Option<String>,
	#[serde(default)]
	pub error: Option<String>,
	#[serde(default)]
	pub timetable: Option<Vec<MeetingRecord>>,
	#[serde(default)]
	pub preference: Option<Preference>,
}

/// Any of the JSON documents a timetable can be loaded from.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum Payload {
	Rows(Vec<MeetingRecord>),
	Saved(SavedTimetable),
	Plan(PlanResponse),
}

impl Payload {
	fn kind(&self) -> &'static str {
		match self {
			Self::Rows(_) => "rows",
			Self::Saved(_) => "saved",
			Self::Plan(_) => "plan",
		}
	}

	pub fn preference(&self) -> Option<&Preference> {
		match self {
			Self::Rows(_) => None,
			Self::Saved(saved) => saved.preference.as_ref(),
			Self::Plan(plan) => plan.preference.as_ref(),
		}
	}

	/// Extracts the records, rejecting plan responses the backend marked as
	/// failed.
	pub fn into_records(self) -> Result<Vec<MeetingRecord>> {
		match self {
			Self::Rows(rows) => Ok(rows),
			Self::Saved(saved) => Ok(saved.rows),
			Self::Plan(plan) => {
				if let Some(error) = plan.error {
					return Err(TimetableError::Backend(error));
				}

				match plan.status.as_deref() {
					None | Some("ok") => Ok(plan.timetable.unwrap_or_default()),
					Some(status) => Err(TimetableError::Backend(format!("status {status:?}"))),
				}
			}
		}
	}
}

pub fn read_payload<R: io::Read>(reader: R) -> Result<Payload> {
	let payload: Payload = serde_json::from_reader(reader)?;

	tracing::debug!(kind = payload.kind(), "parsed timetable payload");

	Ok(payload)
}

/// Reads records from any supported payload shape.
pub fn load_records<R: io::Read>(reader: R) -> Result<Vec<MeetingRecord>> {
	read_payload(reader)?.into_records()
}

/// Keeps the records whose course code was selected. An empty selection
/// keeps everything.
pub fn filter_courses<S: AsRef<str>>(records: Vec<MeetingRecord>, selected: &[S]) -> Vec<MeetingRecord> {
	if selected.is_empty() {
		return records;
	}

	let selected = selected.iter().map(AsRef::as_ref).collect::<HashSet<_>>();

	records
		.into_iter()
		.filter(|record| selected.contains(record.course_code.as_str()))
		.collect()
}
