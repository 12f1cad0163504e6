//! ICS export.
//!
//! Records carry a weekday and a time of day but no date, so every event is
//! anchored to the next occurrence of its weekday, counting today. Times are
//! read as wall-clock times in [`ExportOptions::timezone`] and written as UTC.

use std::{
	fs::File,
	io::{BufWriter, Write},
	path::{Path, PathBuf},
};

use chrono::{DateTime, Datelike, Duration, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Utc, Weekday};
use chrono_tz::Tz;
use icalendar::{Calendar, Component, Event, EventLike};

use crate::{
	error::{Result, TimetableError},
	meeting::MeetingRecord,
};

pub const ICS_FILE_NAME: &str = "timetable.ics";
pub const ICS_MIME_TYPE: &str = "text/calendar;charset=utf-8";
pub const PRODUCT_ID: &str = "-//RSU Timetable//EN";

const STAMP_FORMAT: &str = "%Y%m%dT%H%M%SZ";
const DEFAULT_START: &str = "09:00";
const DEFAULT_END: &str = "10:00";
const UID_DOMAIN: &str = "rsu";
const LINE_LIMIT: usize = 75;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportOptions {
	/// Shown by calendar clients as the calendar title.
	pub calendar_name: String,
	/// Zone the meeting times are written in.
	pub timezone: Tz,
	/// Repeat each event weekly through this date.
	pub repeat_until: Option<NaiveDate>,
}

impl Default for ExportOptions {
	fn default() -> Self {
		Self {
			calendar_name: String::from("Timetable"),
			timezone: Tz::UTC,
			repeat_until: None,
		}
	}
}

impl ExportOptions {
	#[must_use]
	pub fn with_calendar_name(mut self, name: impl Into<String>) -> Self {
		self.calendar_name = name.into();
		self
	}

	#[must_use]
	pub fn with_timezone(mut self, timezone: Tz) -> Self {
		self.timezone = timezone;
		self
	}

	#[must_use]
	pub fn with_repeat_until(mut self, until: Option<NaiveDate>) -> Self {
		self.repeat_until = until;
		self
	}
}

#[derive(Debug, Clone, Default)]
pub struct CalendarExporter {
	options: ExportOptions,
}

impl CalendarExporter {
	#[must_use]
	pub fn new(options: ExportOptions) -> Self {
		Self { options }
	}

	/// Renders the calendar document, stamped with the current time.
	///
	/// # Errors
	///
	/// Fails when a start or end time is not `HH:MM`, or names a local time
	/// that cannot be placed in the configured zone.
	pub fn render(&self, records: &[MeetingRecord]) -> Result<String> {
		self.render_at(records, Utc::now())
	}

	/// Renders the calendar document as if generated at `now`.
	///
	/// # Errors
	///
	/// See [`CalendarExporter::render`].
	pub fn render_at(&self, records: &[MeetingRecord], now: DateTime<Utc>) -> Result<String> {
		let dtstamp = now.format(STAMP_FORMAT).to_string();
		let today = now.with_timezone(&self.options.timezone).date_naive();
		let mut calendar = Calendar::new();

		for (index, record) in records.iter().enumerate() {
			calendar.push(self.event(record, index, &dtstamp, today)?);
		}

		tracing::debug!(
			events = records.len(),
			timezone = %self.options.timezone,
			"rendered calendar"
		);

		Ok(self.envelope(&calendar.to_string()))
	}

	fn event(&self, record: &MeetingRecord, index: usize, dtstamp: &str, today: NaiveDate) -> Result<Event> {
		let weekday = resolve_weekday(record.day());
		let date = next_weekday(today, weekday);

		let start = clock(record.start_time().unwrap_or(DEFAULT_START), "start time")?;
		let end = clock(record.end_time().unwrap_or(DEFAULT_END), "end time")?;

		let start = self.to_utc(at(date, start, "start time", record)?)?;
		let end = self.to_utc(at(date, end, "end time", record)?)?;

		let summary = format!("{} {}", record.course_code, record.course_name().unwrap_or_default());
		let mut event = Event::new();

		event
			.uid(&format!("{dtstamp}-{index}@{UID_DOMAIN}"))
			.add_property("DTSTAMP", dtstamp)
			.add_property("DTSTART", &start.format(STAMP_FORMAT).to_string())
			.add_property("DTEND", &end.format(STAMP_FORMAT).to_string())
			.summary(summary.trim())
			.location(record.room.as_deref().unwrap_or_default());

		if let Some(until) = self.options.repeat_until.filter(|until| *until >= date) {
			let until = self.to_utc(until.and_time(NaiveTime::MIN) + Duration::seconds(86_399))?;

			event.add_property(
				"RRULE",
				&rrule::RRule::new(rrule::Frequency::Weekly)
					.until(until.with_timezone(&rrule::Tz::UTC))
					.to_string(),
			);
		}

		Ok(event)
	}

	/// Places a wall-clock time in the export zone. A time skipped by a
	/// daylight-saving jump moves forward by an hour.
	fn to_utc(&self, local: NaiveDateTime) -> Result<DateTime<Utc>> {
		let tz = self.options.timezone;

		tz.from_local_datetime(&local)
			.earliest()
			.or_else(|| {
				local
					.checked_add_signed(Duration::hours(1))
					.and_then(|shifted| tz.from_local_datetime(&shifted).earliest())
			})
			.map(|dt| dt.with_timezone(&Utc))
			.ok_or(TimetableError::NonexistentLocalTime(local, tz))
	}

	/// Replaces the calendar-level header written by `icalendar` with ours,
	/// keeping the components untouched.
	fn envelope(&self, rendered: &str) -> String {
		let mut out = String::with_capacity(rendered.len() + 128);

		out.push_str("BEGIN:VCALENDAR\r\nVERSION:2.0\r\n");
		out.push_str(&format!("PRODID:{PRODUCT_ID}\r\n"));
		out.push_str(&fold(&format!("X-WR-CALNAME:{}", escape_text(&self.options.calendar_name))));

		let mut depth = 0usize;

		for line in rendered.lines() {
			if line == "BEGIN:VCALENDAR" || line == "END:VCALENDAR" {
				continue;
			}

			if line.starts_with("BEGIN:") {
				depth += 1;
			}

			if depth > 0 {
				out.push_str(line);
				out.push_str("\r\n");
			}

			if line.starts_with("END:") {
				depth = depth.saturating_sub(1);
			}
		}

		out.push_str("END:VCALENDAR\r\n");
		out
	}

	/// Renders and writes `timetable.ics` into `dir`.
	///
	/// # Errors
	///
	/// Fails when rendering fails or the file cannot be written.
	pub fn export_to_dir(&self, records: &[MeetingRecord], dir: &Path) -> Result<PathBuf> {
		let content = self.render(records)?;

		write_ics_file(dir, &content)
	}
}

/// Writes calendar content to `dir/timetable.ics`, replacing any previous
/// export. The file is closed before this returns.
///
/// # Errors
///
/// Fails when the file cannot be created or written.
pub fn write_ics_file(dir: &Path, content: &str) -> Result<PathBuf> {
	let path = dir.join(ICS_FILE_NAME);

	{
		let mut file = BufWriter::new(File::create(&path)?);
		file.write_all(content.as_bytes())?;
		file.flush()?;
	}

	tracing::info!(path = %path.display(), bytes = content.len(), "wrote calendar");

	Ok(path)
}

/// Maps a short day name to a weekday. Anything else, including other
/// spellings such as `MON`, falls back to Monday.
fn resolve_weekday(day: Option<&str>) -> Weekday {
	match day {
		Some("Tue") => Weekday::Tue,
		Some("Wed") => Weekday::Wed,
		Some("Thu") => Weekday::Thu,
		Some("Fri") => Weekday::Fri,
		Some("Sat") => Weekday::Sat,
		Some("Sun") => Weekday::Sun,
		_ => Weekday::Mon,
	}
}

/// The first date on or after `from` that falls on `weekday`.
fn next_weekday(from: NaiveDate, weekday: Weekday) -> NaiveDate {
	let current = from.weekday().num_days_from_monday();
	let target = weekday.num_days_from_monday();
	let days_to_add = (target + 7 - current) % 7;

	from + Duration::days(i64::from(days_to_add))
}

/// Reads the hour and minute of an `HH:MM` (or `HH:MM:SS`) time. Empty
/// components count as zero and fractions are truncated, so `9.5` is hour 9.
#[allow(clippy::cast_possible_truncation)]
fn clock(value: &str, field: &'static str) -> Result<(i64, i64)> {
	let component = |part: Option<&str>| match part.map(str::trim) {
		Some("") => Some(0),
		Some(part) => part
			.parse::<f64>()
			.ok()
			.filter(|n| n.is_finite() && n.abs() < 1e9)
			.map(|n| n.trunc() as i64),
		None => None,
	};

	let mut parts = value.split(':');

	match (component(parts.next()), component(parts.next())) {
		(Some(hour), Some(minute)) => Ok((hour, minute)),
		_ => Err(TimetableError::InvalidTime {
			field,
			value: value.to_string(),
		}),
	}
}

/// Combines a date with an hour and minute. Values outside their range roll
/// over in either direction, so `-1:00` is 23:00 the day before.
fn at(date: NaiveDate, (hour, minute): (i64, i64), field: &'static str, record: &MeetingRecord) -> Result<NaiveDateTime> {
	let offset = Duration::minutes(hour * 60 + minute);

	date.and_time(NaiveTime::MIN)
		.checked_add_signed(offset)
		.ok_or_else(|| TimetableError::InvalidTime {
			field,
			value: format!("{hour:02}:{minute:02} ({})", record.course_code),
		})
}

/// Escapes a TEXT value: backslash, semicolon, comma and line breaks.
fn escape_text(value: &str) -> String {
	let mut out = String::with_capacity(value.len());
	let mut chars = value.chars().peekable();

	while let Some(c) = chars.next() {
		match c {
			'\\' => out.push_str("\\\\"),
			';' => out.push_str("\\;"),
			',' => out.push_str("\\,"),
			'\r' => {
				chars.next_if_eq(&'\n');
				out.push_str("\\n");
			}
			'\n' => out.push_str("\\n"),
			c => out.push(c),
		}
	}

	out
}

/// Splits a content line into lines of at most 75 octets, continuation
/// lines starting with a space. Returns the line with its CRLF.
fn fold(line: &str) -> String {
	let mut out = String::with_capacity(line.len() + 8);
	let mut width = 0;

	for c in line.chars() {
		if width + c.len_utf8() > LINE_LIMIT {
			out.push_str("\r\n ");
			width = 1;
		}

		out.push(c);
		width += c.len_utf8();
	}

	out.push_str("\r\n");
	out
}

/// Parses an IANA zone name such as `Asia/Bangkok`.
///
/// # Errors
///
/// Fails when the name is not a known zone.
pub fn parse_timezone(name: &str) -> Result<Tz> {
	name.trim()
		.parse::<Tz>()
		.map_err(|_| TimetableError::UnknownTimeZone(name.to_string()))
}

#[cfg(test)]
mod tests {
	use super::*;

	// a Wednesday
	fn now() -> DateTime<Utc> {
		"2024-09-04T08:00:00Z".parse().unwrap()
	}

	fn values<'a>(ics: &'a str, key: &str) -> Vec<&'a str> {
		let prefix = format!("{key}:");

		ics.lines()
			.filter_map(|line| line.strip_prefix(prefix.as_str()))
			.collect()
	}

	fn stamp(value: &str) -> NaiveDateTime {
		NaiveDateTime::parse_from_str(value, STAMP_FORMAT).unwrap()
	}

	fn render(options: ExportOptions, records: &[MeetingRecord]) -> String {
		CalendarExporter::new(options).render_at(records, now()).unwrap()
	}

	#[test]
	fn empty_input_is_a_bare_envelope() {
		let ics = render(ExportOptions::default(), &[]);

		assert_eq!(
			ics,
			"BEGIN:VCALENDAR\r\nVERSION:2.0\r\nPRODID:-//RSU Timetable//EN\r\nX-WR-CALNAME:Timetable\r\nEND:VCALENDAR\r\n"
		);
	}

	#[test]
	fn single_record() {
		let record = MeetingRecord::new("CS101").on("Tue", "13:00", "14:30");
		let ics = render(ExportOptions::default().with_calendar_name("Fall 2024"), &[record]);

		assert!(ics.starts_with(
			"BEGIN:VCALENDAR\r\nVERSION:2.0\r\nPRODID:-//RSU Timetable//EN\r\nX-WR-CALNAME:Fall 2024\r\n"
		));
		assert!(ics.ends_with("END:VEVENT\r\nEND:VCALENDAR\r\n"));
		assert_eq!(ics.matches("BEGIN:VEVENT").count(), 1);
		assert_eq!(ics.matches("END:VEVENT").count(), 1);

		assert_eq!(values(&ics, "SUMMARY"), ["CS101"]);
		assert_eq!(values(&ics, "LOCATION"), [""]);
		assert_eq!(values(&ics, "DTSTAMP"), ["20240904T080000Z"]);
		assert_eq!(values(&ics, "UID"), ["20240904T080000Z-0@rsu"]);
		assert_eq!(values(&ics, "DTSTART"), ["20240910T130000Z"]);
		assert_eq!(values(&ics, "DTEND"), ["20240910T143000Z"]);

		let start = stamp(values(&ics, "DTSTART")[0]);
		let end = stamp(values(&ics, "DTEND")[0]);
		assert_eq!(end - start, Duration::minutes(90));
	}

	#[test]
	fn every_line_ends_with_crlf() {
		let record = MeetingRecord::new("CS101").named("Programming").in_room("B-201").on("Mon", "09:00", "10:00");
		let ics = render(ExportOptions::default(), &[record]);

		assert!(ics.split_inclusive('\n').all(|line| line.ends_with("\r\n")));
		assert_eq!(values(&ics, "SUMMARY"), ["CS101 Programming"]);
		assert_eq!(values(&ics, "LOCATION"), ["B-201"]);
	}

	#[test]
	fn anchors_to_next_occurrence_including_today() {
		let records = ["Wed", "Thu", "Sun", "Mon", "Tue"].map(|day| MeetingRecord::new(day).on(day, "09:00", "10:00"));
		let ics = render(ExportOptions::default(), &records);

		assert_eq!(
			values(&ics, "DTSTART"),
			[
				"20240904T090000Z",
				"20240905T090000Z",
				"20240908T090000Z",
				"20240909T090000Z",
				"20240910T090000Z",
			]
		);
	}

	#[test]
	fn keeps_every_record_in_input_order() {
		let unknown_day = MeetingRecord::new("B").on("Funday", "11:00", "12:00");
		let records = [
			MeetingRecord::new("A"),
			unknown_day,
			MeetingRecord::new("C").on("MONDAY", "14:00", "15:00"),
		];
		let ics = render(ExportOptions::default(), &records);

		assert_eq!(ics.matches("BEGIN:VEVENT").count(), records.len());
		assert_eq!(
			values(&ics, "UID"),
			[
				"20240904T080000Z-0@rsu",
				"20240904T080000Z-1@rsu",
				"20240904T080000Z-2@rsu",
			]
		);
		// missing and unrecognized days fall back to Monday, missing times
		// to 09:00-10:00
		assert_eq!(
			values(&ics, "DTSTART"),
			["20240909T090000Z", "20240909T110000Z", "20240909T140000Z"]
		);
		assert_eq!(values(&ics, "DTEND")[0], "20240909T100000Z");
	}

	#[test]
	fn reads_seconds_and_rolls_over() {
		let records = [
			MeetingRecord::new("A").on("Fri", "08:30:00", "24:00"),
		];
		let ics = render(ExportOptions::default(), &records);

		assert_eq!(values(&ics, "DTSTART"), ["20240906T083000Z"]);
		assert_eq!(values(&ics, "DTEND"), ["20240907T000000Z"]);
	}

	#[test]
	fn rejects_non_numeric_times() {
		let record = MeetingRecord::new("A").on("Mon", "noon", "13:00");
		let err = CalendarExporter::default().render_at(&[record], now()).unwrap_err();

		assert!(matches!(
			err,
			TimetableError::InvalidTime { field: "start time", ref value } if value == "noon"
		));

		let record = MeetingRecord::new("A").on("Mon", "9", "13:00");
		assert!(CalendarExporter::default().render_at(&[record], now()).is_err());
	}

	#[test]
	fn converts_local_times_to_utc() {
		let record = MeetingRecord::new("CS101").on("Tue", "13:00", "14:30");
		let ics = render(
			ExportOptions::default().with_timezone(chrono_tz::Asia::Bangkok),
			&[record],
		);

		assert_eq!(values(&ics, "DTSTART"), ["20240910T060000Z"]);
		assert_eq!(values(&ics, "DTEND"), ["20240910T073000Z"]);
	}

	#[test]
	fn today_is_evaluated_in_the_export_zone() {
		// Wednesday 20:00 UTC is already Thursday in Bangkok
		let late: DateTime<Utc> = "2024-09-04T20:00:00Z".parse().unwrap();
		let record = MeetingRecord::new("A").on("Thu", "09:00", "10:00");
		let ics = CalendarExporter::new(ExportOptions::default().with_timezone(chrono_tz::Asia::Bangkok))
			.render_at(&[record], late)
			.unwrap();

		assert_eq!(values(&ics, "DTSTART"), ["20240905T020000Z"]);
	}

	#[test]
	fn skipped_local_times_move_forward() {
		// New York springs forward at 02:00 on 2024-03-10, a Sunday
		let sunday: DateTime<Utc> = "2024-03-10T12:00:00Z".parse().unwrap();
		let record = MeetingRecord::new("A").on("Sun", "02:30", "04:00");
		let ics = CalendarExporter::new(ExportOptions::default().with_timezone(chrono_tz::America::New_York))
			.render_at(&[record], sunday)
			.unwrap();

		assert_eq!(values(&ics, "DTSTART"), ["20240310T073000Z"]);
		assert_eq!(values(&ics, "DTEND"), ["20240310T080000Z"]);
	}

	#[test]
	fn weekly_recurrence_is_opt_in() {
		let record = MeetingRecord::new("A").on("Mon", "09:00", "10:00");

		let single = render(ExportOptions::default(), &[record.clone()]);
		assert!(values(&single, "RRULE").is_empty());

		let until = NaiveDate::from_ymd_opt(2024, 12, 20);
		let weekly = render(ExportOptions::default().with_repeat_until(until), &[record]);
		let rules = values(&weekly, "RRULE");

		assert_eq!(rules.len(), 1);
		assert!(rules[0].contains("FREQ=WEEKLY"));
		assert!(rules[0].contains("UNTIL=20241220T235959"));
	}

	#[test]
	fn output_only_varies_with_the_clock() {
		let records = [
			MeetingRecord::new("A").on("Mon", "09:00", "10:00"),
			MeetingRecord::new("B").on("Thu", "13:00", "15:00").in_room("C2"),
		];
		let exporter = CalendarExporter::default();

		let first = exporter.render_at(&records, now()).unwrap();
		let again = exporter.render_at(&records, now()).unwrap();
		assert_eq!(first, again);

		let later = exporter.render_at(&records, now() + Duration::seconds(5)).unwrap();
		assert_ne!(first, later);
		assert_eq!(
			first.replace("20240904T080000Z", "STAMP"),
			later.replace("20240904T080005Z", "STAMP")
		);
	}

	#[test]
	fn writes_timetable_ics() {
		let dir = tempfile::tempdir().unwrap();
		let exporter = CalendarExporter::default();

		let path = exporter
			.export_to_dir(&[MeetingRecord::new("A").on("Mon", "09:00", "10:00")], dir.path())
			.unwrap();

		assert_eq!(path, dir.path().join("timetable.ics"));

		let written = std::fs::read_to_string(&path).unwrap();
		assert!(written.starts_with("BEGIN:VCALENDAR\r\n"));
		assert_eq!(written.matches("BEGIN:VEVENT").count(), 1);
	}

	#[test]
	fn resolves_short_day_names_only() {
		assert_eq!(resolve_weekday(Some("Sun")), Weekday::Sun);
		assert_eq!(resolve_weekday(Some("Sat")), Weekday::Sat);
		assert_eq!(resolve_weekday(Some("Tue")), Weekday::Tue);
		assert_eq!(resolve_weekday(Some("sat")), Weekday::Mon);
		assert_eq!(resolve_weekday(Some("FRI")), Weekday::Mon);
		assert_eq!(resolve_weekday(Some("Tuesday")), Weekday::Mon);
		assert_eq!(resolve_weekday(None), Weekday::Mon);
	}

	#[test]
	fn uppercase_days_are_placed_on_monday() {
		let record = MeetingRecord::new("A").on("FRI", "09:00", "10:00");
		let ics = render(ExportOptions::default(), &[record]);

		assert_eq!(values(&ics, "DTSTART"), ["20240909T090000Z"]);
	}

	#[test]
	fn escapes_the_calendar_name() {
		let record = MeetingRecord::new("A").on("Mon", "09:00", "10:00");
		let ics = render(
			ExportOptions::default().with_calendar_name("Plan A, Term 1\r\nBEGIN:VEVENT; x\\y"),
			&[record],
		);

		assert_eq!(values(&ics, "X-WR-CALNAME"), ["Plan A\\, Term 1\\nBEGIN:VEVENT\\; x\\\\y"]);
		assert_eq!(ics.matches("BEGIN:VEVENT").count(), 1);
		assert!(!ics.lines().any(|line| line == "BEGIN:VEVENT; x\\y"));
	}

	#[test]
	fn folds_long_calendar_names() {
		let name = "Semester timetable ".repeat(6);
		let ics = render(ExportOptions::default().with_calendar_name(name.trim()), &[]);

		assert!(ics.lines().all(|line| line.len() <= 75));

		let unfolded = ics.replace("\r\n ", "");
		assert_eq!(values(&unfolded, "X-WR-CALNAME"), [name.trim()]);
	}

	#[test]
	fn rolls_over_in_both_directions() {
		// Saturday is 2024-09-07
		let record = MeetingRecord::new("A").on("Sat", "-1:00", "9.5:00");
		let ics = render(ExportOptions::default(), &[record]);

		assert_eq!(values(&ics, "DTSTART"), ["20240906T230000Z"]);
		assert_eq!(values(&ics, "DTEND"), ["20240907T090000Z"]);
	}

	#[test]
	fn skips_recurrence_ending_before_the_first_meeting() {
		let until = NaiveDate::from_ymd_opt(2024, 9, 5);
		let records = [
			MeetingRecord::new("WED").on("Wed", "09:00", "10:00"),
			MeetingRecord::new("MON").on("Mon", "09:00", "10:00"),
		];
		let ics = render(ExportOptions::default().with_repeat_until(until), &records);

		// only the Wednesday meeting starts before the end date
		assert_eq!(values(&ics, "RRULE").len(), 1);
		assert_eq!(ics.matches("BEGIN:VEVENT").count(), 2);
	}

	#[test]
	fn parses_zone_names() {
		assert_eq!(parse_timezone("Asia/Bangkok").unwrap(), chrono_tz::Asia::Bangkok);
		assert!(matches!(
			parse_timezone("Mars/Olympus"),
			Err(TimetableError::UnknownTimeZone(name)) if name == "Mars/Olympus"
		));
	}
}
