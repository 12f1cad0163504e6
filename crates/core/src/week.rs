use std::fmt;

use crate::meeting::MeetingRecord;

/// Days shown even when nothing is scheduled on them.
pub const TEACHING_DAYS: [&str; 6] = ["MON", "TUE", "WED", "THU", "FRI", "SAT"];

/// Meetings grouped by day, each day sorted by start time.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WeekView<'a> {
	pub days: Vec<(String, Vec<&'a MeetingRecord>)>,
}

impl<'a> WeekView<'a> {
	pub fn get(&self, day: &str) -> Option<&[&'a MeetingRecord]> {
		self.days
			.iter()
			.find(|(d, _)| d == day)
			.map(|(_, meetings)| meetings.as_slice())
	}
}

/// Groups meetings by their `day` value. The teaching days always appear
/// first, in week order; any other day values follow in order of first
/// appearance. Meetings without a day are listed under an empty key.
#[must_use]
pub fn group_by_day(records: &[MeetingRecord]) -> WeekView<'_> {
	let mut days = TEACHING_DAYS
		.iter()
		.map(|day| ((*day).to_string(), Vec::new()))
		.collect::<Vec<(String, Vec<&MeetingRecord>)>>();

	for record in records {
		let day = record.day.as_deref().unwrap_or_default();

		match days.iter_mut().find(|(d, _)| d == day) {
			Some((_, meetings)) => meetings.push(record),
			None => days.push((day.to_string(), vec![record])),
		}
	}

	for (_, meetings) in &mut days {
		meetings.sort_by(|a, b| {
			a.start_time
				.as_deref()
				.unwrap_or_default()
				.cmp(b.start_time.as_deref().unwrap_or_default())
		});
	}

	WeekView { days }
}

/// Full name for a teaching day code, or the code itself.
#[must_use]
pub fn day_label(day: &str) -> &str {
	match day {
		"MON" => "Monday",
		"TUE" => "Tuesday",
		"WED" => "Wednesday",
		"THU" => "Thursday",
		"FRI" => "Friday",
		"SAT" => "Saturday",
		other => other,
	}
}

/// Cuts a time such as `09:00:00` down to `09:00`.
#[must_use]
pub fn short_time(time: Option<&str>) -> &str {
	let time = time.unwrap_or_default();

	time.char_indices().nth(5).map_or(time, |(end, _)| &time[..end])
}

/// One line of a weekly listing.
pub struct Listing<'a>(pub &'a MeetingRecord);

impl fmt::Display for Listing<'_> {
	fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
		let meeting = self.0;
		let title = format!("{} {}", meeting.course_code, meeting.course_name().unwrap_or_default());

		write!(
			f,
			"{}-{} {} | {} | {}",
			short_time(meeting.start_time.as_deref()),
			short_time(meeting.end_time.as_deref()),
			title.trim(),
			meeting.room.as_deref().filter(|r| !r.is_empty()).unwrap_or("Room TBA"),
			meeting.instructor.as_deref().filter(|i| !i.is_empty()).unwrap_or("Instructor TBA"),
		)?;

		if let Some(credits) = &meeting.credits {
			write!(f, " | {credits} cr")?;
		}

		Ok(())
	}
}

impl fmt::Display for WeekView<'_> {
	fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
		for (day, meetings) in &self.days {
			writeln!(f, "{}", if day.is_empty() { "Unscheduled" } else { day_label(day) })?;

			if meetings.is_empty() {
				writeln!(f, "  No classes")?;
			}

			for meeting in meetings {
				writeln!(f, "  {}", Listing(meeting))?;
			}
		}

		Ok(())
	}
}
