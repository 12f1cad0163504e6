use crate::meeting::MeetingRecord;

/// Reports overlapping meetings as `"{day}: {a} overlaps {b}"`.
///
/// Records are grouped by day (in order of first appearance), sorted by start
/// time and then compared with their immediate successor only. Times are
/// compared as strings, which is sound for zero-padded 24-hour `HH:MM`.
/// Records without a day, start time or end time are ignored.
///
/// A meeting that overlaps a later, non-adjacent meeting is not reported
/// unless every meeting in between overlaps as well.
#[must_use]
pub fn detect_conflicts(records: &[MeetingRecord]) -> Vec<String> {
	let mut days: Vec<(&str, Vec<Slot>)> = Vec::new();

	for record in records {
		let (Some(day), Some(start), Some(end)) = (record.day(), record.start_time(), record.end_time())
		else {
			continue;
		};

		let slot = Slot {
			start,
			end,
			code: &record.course_code,
		};

		match days.iter_mut().find(|(d, _)| *d == day) {
			Some((_, slots)) => slots.push(slot),
			None => days.push((day, vec![slot])),
		}
	}

	let mut conflicts = Vec::new();

	for (day, mut slots) in days {
		// stable, so equal start times keep input order
		slots.sort_by(|a, b| a.start.cmp(b.start));

		for pair in slots.windows(2) {
			let (a, b) = (&pair[0], &pair[1]);

			if a.end > b.start {
				tracing::trace!(day, a = a.code, b = b.code, "overlap");
				conflicts.push(format!("{day}: {} overlaps {}", a.code, b.code));
			}
		}
	}

	conflicts
}

struct Slot<'a> {
	start: &'a str,
	end: &'a str,
	code: &'a str,
}
