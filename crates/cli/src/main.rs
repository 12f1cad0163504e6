#![warn(clippy::pedantic)]

mod cli;

use std::{
	fs::File,
	io::{self, BufReader, BufWriter, Write},
};

use anyhow::{bail, Context};
use clap::Parser;
use rsu_timetable_core::{
	detect_conflicts, filter_courses, group_by_day, init_tracing, read_payload, CalendarExporter,
	ExportOptions, LogFormat, MeetingRecord, Payload, Preference, SavedTimetable, TracingConfig,
};

use crate::cli::{Cli, Command, ExportArgs, Input, LogFormatArg, SaveArgs};

fn main() -> anyhow::Result<()> {
	let cli = Cli::parse();

	let config = if cli.debug {
		TracingConfig::debug()
	} else {
		TracingConfig::default()
	};
	let format = match cli.log_format {
		LogFormatArg::Compact => LogFormat::Compact,
		LogFormatArg::Json => LogFormat::Json,
	};
	init_tracing(&config.with_format(format)).context("failed to initialize logging")?;

	let mut stdout = io::stdout().lock();

	match cli.command {
		Command::Conflicts(input) => {
			let (records, _) = load(&input)?;

			for conflict in detect_conflicts(&records) {
				writeln!(stdout, "{conflict}")?;
			}
		}
		Command::Export(args) => export(&args, &mut stdout)?,
		Command::Week(input) => {
			let (records, preference) = load(&input)?;

			if let Some(preference) = preference {
				writeln!(
					stdout,
					"Avoid Monday: {} | Preferred time: {}\n",
					if preference.avoid_monday { "Yes" } else { "No" },
					preference.prefer_time.as_deref().unwrap_or("None"),
				)?;
			}

			write!(stdout, "{}", group_by_day(&records))?;
		}
		Command::Save(args) => save(&args)?,
	}

	stdout.flush()?;

	Ok(())
}

fn export(args: &ExportArgs, out: &mut impl Write) -> anyhow::Result<()> {
	let (records, _) = load(&args.input)?;
	let exporter = CalendarExporter::new(
		ExportOptions::default()
			.with_calendar_name(&args.name)
			.with_timezone(args.timezone)
			.with_repeat_until(args.repeat_until),
	);

	if args.stdout {
		let calendar = exporter.render(&records).context("failed to render calendar")?;
		out.write_all(calendar.as_bytes())?;
	} else {
		let path = exporter
			.export_to_dir(&records, &args.output)
			.with_context(|| format!("failed to export calendar into {}", args.output.display()))?;

		tracing::info!(events = records.len(), "exported timetable");
		writeln!(out, "{}", path.display())?;
	}

	Ok(())
}

fn save(args: &SaveArgs) -> anyhow::Result<()> {
	let Some(student_id) = args.input.student_id.as_deref() else {
		bail!("--student-id is required to save a snapshot");
	};
	let (records, preference) = load(&args.input)?;

	if records.is_empty() {
		bail!("refusing to save an empty timetable");
	}

	let snapshot = SavedTimetable::new(student_id, records, preference, chrono::Utc::now());
	let file = File::create(&args.output)
		.with_context(|| format!("failed to create {}", args.output.display()))?;

	let mut writer = BufWriter::new(file);
	snapshot.write_to(&mut writer)?;
	writer.flush()?;

	tracing::info!(path = %args.output.display(), rows = snapshot.rows.len(), "saved timetable");

	Ok(())
}

fn load(input: &Input) -> anyhow::Result<(Vec<MeetingRecord>, Option<Preference>)> {
	let payload = if let Some(path) = &input.path {
		let file = File::open(path).with_context(|| format!("failed to open {}", path.display()))?;
		read_payload(BufReader::new(file))
	} else {
		read_payload(io::stdin().lock())
	}
	.context("failed to read timetable")?;

	if let (Some(student_id), Payload::Saved(saved)) = (input.student_id.as_deref(), &payload) {
		if saved.student_id.is_some() && !saved.belongs_to(student_id) {
			bail!("snapshot belongs to a different student");
		}
	}

	let preference = payload.preference().cloned();
	let records = filter_courses(payload.into_records()?, &input.courses);

	tracing::debug!(records = records.len(), "loaded timetable");

	Ok((records, preference))
}
