use std::path::PathBuf;

use chrono::NaiveDate;
use chrono_tz::Tz;
use clap::{Args, Parser, Subcommand, ValueEnum};

/// Check and export RSU timetables
#[derive(Debug, Parser)]
#[command(name = "rsu-timetable", version, about, long_about = None)]
pub struct Cli {
	/// Enable debug logging
	#[arg(long, short = 'v', global = true)]
	pub debug: bool,

	/// Log output format
	#[arg(long, value_enum, default_value_t = LogFormatArg::Compact, global = true)]
	pub log_format: LogFormatArg,

	#[command(subcommand)]
	pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
	/// List overlapping meetings
	Conflicts(Input),
	/// Write the timetable as timetable.ics
	Export(ExportArgs),
	/// Print the timetable grouped by day
	Week(Input),
	/// Save the timetable as a snapshot for later runs
	Save(SaveArgs),
}

#[derive(Debug, Args)]
pub struct Input {
	/// Timetable JSON: a list of meetings, an optimizer response or a saved
	/// snapshot. Reads stdin when omitted.
	#[arg(value_name = "FILE", value_hint = clap::ValueHint::FilePath)]
	pub path: Option<PathBuf>,

	/// Only keep these course codes (repeatable)
	#[arg(long = "course", value_name = "CODE", action = clap::ArgAction::Append)]
	pub courses: Vec<String>,

	/// Refuse snapshots saved for a different student
	#[arg(long, env = "RSU_STUDENT_ID")]
	pub student_id: Option<String>,
}

#[derive(Debug, Args)]
pub struct ExportArgs {
	#[command(flatten)]
	pub input: Input,

	/// Directory to write timetable.ics into
	#[arg(short, long, value_name = "DIR", default_value = ".", value_hint = clap::ValueHint::DirPath)]
	pub output: PathBuf,

	/// Print the calendar instead of writing a file
	#[arg(long, conflicts_with = "output")]
	pub stdout: bool,

	/// Calendar title shown by calendar apps
	#[arg(long, env = "RSU_TIMETABLE_NAME", default_value = "Timetable")]
	pub name: String,

	/// IANA time zone the meeting times are in
	#[arg(long, env = "RSU_TIMETABLE_TZ", default_value = "UTC", value_parser = parse_timezone)]
	pub timezone: Tz,

	/// Repeat every meeting weekly until this date (YYYY-MM-DD)
	#[arg(long, value_name = "DATE")]
	pub repeat_until: Option<NaiveDate>,
}

#[derive(Debug, Args)]
pub struct SaveArgs {
	#[command(flatten)]
	pub input: Input,

	/// Where to write the snapshot
	#[arg(short, long, default_value = "hybrid_timetable.json", value_hint = clap::ValueHint::FilePath)]
	pub output: PathBuf,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogFormatArg {
	Compact,
	Json,
}

fn parse_timezone(s: &str) -> Result<Tz, String> {
	rsu_timetable_core::parse_timezone(s).map_err(|e| e.to_string())
}
