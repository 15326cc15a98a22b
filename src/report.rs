//! Per-run accounting of counts, timing and terminal status.
//!
//! A [`Report`] is owned by the engine for the duration of a run and only
//! mutated from inside the crate. Callers receive it by value once the run
//! reaches a terminal status, or as an immutable borrow from the progress
//! callback between records.
//!
//! Formatted views are pure functions of the counters and timestamps.
//! Whenever the total record count is unknown or zero, every percentage and
//! average-time view renders [`NOT_AVAILABLE`] instead of dividing.

use std::fmt;

use chrono::{DateTime, Local};

/// Sentinel rendered by derived views that need a known, non-zero total.
pub const NOT_AVAILABLE: &str = "N/A";

const TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Lifecycle status of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Status {
    #[default]
    Ready,
    Running,
    Finished,
    Aborted,
}

impl Status {
    pub fn is_terminal(self) -> bool {
        matches!(self, Status::Finished | Status::Aborted)
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Status::Ready => "READY",
            Status::Running => "RUNNING",
            Status::Finished => "FINISHED",
            Status::Aborted => "ABORTED",
        };
        f.write_str(s)
    }
}

/// Terminal outcome of a single record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordOutcome {
    Filtered,
    Ignored,
    Rejected,
    Error,
    Success,
}

/// Accounting of one engine run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Report {
    data_source: String,
    start_time: Option<DateTime<Local>>,
    end_time: Option<DateTime<Local>>,
    status: Status,
    total_records: Option<u64>,
    current_record_number: u64,
    filtered: u64,
    ignored: u64,
    rejected: u64,
    errors: u64,
    success: u64,
    result: Option<String>,
}

impl Report {
    pub(crate) fn new(data_source: impl Into<String>) -> Self {
        Self {
            data_source: data_source.into(),
            ..Self::default()
        }
    }

    // --- Mutation (engine only) ---

    pub(crate) fn start(&mut self, at: DateTime<Local>, total_records: Option<u64>) {
        self.start_time = Some(at);
        self.total_records = total_records;
        self.status = Status::Running;
    }

    pub(crate) fn set_current_record_number(&mut self, number: u64) {
        self.current_record_number = number;
    }

    pub(crate) fn record_outcome(&mut self, outcome: RecordOutcome) {
        match outcome {
            RecordOutcome::Filtered => self.filtered += 1,
            RecordOutcome::Ignored => self.ignored += 1,
            RecordOutcome::Rejected => self.rejected += 1,
            RecordOutcome::Error => self.errors += 1,
            RecordOutcome::Success => self.success += 1,
        }
    }

    pub(crate) fn set_result(&mut self, result: Option<String>) {
        self.result = result;
    }

    /// Move to a terminal status and stamp the end time.
    pub(crate) fn complete(&mut self, status: Status, at: DateTime<Local>) {
        debug_assert!(status.is_terminal());
        self.status = status;
        self.end_time = Some(at);
    }

    // --- Raw values ---

    pub fn data_source(&self) -> &str {
        &self.data_source
    }

    pub fn start_time(&self) -> Option<DateTime<Local>> {
        self.start_time
    }

    pub fn end_time(&self) -> Option<DateTime<Local>> {
        self.end_time
    }

    pub fn status(&self) -> Status {
        self.status
    }

    /// Total number of records announced by the source, if known.
    pub fn total_records(&self) -> Option<u64> {
        self.total_records
    }

    pub fn current_record_number(&self) -> u64 {
        self.current_record_number
    }

    pub fn filtered_records(&self) -> u64 {
        self.filtered
    }

    pub fn ignored_records(&self) -> u64 {
        self.ignored
    }

    pub fn rejected_records(&self) -> u64 {
        self.rejected
    }

    pub fn error_records(&self) -> u64 {
        self.errors
    }

    pub fn success_records(&self) -> u64 {
        self.success
    }

    /// Sum of all per-outcome counters.
    pub fn handled_records(&self) -> u64 {
        self.filtered + self.ignored + self.rejected + self.errors + self.success
    }

    /// Final computation result exposed by the processor, if any.
    pub fn result(&self) -> Option<&str> {
        self.result.as_deref()
    }

    /// Elapsed milliseconds between start and end.
    ///
    /// While running, the current time stands in for the end time.
    pub fn duration_ms(&self) -> i64 {
        match self.start_time {
            Some(start) => {
                let end = self.end_time.unwrap_or_else(Local::now);
                (end - start).num_milliseconds()
            }
            None => 0,
        }
    }

    /// `count / total * 100`, or `None` when the total is unknown or zero.
    pub fn percent(&self, count: u64) -> Option<f64> {
        self.known_total().map(|total| count as f64 / total as f64 * 100.0)
    }

    /// Batch duration divided by the total record count.
    pub fn average_record_processing_time_ms(&self) -> Option<f64> {
        self.known_total()
            .map(|total| self.duration_ms() as f64 / total as f64)
    }

    fn known_total(&self) -> Option<u64> {
        self.total_records.filter(|&total| total > 0)
    }

    // --- Formatted views ---

    pub fn formatted_start_time(&self) -> String {
        format_time(self.start_time)
    }

    pub fn formatted_end_time(&self) -> String {
        format_time(self.end_time)
    }

    pub fn formatted_batch_duration(&self) -> String {
        format!("{}ms", self.duration_ms())
    }

    pub fn formatted_total_records(&self) -> String {
        match self.total_records {
            Some(total) => total.to_string(),
            None => NOT_AVAILABLE.to_string(),
        }
    }

    /// `"20.0%"`, or `"N/A"` when the total is unknown or zero.
    pub fn formatted_percent(&self, count: u64) -> String {
        match self.percent(count) {
            Some(pct) => format!("{}%", one_decimal(pct)),
            None => NOT_AVAILABLE.to_string(),
        }
    }

    /// `"<count> (<pct>)"` where the percentage part may be `N/A`.
    pub fn formatted_count(&self, count: u64) -> String {
        format!("{count} ({})", self.formatted_percent(count))
    }

    pub fn formatted_filtered_records(&self) -> String {
        self.formatted_count(self.filtered)
    }

    pub fn formatted_ignored_records(&self) -> String {
        self.formatted_count(self.ignored)
    }

    pub fn formatted_rejected_records(&self) -> String {
        self.formatted_count(self.rejected)
    }

    pub fn formatted_error_records(&self) -> String {
        self.formatted_count(self.errors)
    }

    pub fn formatted_success_records(&self) -> String {
        self.formatted_count(self.success)
    }

    pub fn formatted_average_record_processing_time(&self) -> String {
        match self.average_record_processing_time_ms() {
            Some(avg) => format!("{}ms", one_decimal(avg)),
            None => NOT_AVAILABLE.to_string(),
        }
    }

    /// `"<current>/<total> (<pct>%)"`, or `"N/A"` when the total is unknown
    /// or zero.
    pub fn formatted_progress(&self) -> String {
        match (self.known_total(), self.percent(self.current_record_number)) {
            (Some(total), Some(pct)) => {
                format!(
                    "{}/{total} ({}%)",
                    self.current_record_number,
                    one_decimal(pct)
                )
            }
            _ => NOT_AVAILABLE.to_string(),
        }
    }
}

/// One decimal place, halves rounded away from zero.
fn one_decimal(value: f64) -> String {
    let rounded = (value * 10.0).round() / 10.0;
    format!("{rounded:.1}")
}

fn format_time(time: Option<DateTime<Local>>) -> String {
    match time {
        Some(t) => t.format(TIME_FORMAT).to_string(),
        None => NOT_AVAILABLE.to_string(),
    }
}

impl fmt::Display for Report {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Batch report:")?;
        writeln!(f, "  Data source: {}", self.data_source)?;
        writeln!(f, "  Start time: {}", self.formatted_start_time())?;
        writeln!(f, "  End time: {}", self.formatted_end_time())?;
        writeln!(f, "  Batch duration: {}", self.formatted_batch_duration())?;
        writeln!(f, "  Status: {}", self.status)?;
        writeln!(f, "  Total records: {}", self.formatted_total_records())?;
        writeln!(f, "  Filtered records: {}", self.formatted_filtered_records())?;
        writeln!(f, "  Ignored records: {}", self.formatted_ignored_records())?;
        writeln!(f, "  Rejected records: {}", self.formatted_rejected_records())?;
        writeln!(f, "  Error records: {}", self.formatted_error_records())?;
        writeln!(f, "  Success records: {}", self.formatted_success_records())?;
        writeln!(
            f,
            "  Record processing time average: {}",
            self.formatted_average_record_processing_time()
        )?;
        write!(f, "  Progress: {}", self.formatted_progress())?;
        if let Some(result) = &self.result {
            write!(f, "\n  Result: {result}")?;
        }
        Ok(())
    }
}
