//! Task-list deadline engine.
//!
//! Pure derivation of per-document status and the overall "overdue" warning
//! from a hearing date and the set of uploaded documents. Task definitions
//! are static configuration data, grouped by how many days before the
//! hearing each group falls due.

use std::sync::OnceLock;

use serde::Deserialize;
use time::{Date, Duration, OffsetDateTime};

use crate::error::Error;

const SECONDS_PER_DAY: i64 = 86_400;

/// A single document task from the static task-list configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskDefinition {
    pub file_name: String,
    pub label: String,
    /// Absent means required. Only an explicit `false` exempts the task
    /// from the warning computation.
    #[serde(default)]
    pub required: Option<bool>,
}

impl TaskDefinition {
    /// Whether this task must be uploaded to count as satisfied.
    #[must_use]
    pub fn is_required(&self) -> bool {
        self.required.unwrap_or(true)
    }
}

/// Task definitions grouped by due-date offset before the hearing.
#[derive(Debug, Clone, Deserialize)]
pub struct TaskGroups {
    pub offset35: Vec<TaskDefinition>,
    pub offset14: Vec<TaskDefinition>,
    pub offset7: Vec<TaskDefinition>,
    pub offset2: Vec<TaskDefinition>,
}

impl TaskGroups {
    /// Groups paired with their offsets, furthest deadline first.
    #[must_use]
    pub fn by_offset(&self) -> [(u16, &[TaskDefinition]); 4] {
        [
            (35, self.offset35.as_slice()),
            (14, self.offset14.as_slice()),
            (7, self.offset7.as_slice()),
            (2, self.offset2.as_slice()),
        ]
    }
}

/// Completion status of a single task, derived per render.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskStatus {
    Done,
    Available,
    Optional,
    NotStartedYet,
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Done => "Done",
            Self::Available => "Available",
            Self::Optional => "Optional",
            Self::NotStartedYet => "Not started yet",
        })
    }
}

static STANDARD_ITEMS: OnceLock<TaskGroups> = OnceLock::new();
static FAST_TRACK_ITEMS: OnceLock<TaskGroups> = OnceLock::new();
static EXPRESS_ITEMS: OnceLock<TaskGroups> = OnceLock::new();

fn load(cell: &'static OnceLock<TaskGroups>, raw: &str) -> &'static TaskGroups {
    cell.get_or_init(|| serde_json::from_str(raw).expect("task-list configuration is valid JSON"))
}

/// Task definitions for a form type: `fasttrack`, `express`, or anything
/// else for the standard Form C list.
#[must_use]
pub fn task_list_form_items(form_type: &str) -> &'static TaskGroups {
    match form_type {
        "fasttrack" => load(
            &FAST_TRACK_ITEMS,
            include_str!("../data/task-list/fast-track-items.json"),
        ),
        "express" => load(
            &EXPRESS_ITEMS,
            include_str!("../data/task-list/express-items.json"),
        ),
        _ => load(
            &STANDARD_ITEMS,
            include_str!("../data/task-list/standard-form-c-items.json"),
        ),
    }
}

/// Static case data backing the dashboard: the hearing date, the form
/// variant in use, and which documents the citizen has already uploaded.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CaseModel {
    pub first_hearing_date: String,
    pub form_type: String,
    pub uploaded_documents: Vec<String>,
    pub divorce_case_url: String,
    pub getting_help: GettingHelp,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GettingHelp {
    pub email: String,
    pub telephone: String,
}

static CASE_MODEL: OnceLock<CaseModel> = OnceLock::new();

/// The case model collaborator input for the dashboard.
#[must_use]
pub fn case_model() -> &'static CaseModel {
    CASE_MODEL.get_or_init(|| {
        serde_json::from_str(include_str!("../data/case/tasklist.json"))
            .expect("case model is valid JSON")
    })
}

/// Parse a hearing date in `YYYY-MM-DD` form.
///
/// # Errors
///
/// Returns [`Error::Config`] if the string is not a valid calendar date.
pub fn parse_hearing_date(s: &str) -> Result<Date, Error> {
    let format = time::macros::format_description!("[year]-[month]-[day]");
    Date::parse(s, &format).map_err(|e| Error::Config(format!("invalid hearing date {s:?}: {e}")))
}

/// Date `offset_days` calendar days before the hearing, formatted
/// `"D Month YYYY"`.
#[must_use]
pub fn offset_date(hearing_date: Date, offset_days: u16) -> String {
    let due = hearing_date - Duration::days(i64::from(offset_days));
    format!("{} {} {}", due.day(), due.month(), due.year())
}

/// Status for one task given the uploaded documents.
///
/// Fails closed: unknown filenames are `NotStartedYet`, never `Done`.
#[must_use]
pub fn task_status<S: AsRef<str>>(file_name: &str, documents: &[S]) -> TaskStatus {
    if documents.iter().any(|d| d.as_ref() == file_name) {
        TaskStatus::Done
    } else if file_name == "statement_of_costs_incurred_h.pdf" {
        TaskStatus::Available
    } else if file_name == "position_statement_for_the_hearing.pdf" {
        TaskStatus::Optional
    } else {
        TaskStatus::NotStartedYet
    }
}

/// Whether the dashboard should show the overdue-documents warning.
///
/// Uses the standard Form C task list and the current time; see
/// [`warning_for_days_remaining`] for the underlying rule.
#[must_use]
pub fn task_list_warning_message<S: AsRef<str>>(first_hearing_date: Date, documents: &[S]) -> bool {
    let days = days_remaining(first_hearing_date, OffsetDateTime::now_utc());
    warning_for_days_remaining(days, documents, task_list_form_items("standard"))
}

/// Whole days from `now` until the hearing date's midnight, rounded toward
/// negative infinity (a hearing earlier today is already negative).
#[must_use]
pub fn days_remaining(hearing_date: Date, now: OffsetDateTime) -> i64 {
    let hearing = hearing_date.midnight().assume_utc();
    (hearing.unix_timestamp() - now.unix_timestamp()).div_euclid(SECONDS_PER_DAY)
}

/// The warning rule: with 35 or more days to go there is never a warning.
/// Closer in, task groups accumulate as their thresholds pass (35, then 14,
/// then 7, then 2; a past hearing accumulates all four), and the warning
/// fires iff any required task in the accumulated set is not uploaded.
#[must_use]
pub fn warning_for_days_remaining<S: AsRef<str>>(
    days_remaining: i64,
    documents: &[S],
    groups: &TaskGroups,
) -> bool {
    if days_remaining >= 35 {
        return false;
    }

    let mut accumulated: Vec<&TaskDefinition> = groups.offset35.iter().collect();
    if days_remaining < 14 {
        accumulated.extend(&groups.offset14);
    }
    if days_remaining < 7 {
        accumulated.extend(&groups.offset7);
    }
    if days_remaining < 2 {
        accumulated.extend(&groups.offset2);
    }

    !accumulated.iter().all(|task| {
        if task.is_required() {
            documents.iter().any(|d| d.as_ref() == task.file_name)
        } else {
            true
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::date;

    fn all_standard_documents() -> Vec<String> {
        task_list_form_items("standard")
            .by_offset()
            .iter()
            .flat_map(|(_, tasks)| tasks.iter().map(|t| t.file_name.clone()))
            .collect()
    }

    #[test]
    fn offset_date_subtracts_each_known_offset() {
        let hearing = date!(2026 - 01 - 28);
        assert_eq!(offset_date(hearing, 35), "24 December 2025");
        assert_eq!(offset_date(hearing, 14), "14 January 2026");
        assert_eq!(offset_date(hearing, 7), "21 January 2026");
        assert_eq!(offset_date(hearing, 2), "26 January 2026");
    }

    #[test]
    fn offset_date_crosses_month_and_year_boundaries() {
        assert_eq!(offset_date(date!(2026 - 03 - 01), 2), "27 February 2026");
        assert_eq!(offset_date(date!(2026 - 01 - 01), 7), "25 December 2025");
    }

    #[test]
    fn task_status_done_when_uploaded() {
        assert_eq!(task_status("a.pdf", &["a.pdf"]), TaskStatus::Done);
    }

    #[test]
    fn task_status_special_cases_when_missing() {
        let none: [&str; 0] = [];
        assert_eq!(
            task_status("statement_of_costs_incurred_h.pdf", &none),
            TaskStatus::Available
        );
        assert_eq!(
            task_status("position_statement_for_the_hearing.pdf", &none),
            TaskStatus::Optional
        );
    }

    #[test]
    fn task_status_fails_closed_for_unknown_files() {
        let none: [&str; 0] = [];
        assert_eq!(task_status("unknown.pdf", &none), TaskStatus::NotStartedYet);
    }

    #[test]
    fn task_status_upload_wins_over_special_cases() {
        let docs = ["statement_of_costs_incurred_h.pdf"];
        assert_eq!(
            task_status("statement_of_costs_incurred_h.pdf", &docs),
            TaskStatus::Done
        );
    }

    #[test]
    fn status_display_matches_page_text() {
        assert_eq!(TaskStatus::Done.to_string(), "Done");
        assert_eq!(TaskStatus::Available.to_string(), "Available");
        assert_eq!(TaskStatus::Optional.to_string(), "Optional");
        assert_eq!(TaskStatus::NotStartedYet.to_string(), "Not started yet");
    }

    #[test]
    fn no_warning_at_or_beyond_35_days() {
        let none: [&str; 0] = [];
        let groups = task_list_form_items("standard");
        assert!(!warning_for_days_remaining(35, &none, groups));
        assert!(!warning_for_days_remaining(45, &none, groups));
    }

    #[test]
    fn warning_when_first_group_outstanding() {
        let none: [&str; 0] = [];
        let groups = task_list_form_items("standard");
        assert!(warning_for_days_remaining(34, &none, groups));
    }

    #[test]
    fn no_warning_when_accumulated_groups_satisfied() {
        let groups = task_list_form_items("standard");
        let form_e_docs = [
            "financial_statement_e_e1_e2.pdf",
            "financial_evidence_for_your_form_e.pdf",
        ];
        // Only the 35-day group has accumulated at 20 days out.
        assert!(!warning_for_days_remaining(20, &form_e_docs, groups));
        // At 10 days the 14-day group joins and is outstanding.
        assert!(warning_for_days_remaining(10, &form_e_docs, groups));
    }

    #[test]
    fn optional_tasks_never_trigger_the_warning() {
        let groups = task_list_form_items("standard");
        let docs: Vec<String> = all_standard_documents()
            .into_iter()
            .filter(|d| d != "position_statement_for_the_hearing.pdf")
            .collect();
        assert!(!warning_for_days_remaining(1, &docs, groups));
    }

    #[test]
    fn past_hearing_accumulates_all_groups() {
        let groups = task_list_form_items("standard");
        let docs = all_standard_documents();
        assert!(!warning_for_days_remaining(-3, &docs, groups));

        let missing_bundle: Vec<String> = docs
            .into_iter()
            .filter(|d| d != "hearing_bundle.pdf")
            .collect();
        assert!(warning_for_days_remaining(-3, &missing_bundle, groups));
    }

    #[test]
    fn days_remaining_floors_toward_negative_infinity() {
        let now = date!(2026 - 01 - 28).midnight().assume_utc() + Duration::hours(12);
        assert_eq!(days_remaining(date!(2026 - 01 - 30), now), 1);
        assert_eq!(days_remaining(date!(2026 - 01 - 28), now), -1);
        assert_eq!(days_remaining(date!(2026 - 01 - 29), now), 0);
    }

    #[test]
    fn form_variants_resolve_with_standard_fallback() {
        assert!(!task_list_form_items("fasttrack").offset2.is_empty());
        assert!(!task_list_form_items("express").offset2.is_empty());
        let standard = task_list_form_items("standard");
        let fallback = task_list_form_items("undefined");
        assert_eq!(standard.offset35.len(), fallback.offset35.len());
    }

    #[test]
    fn parse_hearing_date_accepts_iso_and_rejects_garbage() {
        assert_eq!(parse_hearing_date("2026-01-28").unwrap(), date!(2026 - 01 - 28));
        assert!(parse_hearing_date("28/01/2026").is_err());
        assert!(parse_hearing_date("2026-13-01").is_err());
    }
}
