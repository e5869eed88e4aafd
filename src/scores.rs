//! Raw score store: attempt -> grade -> student -> subject -> score-or-null.

use crate::catalog::PASSING_SCORE;
use crate::error::ErrorCode;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

pub type SubjectScores = BTreeMap<String, Option<f64>>;
pub type GradeScores = BTreeMap<String, SubjectScores>;
pub type AttemptScores = BTreeMap<String, Arc<GradeScores>>;

/// Same nesting as the store, used for saves and handoff payloads.
pub type ScorePatch = BTreeMap<String, BTreeMap<String, GradeScores>>;

static NEXT_REVISION: AtomicU64 = AtomicU64::new(1);

fn next_revision() -> u64 {
    NEXT_REVISION.fetch_add(1, Ordering::Relaxed)
}

#[derive(Debug, Clone, Serialize)]
pub struct ScoreStore {
    #[serde(flatten)]
    attempts: BTreeMap<String, Arc<AttemptScores>>,
    #[serde(skip)]
    revision: u64,
}

impl Default for ScoreStore {
    fn default() -> Self {
        Self {
            attempts: BTreeMap::new(),
            revision: next_revision(),
        }
    }
}

impl ScoreStore {
    /// Process-unique; every store produced by `merged` gets a fresh one.
    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn attempt(&self, attempt: &str) -> Option<&AttemptScores> {
        self.attempts.get(attempt).map(|a| a.as_ref())
    }

    pub fn grade(&self, attempt: &str, grade: &str) -> Option<&GradeScores> {
        self.attempt(attempt)
            .and_then(|a| a.get(grade))
            .map(|g| g.as_ref())
    }

    pub fn get(&self, attempt: &str, grade: &str, student_id: &str, subject: &str) -> Option<f64> {
        self.grade(attempt, grade)
            .and_then(|g| g.get(student_id))
            .and_then(|s| s.get(subject))
            .copied()
            .flatten()
    }

    pub fn attempts(&self) -> impl Iterator<Item = (&str, &AttemptScores)> {
        self.attempts.iter().map(|(k, v)| (k.as_str(), v.as_ref()))
    }

    /// Deep merge down to the subject cell. Attempts and grades the patch does not
    /// mention are shared with `self`; only touched grades are rebuilt.
    pub fn merged(&self, patch: &ScorePatch) -> ScoreStore {
        let mut attempts = self.attempts.clone();
        for (attempt, grades) in patch {
            let mut attempt_scores: AttemptScores = attempts
                .get(attempt)
                .map(|a| a.as_ref().clone())
                .unwrap_or_default();
            for (grade, students) in grades {
                let mut grade_scores: GradeScores = attempt_scores
                    .get(grade)
                    .map(|g| g.as_ref().clone())
                    .unwrap_or_default();
                for (student_id, subjects) in students {
                    let cell = grade_scores.entry(student_id.clone()).or_default();
                    for (subject, score) in subjects {
                        cell.insert(subject.clone(), *score);
                    }
                }
                attempt_scores.insert(grade.clone(), Arc::new(grade_scores));
            }
            attempts.insert(attempt.clone(), Arc::new(attempt_scores));
        }
        ScoreStore {
            attempts,
            revision: next_revision(),
        }
    }

    pub fn to_patch(&self) -> ScorePatch {
        self.attempts
            .iter()
            .map(|(attempt, grades)| {
                let grades = grades
                    .iter()
                    .map(|(grade, students)| (grade.clone(), students.as_ref().clone()))
                    .collect();
                (attempt.clone(), grades)
            })
            .collect()
    }
}

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum ScoreInputError {
    #[error("score must be a number")]
    NotANumber(String),
    #[error("score must be between 0 and 100")]
    OutOfRange(f64),
}

impl ErrorCode for ScoreInputError {
    fn code(&self) -> &'static str {
        "bad_score"
    }

    fn details(&self) -> Option<serde_json::Value> {
        match self {
            ScoreInputError::NotANumber(raw) => Some(serde_json::json!({ "value": raw })),
            ScoreInputError::OutOfRange(v) => Some(serde_json::json!({ "value": v })),
        }
    }
}

/// Blank means unset; otherwise a finite number in [0, 100].
pub fn parse_score_input(raw: &str) -> Result<Option<f64>, ScoreInputError> {
    let t = raw.trim();
    if t.is_empty() {
        return Ok(None);
    }
    let v: f64 = t
        .parse()
        .map_err(|_| ScoreInputError::NotANumber(raw.to_string()))?;
    check_score(v).map(Some)
}

pub fn check_score(v: f64) -> Result<f64, ScoreInputError> {
    if !v.is_finite() {
        return Err(ScoreInputError::NotANumber(v.to_string()));
    }
    if !(0.0..=100.0).contains(&v) {
        return Err(ScoreInputError::OutOfRange(v));
    }
    Ok(v)
}

/// Every cell of a patch must pass the same rule as typed input.
pub fn validate_patch(patch: &ScorePatch) -> Result<(), ScoreInputError> {
    for grades in patch.values() {
        for students in grades.values() {
            for subjects in students.values() {
                for score in subjects.values().flatten() {
                    check_score(*score)?;
                }
            }
        }
    }
    Ok(())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum PassStatus {
    NotEntered,
    Pass,
    Fail,
}

impl PassStatus {
    pub fn of(score: Option<f64>) -> Self {
        match score {
            None => PassStatus::NotEntered,
            Some(v) if v >= PASSING_SCORE => PassStatus::Pass,
            Some(_) => PassStatus::Fail,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            PassStatus::NotEntered => "-",
            PassStatus::Pass => "ผ่าน",
            PassStatus::Fail => "ไม่ผ่าน",
        }
    }
}

/// Mean of the entered values; `None` when nothing is entered.
pub fn mean_of_entered<I>(scores: I) -> Option<f64>
where
    I: IntoIterator<Item = Option<f64>>,
{
    let mut sum = 0.0;
    let mut count = 0usize;
    for v in scores.into_iter().flatten() {
        sum += v;
        count += 1;
    }
    if count == 0 {
        None
    } else {
        Some(sum / count as f64)
    }
}

/// Round 2 minus round 1; undefined unless both are entered.
pub fn development_score(round1: Option<f64>, round2: Option<f64>) -> Option<f64> {
    Some(round2? - round1?)
}

pub fn format_score(v: Option<f64>) -> String {
    match v {
        Some(v) => format!("{:.2}", v),
        None => "-".to_string(),
    }
}

pub fn format_development(v: Option<f64>) -> String {
    match v {
        Some(v) if v > 0.0 => format!("+{:.2}", v),
        Some(v) => format!("{:.2}", v),
        None => "-".to_string(),
    }
}
