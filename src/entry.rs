//! Score entry sheets: an editable copy of one grade's scores for one attempt (or a
//! pre-test pair). Edits stay on the sheet until saved as a merge patch.

use crate::catalog::{self, PreTestGroup, PRE_TEST_OVERALL_SCORE_KEY};
use crate::error::ErrorCode;
use crate::roster::{RosterStore, StudentRecord};
use crate::scores::{
    development_score, mean_of_entered, parse_score_input, GradeScores, PassStatus, ScorePatch,
    ScoreStore, SubjectScores,
};
use serde::Serialize;
use std::collections::BTreeMap;

#[derive(Debug, thiserror::Error)]
pub enum EntryError {
    #[error("{0} is not a regular exam attempt")]
    NotRegularAttempt(String),
    #[error("unknown pre-test group: {0}")]
    UnknownPreTestGroup(String),
    #[error("unknown grade: {0}")]
    UnknownGrade(String),
    #[error("classroom must be 1 or 2")]
    BadClassroom(String),
    #[error("no score sheet is open")]
    NoSheet,
    #[error("student not found in this grade")]
    StudentNotFound(String),
    #[error("subject {0} is not scored in this grade")]
    UnknownSubject(String),
    #[error("round must be 1 or 2")]
    BadRound,
    #[error("this operation needs a {0} score sheet")]
    WrongSheet(&'static str),
}

impl ErrorCode for EntryError {
    fn code(&self) -> &'static str {
        match self {
            EntryError::NoSheet => "no_entry_sheet",
            EntryError::StudentNotFound(_) => "not_found",
            EntryError::WrongSheet(_) => "wrong_entry_sheet",
            _ => "bad_params",
        }
    }

    fn details(&self) -> Option<serde_json::Value> {
        match self {
            EntryError::StudentNotFound(id) => Some(serde_json::json!({ "studentId": id })),
            EntryError::BadClassroom(c) => Some(serde_json::json!({ "classroom": c })),
            _ => None,
        }
    }
}

/// Outcome of one keystroke-level edit. A rejected edit leaves the sheet as it was.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CellEdit {
    pub applied: bool,
    pub value: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

fn apply_input(slot: &mut Option<f64>, raw: &str) -> CellEdit {
    match parse_score_input(raw) {
        Ok(v) => {
            *slot = v;
            CellEdit {
                applied: true,
                value: v,
                reason: None,
            }
        }
        Err(e) => CellEdit {
            applied: false,
            value: *slot,
            reason: Some(e.to_string()),
        },
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CellView {
    pub subject: String,
    pub score: Option<f64>,
    pub status: PassStatus,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SingleRow {
    pub student: StudentRecord,
    pub cells: Vec<CellView>,
    pub average: Option<f64>,
    pub status: PassStatus,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SheetSummary {
    pub subject_averages: BTreeMap<String, f64>,
    pub total_average: f64,
    pub status: PassStatus,
}

#[derive(Debug, Clone)]
pub struct SingleAttemptSheet {
    pub attempt: String,
    pub grade: String,
    pub classroom: Option<String>,
    pub subjects: Vec<String>,
    students: Vec<StudentRecord>,
    scores: GradeScores,
}

impl SingleAttemptSheet {
    pub fn open(
        store: &ScoreStore,
        roster: &RosterStore,
        attempt: &str,
        grade: &str,
        classroom: Option<&str>,
    ) -> Result<Self, EntryError> {
        if !catalog::is_regular_attempt(attempt) {
            return Err(EntryError::NotRegularAttempt(attempt.to_string()));
        }
        let config =
            catalog::grade_config(grade).ok_or_else(|| EntryError::UnknownGrade(grade.to_string()))?;
        let students = roster.students(grade).to_vec();
        let mut scores = store.grade(attempt, grade).cloned().unwrap_or_default();
        for student in &students {
            let cell = scores.entry(student.id.clone()).or_default();
            for subject in config.subjects {
                cell.entry(subject.to_string()).or_insert(None);
            }
        }

        let mut sheet = Self {
            attempt: attempt.to_string(),
            grade: grade.to_string(),
            classroom: None,
            subjects: config.subjects.iter().map(|s| s.to_string()).collect(),
            students,
            scores,
        };
        sheet.set_classroom(classroom)?;
        Ok(sheet)
    }

    pub fn set_classroom(&mut self, classroom: Option<&str>) -> Result<(), EntryError> {
        self.classroom = room_filter(&self.grade, classroom)?;
        Ok(())
    }

    pub fn visible_students(&self) -> Vec<&StudentRecord> {
        self.students
            .iter()
            .filter(|s| match self.classroom.as_deref() {
                Some(c) => s.classroom == c,
                None => true,
            })
            .collect()
    }

    pub fn student(&self, student_id: &str) -> Option<&StudentRecord> {
        self.students.iter().find(|s| s.id == student_id)
    }

    pub fn score(&self, student_id: &str, subject: &str) -> Option<f64> {
        self.scores
            .get(student_id)
            .and_then(|s| s.get(subject))
            .copied()
            .flatten()
    }

    pub fn student_scores(&self, student_id: &str) -> Vec<(String, Option<f64>)> {
        self.subjects
            .iter()
            .map(|s| (s.clone(), self.score(student_id, s)))
            .collect()
    }

    pub fn set_cell(
        &mut self,
        student_id: &str,
        subject: &str,
        raw: &str,
    ) -> Result<CellEdit, EntryError> {
        if self.student(student_id).is_none() {
            return Err(EntryError::StudentNotFound(student_id.to_string()));
        }
        if !self.subjects.iter().any(|s| s == subject) {
            return Err(EntryError::UnknownSubject(subject.to_string()));
        }
        let slot = self
            .scores
            .entry(student_id.to_string())
            .or_default()
            .entry(subject.to_string())
            .or_insert(None);
        Ok(apply_input(slot, raw))
    }

    pub fn rows(&self) -> Vec<SingleRow> {
        self.visible_students()
            .into_iter()
            .map(|student| {
                let cells: Vec<CellView> = self
                    .student_scores(&student.id)
                    .into_iter()
                    .map(|(subject, score)| CellView {
                        subject,
                        score,
                        status: PassStatus::of(score),
                    })
                    .collect();
                let average = self.row_average(&student.id);
                SingleRow {
                    student: student.clone(),
                    cells,
                    average,
                    status: PassStatus::of(average),
                }
            })
            .collect()
    }

    /// Mean of every entered cell the student has for this attempt.
    pub fn row_average(&self, student_id: &str) -> Option<f64> {
        self.scores
            .get(student_id)
            .and_then(|cells| mean_of_entered(cells.values().copied()))
    }

    /// Per-subject mean over visible students (0 when none), and the mean of the
    /// positive subject means.
    pub fn summary(&self) -> Option<SheetSummary> {
        let visible = self.visible_students();
        if visible.is_empty() {
            return None;
        }
        let mut subject_averages = BTreeMap::new();
        for subject in &self.subjects {
            let avg = mean_of_entered(visible.iter().map(|s| self.score(&s.id, subject)))
                .unwrap_or(0.0);
            subject_averages.insert(subject.clone(), avg);
        }
        let total_average = mean_of_entered(
            subject_averages
                .values()
                .filter(|v| **v > 0.0)
                .map(|v| Some(*v)),
        )
        .unwrap_or(0.0);
        Some(SheetSummary {
            subject_averages,
            total_average,
            status: PassStatus::of(Some(total_average)),
        })
    }

    pub fn to_patch(&self) -> ScorePatch {
        let mut grades = BTreeMap::new();
        grades.insert(self.grade.clone(), self.scores.clone());
        let mut patch = ScorePatch::new();
        patch.insert(self.attempt.clone(), grades);
        patch
    }
}

/// `None` or `"all"` shows every room; single-room grades ignore the filter.
fn room_filter(grade: &str, classroom: Option<&str>) -> Result<Option<String>, EntryError> {
    match classroom {
        None | Some("all") => Ok(None),
        Some(c) if catalog::is_classroom(c) => {
            let multi = catalog::grade_config(grade)
                .map(|g| g.multi_class)
                .unwrap_or(false);
            Ok(multi.then(|| c.to_string()))
        }
        Some(c) => Err(EntryError::BadClassroom(c.to_string())),
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RoundScores {
    pub round1: Option<f64>,
    pub round2: Option<f64>,
}

impl RoundScores {
    pub fn development(&self) -> Option<f64> {
        development_score(self.round1, self.round2)
    }

    pub fn average(&self) -> Option<f64> {
        mean_of_entered([self.round1, self.round2])
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PreTestRow {
    pub student: StudentRecord,
    pub round1: Option<f64>,
    pub round2: Option<f64>,
    pub development: Option<f64>,
    pub average: Option<f64>,
}

#[derive(Debug, Clone)]
pub struct PreTestSheet {
    pub group: &'static PreTestGroup,
    pub classroom: Option<String>,
    students: Vec<StudentRecord>,
    scores: BTreeMap<String, RoundScores>,
}

impl PreTestSheet {
    pub fn open(
        store: &ScoreStore,
        roster: &RosterStore,
        group_name: &str,
        classroom: Option<&str>,
    ) -> Result<Self, EntryError> {
        let group = catalog::pre_test_group(group_name)
            .ok_or_else(|| EntryError::UnknownPreTestGroup(group_name.to_string()))?;
        let students = roster.students(group.grade).to_vec();
        let [first, second] = group.attempts;
        let scores = students
            .iter()
            .map(|s| {
                let rounds = RoundScores {
                    round1: store.get(first, group.grade, &s.id, PRE_TEST_OVERALL_SCORE_KEY),
                    round2: store.get(second, group.grade, &s.id, PRE_TEST_OVERALL_SCORE_KEY),
                };
                (s.id.clone(), rounds)
            })
            .collect();
        let mut sheet = Self {
            group,
            classroom: None,
            students,
            scores,
        };
        sheet.set_classroom(classroom)?;
        Ok(sheet)
    }

    pub fn grade(&self) -> &'static str {
        self.group.grade
    }

    pub fn set_classroom(&mut self, classroom: Option<&str>) -> Result<(), EntryError> {
        self.classroom = room_filter(self.group.grade, classroom)?;
        Ok(())
    }

    pub fn visible_students(&self) -> Vec<&StudentRecord> {
        self.students
            .iter()
            .filter(|s| match self.classroom.as_deref() {
                Some(c) => s.classroom == c,
                None => true,
            })
            .collect()
    }

    pub fn student(&self, student_id: &str) -> Option<&StudentRecord> {
        self.students.iter().find(|s| s.id == student_id)
    }

    pub fn rounds(&self, student_id: &str) -> RoundScores {
        self.scores.get(student_id).copied().unwrap_or_default()
    }

    pub fn set_cell(
        &mut self,
        student_id: &str,
        round: u8,
        raw: &str,
    ) -> Result<CellEdit, EntryError> {
        if self.student(student_id).is_none() {
            return Err(EntryError::StudentNotFound(student_id.to_string()));
        }
        let rounds = self.scores.entry(student_id.to_string()).or_default();
        let slot = match round {
            1 => &mut rounds.round1,
            2 => &mut rounds.round2,
            _ => return Err(EntryError::BadRound),
        };
        Ok(apply_input(slot, raw))
    }

    pub fn rows(&self) -> Vec<PreTestRow> {
        self.visible_students()
            .into_iter()
            .map(|student| {
                let r = self.rounds(&student.id);
                PreTestRow {
                    student: student.clone(),
                    round1: r.round1,
                    round2: r.round2,
                    development: r.development(),
                    average: r.average(),
                }
            })
            .collect()
    }

    /// Both rounds for every student of the grade, under the synthetic subject.
    pub fn to_patch(&self) -> ScorePatch {
        let [first, second] = self.group.attempts;
        let mut round1 = GradeScores::new();
        let mut round2 = GradeScores::new();
        for (student_id, r) in &self.scores {
            let mut a = SubjectScores::new();
            a.insert(PRE_TEST_OVERALL_SCORE_KEY.to_string(), r.round1);
            round1.insert(student_id.clone(), a);
            let mut b = SubjectScores::new();
            b.insert(PRE_TEST_OVERALL_SCORE_KEY.to_string(), r.round2);
            round2.insert(student_id.clone(), b);
        }

        let mut patch = ScorePatch::new();
        patch.insert(
            first.to_string(),
            BTreeMap::from([(self.group.grade.to_string(), round1)]),
        );
        patch.insert(
            second.to_string(),
            BTreeMap::from([(self.group.grade.to_string(), round2)]),
        );
        patch
    }
}

#[derive(Debug, Clone)]
pub enum EntrySheet {
    SingleAttempt(SingleAttemptSheet),
    PreTest(PreTestSheet),
}

impl EntrySheet {
    pub fn set_classroom(&mut self, classroom: Option<&str>) -> Result<(), EntryError> {
        match self {
            EntrySheet::SingleAttempt(s) => s.set_classroom(classroom),
            EntrySheet::PreTest(s) => s.set_classroom(classroom),
        }
    }

    pub fn to_patch(&self) -> ScorePatch {
        match self {
            EntrySheet::SingleAttempt(s) => s.to_patch(),
            EntrySheet::PreTest(s) => s.to_patch(),
        }
    }

    pub fn view(&self) -> serde_json::Value {
        match self {
            EntrySheet::SingleAttempt(s) => serde_json::json!({
                "kind": "singleAttempt",
                "attempt": s.attempt,
                "grade": s.grade,
                "classroom": s.classroom,
                "subjects": s.subjects,
                "rows": s.rows(),
                "summary": s.summary(),
            }),
            EntrySheet::PreTest(s) => serde_json::json!({
                "kind": "preTest",
                "group": s.group.group_name,
                "grade": s.group.grade,
                "attempts": s.group.attempts,
                "classroom": s.classroom,
                "rows": s.rows(),
            }),
        }
    }
}
