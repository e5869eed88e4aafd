//! Sequential review of uploaded (or existing) student lists before they are committed.
//!
//! `Idle -> Reviewing(i of N) -> ... -> Idle`, with cancel returning to `Idle` from any
//! point. Each confirm commits exactly one queue item.

use crate::error::ErrorCode;
use crate::roster::{FieldError, RosterStore, StudentField, StudentRecord};
use crate::upload::ParsedFile;
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "grade", rename_all = "camelCase")]
pub enum ReviewMode {
    Import,
    EditGrade(String),
}

#[derive(Debug, Clone)]
pub struct ReviewItem {
    pub file_name: String,
    pub students: Vec<StudentRecord>,
}

#[derive(Debug, Clone)]
pub struct ActiveReview {
    mode: ReviewMode,
    queue: Vec<ReviewItem>,
    index: usize,
    draft: Vec<StudentRecord>,
}

#[derive(Debug, Clone, Default)]
pub enum ReviewSession {
    #[default]
    Idle,
    Reviewing(ActiveReview),
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewView {
    pub mode: ReviewMode,
    pub current: usize,
    pub total: usize,
    pub file_name: String,
    pub confirm_label: &'static str,
    pub students: Vec<StudentRecord>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "camelCase")]
pub enum ReviewProgress {
    Advanced { current: usize, total: usize },
    Finished { message: String },
}

#[derive(Debug, thiserror::Error)]
pub enum ReviewError {
    #[error("ไม่พบข้อมูลนักเรียนในไฟล์ที่เลือก หรือไฟล์อาจจะว่างเปล่า")]
    EmptyQueue,
    #[error("no student data for grade {0}")]
    NoStudents(String),
    #[error("no review in progress")]
    NotReviewing,
    #[error("student not found in the current file")]
    StudentNotFound(String),
    #[error(transparent)]
    Field(#[from] FieldError),
}

impl ErrorCode for ReviewError {
    fn code(&self) -> &'static str {
        match self {
            ReviewError::EmptyQueue => "empty_upload",
            ReviewError::NoStudents(_) => "no_students",
            ReviewError::NotReviewing => "not_reviewing",
            ReviewError::StudentNotFound(_) => "not_found",
            ReviewError::Field(e) => e.code(),
        }
    }

    fn details(&self) -> Option<serde_json::Value> {
        match self {
            ReviewError::StudentNotFound(id) => Some(serde_json::json!({ "studentId": id })),
            _ => None,
        }
    }
}

impl ReviewSession {
    pub fn start_import(files: Vec<ParsedFile>) -> Result<Self, ReviewError> {
        if files.iter().all(|f| f.students.is_empty()) {
            return Err(ReviewError::EmptyQueue);
        }
        let queue: Vec<ReviewItem> = files
            .into_iter()
            .map(|f| ReviewItem {
                file_name: f.file_name,
                students: f.students,
            })
            .collect();
        Ok(Self::begin(ReviewMode::Import, queue))
    }

    pub fn start_edit(roster: &RosterStore, grade: &str) -> Result<Self, ReviewError> {
        let students = roster.students(grade);
        if students.is_empty() {
            return Err(ReviewError::NoStudents(grade.to_string()));
        }
        let queue = vec![ReviewItem {
            file_name: format!("นักเรียนชั้น {}", grade),
            students: students.to_vec(),
        }];
        Ok(Self::begin(ReviewMode::EditGrade(grade.to_string()), queue))
    }

    fn begin(mode: ReviewMode, queue: Vec<ReviewItem>) -> Self {
        let draft = queue[0].students.clone();
        ReviewSession::Reviewing(ActiveReview {
            mode,
            queue,
            index: 0,
            draft,
        })
    }

    pub fn is_active(&self) -> bool {
        matches!(self, ReviewSession::Reviewing(_))
    }

    pub fn view(&self) -> Option<ReviewView> {
        let ReviewSession::Reviewing(active) = self else {
            return None;
        };
        let total = active.queue.len();
        let current = active.index + 1;
        let confirm_label = if current < total {
            "ยืนยันและไฟล์ถัดไป"
        } else if matches!(active.mode, ReviewMode::EditGrade(_)) {
            "ยืนยันการแก้ไข"
        } else {
            "ยืนยันและนำเข้าข้อมูล"
        };
        Some(ReviewView {
            mode: active.mode.clone(),
            current,
            total,
            file_name: active.queue[active.index].file_name.clone(),
            confirm_label,
            students: active.draft.clone(),
        })
    }

    /// Edits the pending copy only; the roster store is untouched until confirm.
    pub fn update_student(
        &mut self,
        student_id: &str,
        field: StudentField,
        value: &str,
    ) -> Result<(), ReviewError> {
        let ReviewSession::Reviewing(active) = self else {
            return Err(ReviewError::NotReviewing);
        };
        let student = active
            .draft
            .iter_mut()
            .find(|s| s.id == student_id)
            .ok_or_else(|| ReviewError::StudentNotFound(student_id.to_string()))?;
        student.set_field(field, value)?;
        Ok(())
    }

    /// Commits the current item and advances. Returns the roster to install.
    pub fn confirm(
        &mut self,
        roster: &RosterStore,
        stamp: &str,
    ) -> Result<(RosterStore, ReviewProgress), ReviewError> {
        let ReviewSession::Reviewing(active) = self else {
            return Err(ReviewError::NotReviewing);
        };

        let committed = std::mem::take(&mut active.draft);
        let committed_len = committed.len();
        let next_roster = match &active.mode {
            ReviewMode::EditGrade(grade) => roster.with_replaced(grade, committed, stamp),
            ReviewMode::Import => roster.with_import(committed, stamp),
        };
        tracing::info!(
            file = %active.queue[active.index].file_name,
            students = committed_len,
            "review item committed"
        );

        let next_index = active.index + 1;
        if next_index < active.queue.len() {
            active.index = next_index;
            active.draft = active.queue[next_index].students.clone();
            let progress = ReviewProgress::Advanced {
                current: next_index + 1,
                total: active.queue.len(),
            };
            return Ok((next_roster, progress));
        }

        let message = match &active.mode {
            ReviewMode::EditGrade(grade) => format!("ข้อมูลระดับชั้น {} ได้รับการอัปเดตแล้ว", grade),
            ReviewMode::Import => {
                let total: usize = active.queue.iter().map(|i| i.students.len()).sum();
                format!(
                    "นำเข้าข้อมูลนักเรียน {} คน จาก {} ไฟล์สำเร็จ",
                    total,
                    active.queue.len()
                )
            }
        };
        *self = ReviewSession::Idle;
        Ok((next_roster, ReviewProgress::Finished { message }))
    }

    /// Drops the queue and every pending edit.
    pub fn cancel(&mut self) -> bool {
        let was_active = self.is_active();
        *self = ReviewSession::Idle;
        was_active
    }
}
