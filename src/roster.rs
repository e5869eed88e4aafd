use crate::catalog::{self, CLASSROOMS};
use crate::error::ErrorCode;
use chrono::{DateTime, Datelike, Local, Timelike};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentRecord {
    pub id: String,
    pub roll_number: String,
    pub name: String,
    pub grade: String,
    pub classroom: String,
}

impl StudentRecord {
    pub fn new(roll_number: &str, name: &str, grade: &str, classroom: &str) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            roll_number: roll_number.trim().to_string(),
            name: name.trim().to_string(),
            grade: grade.trim().to_string(),
            classroom: classroom.trim().to_string(),
        }
    }

    /// Name and grade are required; classroom may be blank.
    pub fn is_complete(&self) -> bool {
        !self.name.trim().is_empty() && !self.grade.trim().is_empty()
    }

    /// Roll number is deliberately not part of the key.
    pub fn dedup_key(&self) -> (String, String, String) {
        (
            self.name.trim().to_string(),
            self.grade.trim().to_string(),
            self.classroom.trim().to_string(),
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StudentField {
    RollNumber,
    Name,
    Grade,
    Classroom,
}

impl StudentField {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "rollNumber" | "no" => Some(Self::RollNumber),
            "name" => Some(Self::Name),
            "grade" => Some(Self::Grade),
            "classroom" => Some(Self::Classroom),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::RollNumber => "rollNumber",
            Self::Name => "name",
            Self::Grade => "grade",
            Self::Classroom => "classroom",
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum FieldError {
    #[error("unknown grade: {0}")]
    UnknownGrade(String),
    #[error("classroom must be one of: {}", CLASSROOMS.join(", "))]
    UnknownClassroom(String),
}

impl ErrorCode for FieldError {
    fn code(&self) -> &'static str {
        "bad_params"
    }
}

impl StudentRecord {
    /// Applies one field edit. The id is never touched.
    pub fn set_field(&mut self, field: StudentField, value: &str) -> Result<(), FieldError> {
        match field {
            StudentField::RollNumber => self.roll_number = value.to_string(),
            StudentField::Name => self.name = value.to_string(),
            StudentField::Grade => {
                if catalog::grade_config(value).is_none() {
                    return Err(FieldError::UnknownGrade(value.to_string()));
                }
                self.grade = value.to_string();
            }
            StudentField::Classroom => {
                if !catalog::is_classroom(value) {
                    return Err(FieldError::UnknownClassroom(value.to_string()));
                }
                self.classroom = value.to_string();
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GradeRoster {
    pub students: Vec<StudentRecord>,
    pub last_updated: Option<String>,
}

/// Grade -> roster. Updates return a new store that shares every untouched grade.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(transparent)]
pub struct RosterStore {
    grades: BTreeMap<String, Arc<GradeRoster>>,
}

impl RosterStore {
    pub fn grade(&self, grade: &str) -> Option<&GradeRoster> {
        self.grades.get(grade).map(|r| r.as_ref())
    }

    pub fn students(&self, grade: &str) -> &[StudentRecord] {
        self.grade(grade).map(|r| r.students.as_slice()).unwrap_or(&[])
    }

    pub fn student_count(&self) -> usize {
        self.grades.values().map(|r| r.students.len()).sum()
    }

    /// Appends imported students to their grades, creating missing grades.
    /// Students without a grade are dropped.
    pub fn with_import(&self, students: Vec<StudentRecord>, stamp: &str) -> RosterStore {
        let mut by_grade: BTreeMap<String, Vec<StudentRecord>> = BTreeMap::new();
        for student in students {
            if student.grade.is_empty() {
                continue;
            }
            by_grade.entry(student.grade.clone()).or_default().push(student);
        }

        let mut grades = self.grades.clone();
        for (grade, incoming) in by_grade {
            if catalog::grade_config(&grade).is_none() {
                tracing::warn!(
                    grade = %grade,
                    students = incoming.len(),
                    "imported students under a grade outside the catalog"
                );
            }
            let mut students = grades
                .get(&grade)
                .map(|r| r.students.clone())
                .unwrap_or_default();
            students.extend(incoming);
            grades.insert(
                grade,
                Arc::new(GradeRoster {
                    students,
                    last_updated: Some(stamp.to_string()),
                }),
            );
        }
        RosterStore { grades }
    }

    /// Grades holding students that no banner, sheet, or chart will show.
    pub fn uncatalogued_grades(&self) -> Vec<&str> {
        self.grades
            .keys()
            .filter(|g| catalog::grade_config(g).is_none())
            .map(String::as_str)
            .collect()
    }

    /// Replaces one grade's roster wholesale.
    pub fn with_replaced(
        &self,
        grade: &str,
        students: Vec<StudentRecord>,
        stamp: &str,
    ) -> RosterStore {
        let mut grades = self.grades.clone();
        grades.insert(
            grade.to_string(),
            Arc::new(GradeRoster {
                students,
                last_updated: Some(stamp.to_string()),
            }),
        );
        RosterStore { grades }
    }

    pub fn banners(&self) -> Vec<GradeBanner> {
        catalog::banner_order()
            .into_iter()
            .map(|config| {
                let students = self.students(config.grade);
                let last_updated = self.grade(config.grade).and_then(|r| r.last_updated.clone());
                let (status, classrooms) = if config.multi_class {
                    let rooms: Vec<ClassroomPresence> = CLASSROOMS
                        .iter()
                        .map(|room| ClassroomPresence {
                            classroom: room.to_string(),
                            has_students: students.iter().any(|s| s.classroom == *room),
                        })
                        .collect();
                    let present = rooms.iter().filter(|r| r.has_students).count();
                    let status = if present == rooms.len() {
                        BannerStatus::Complete
                    } else if present > 0 {
                        BannerStatus::Partial
                    } else {
                        BannerStatus::None
                    };
                    (status, rooms)
                } else if students.is_empty() {
                    (BannerStatus::None, Vec::new())
                } else {
                    (BannerStatus::Complete, Vec::new())
                };

                GradeBanner {
                    grade: config.grade.to_string(),
                    name: config.name.to_string(),
                    status,
                    classrooms,
                    student_count: students.len(),
                    last_updated_label: last_updated.as_deref().and_then(format_last_updated),
                    last_updated,
                }
            })
            .collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BannerStatus {
    None,
    Partial,
    Complete,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassroomPresence {
    pub classroom: String,
    pub has_students: bool,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GradeBanner {
    pub grade: String,
    pub name: String,
    pub status: BannerStatus,
    pub classrooms: Vec<ClassroomPresence>,
    pub student_count: usize,
    pub last_updated: Option<String>,
    pub last_updated_label: Option<String>,
}

pub fn now_stamp() -> String {
    chrono::Utc::now().to_rfc3339()
}

/// `DD/MM/YYYY เวลา HH.MM น.` in local time, Buddhist-era year.
pub fn format_last_updated(stamp: &str) -> Option<String> {
    let parsed = DateTime::parse_from_rfc3339(stamp).ok()?;
    let local = parsed.with_timezone(&Local);
    Some(format!(
        "{:02}/{:02}/{} เวลา {:02}.{:02} น.",
        local.day(),
        local.month(),
        local.year() + 543,
        local.hour(),
        local.minute()
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn student(name: &str, grade: &str, classroom: &str) -> StudentRecord {
        StudentRecord::new("1", name, grade, classroom)
    }

    #[test]
    fn import_appends_per_grade_and_keeps_other_grades_shared() {
        let base = RosterStore::default().with_import(
            vec![student("a", "ป.1", ""), student("b", "ม.3", "1")],
            "2025-06-01T00:00:00+00:00",
        );
        let next = base.with_import(
            vec![student("c", "ป.1", ""), student("d", "", "")],
            "2025-06-02T00:00:00+00:00",
        );

        assert_eq!(next.students("ป.1").len(), 2);
        assert_eq!(
            next.grade("ป.1").and_then(|r| r.last_updated.as_deref()),
            Some("2025-06-02T00:00:00+00:00")
        );
        assert!(Arc::ptr_eq(&base.grades["ม.3"], &next.grades["ม.3"]));
        assert_eq!(base.students("ป.1").len(), 1);
        assert_eq!(next.student_count(), 3);
    }

    #[test]
    fn grades_outside_catalog_are_kept_but_listed() {
        let roster = RosterStore::default().with_import(
            vec![student("a", "ป.2", ""), student("b", "ป.1", "")],
            "t",
        );
        assert_eq!(roster.students("ป.2").len(), 1);
        assert_eq!(roster.uncatalogued_grades(), vec!["ป.2"]);
        assert!(roster.banners().iter().all(|b| b.grade != "ป.2"));
    }

    #[test]
    fn replace_overwrites_whole_grade() {
        let base = RosterStore::default()
            .with_import(vec![student("a", "ป.6", ""), student("b", "ป.6", "")], "t1");
        let next = base.with_replaced("ป.6", vec![student("z", "ป.6", "")], "t2");
        assert_eq!(next.students("ป.6").len(), 1);
        assert_eq!(next.students("ป.6")[0].name, "z");
    }

    #[test]
    fn two_room_grade_is_partial_until_both_rooms_present() {
        let roster = RosterStore::default().with_import(vec![student("a", "ม.6", "1")], "t");
        let banners = roster.banners();
        let m6 = banners.iter().find(|b| b.grade == "ม.6").expect("m6 banner");
        assert_eq!(m6.status, BannerStatus::Partial);
        let p1 = banners.iter().find(|b| b.grade == "ป.1").expect("p1 banner");
        assert_eq!(p1.status, BannerStatus::None);

        let roster = roster.with_import(vec![student("b", "ม.6", "2")], "t");
        let banners = roster.banners();
        let m6 = banners.iter().find(|b| b.grade == "ม.6").expect("m6 banner");
        assert_eq!(m6.status, BannerStatus::Complete);
    }

    #[test]
    fn set_field_rejects_unknown_grade_and_room() {
        let mut s = student("a", "ป.1", "1");
        let id = s.id.clone();
        assert!(s.set_field(StudentField::Grade, "ป.2").is_err());
        assert!(s.set_field(StudentField::Classroom, "3").is_err());
        s.set_field(StudentField::Name, "b").expect("name edit");
        s.set_field(StudentField::Grade, "ม.3").expect("grade edit");
        assert_eq!(s.id, id);
        assert_eq!(s.grade, "ม.3");
    }

    #[test]
    fn last_updated_label_uses_buddhist_year() {
        let label = format_last_updated("2025-06-15T12:00:00+00:00").expect("label");
        assert!(label.contains("2568"));
        assert!(label.ends_with("น."));
    }
}
