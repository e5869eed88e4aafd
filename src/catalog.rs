//! Fixed school catalog: grades, subjects, exam attempts and chart series.
//!
//! Everything here is compile-time data. The shell reads it through `catalog.get`
//! instead of hard-coding its own copy.

use serde_json::json;

pub const OVERALL_ATTEMPT: &str = "ภาพรวม";
pub const PRE_TEST_OVERALL_SCORE_KEY: &str = "overall_score";
pub const GRADE_COMPARISON_CHART: &str = "gradeComparison";
pub const PASSING_SCORE: f64 = 50.0;
pub const CLASSROOMS: [&str; 2] = ["1", "2"];
pub const ACADEMIC_YEAR: &str = "2568";

#[derive(Debug, Clone, Copy)]
pub struct GradeConfig {
    pub grade: &'static str,
    pub name: &'static str,
    pub chart_id: &'static str,
    pub subjects: &'static [&'static str],
    pub multi_class: bool,
}

pub const GRADES: [GradeConfig; 5] = [
    GradeConfig {
        grade: "ป.1",
        name: "ประถมศึกษาปีที่ 1",
        chart_id: "p1Subjects",
        subjects: &["การอ่านรู้เรื่อง", "การอ่านออกเสียง"],
        multi_class: false,
    },
    GradeConfig {
        grade: "ป.3",
        name: "ประถมศึกษาปีที่ 3",
        chart_id: "p3Subjects",
        subjects: &["ความสามารถด้านภาษาไทย", "ความสามารถด้านคำนวณ"],
        multi_class: false,
    },
    GradeConfig {
        grade: "ป.6",
        name: "ประถมศึกษาปีที่ 6",
        chart_id: "p6Subjects",
        subjects: &["ภาษาไทย", "คณิตศาสตร์", "วิทยาศาสตร์", "ภาษาอังกฤษ"],
        multi_class: false,
    },
    GradeConfig {
        grade: "ม.3",
        name: "มัธยมศึกษาปีที่ 3",
        chart_id: "m3Subjects",
        subjects: &["ภาษาไทย", "คณิตศาสตร์", "วิทยาศาสตร์", "ภาษาอังกฤษ"],
        multi_class: true,
    },
    GradeConfig {
        grade: "ม.6",
        name: "มัธยมศึกษาปีที่ 6",
        chart_id: "m6Subjects",
        subjects: &[
            "ภาษาไทย",
            "คณิตศาสตร์",
            "วิทยาศาสตร์",
            "สังคมศึกษา",
            "ภาษาอังกฤษ",
        ],
        multi_class: true,
    },
];

pub const REGULAR_ATTEMPTS: [&str; 5] = [
    "ครั้งที่ 1",
    "ครั้งที่ 2",
    "ครั้งที่ 3",
    "ครั้งที่ 4",
    "ครั้งที่ 5",
];

#[derive(Debug, Clone, Copy)]
pub struct PreTestGroup {
    pub group_name: &'static str,
    pub grade: &'static str,
    pub attempts: [&'static str; 2],
}

impl PreTestGroup {
    /// Menu label, e.g. `Pre RT (ป.1)`.
    pub fn label(&self) -> String {
        match self.group_name.strip_suffix(self.grade) {
            Some(prefix) => format!("{}({})", prefix, self.grade),
            None => self.group_name.to_string(),
        }
    }
}

pub const PRE_TEST_GROUPS: [PreTestGroup; 5] = [
    PreTestGroup {
        group_name: "Pre RT ป.1",
        grade: "ป.1",
        attempts: ["Pre RT ป.1 (ครั้งที่ 1)", "Pre RT ป.1 (ครั้งที่ 2)"],
    },
    PreTestGroup {
        group_name: "Pre NT ป.3",
        grade: "ป.3",
        attempts: ["Pre NT ป.3 (ครั้งที่ 1)", "Pre NT ป.3 (ครั้งที่ 2)"],
    },
    PreTestGroup {
        group_name: "Pre O-NET ป.6",
        grade: "ป.6",
        attempts: ["Pre O-NET ป.6 (ครั้งที่ 1)", "Pre O-NET ป.6 (ครั้งที่ 2)"],
    },
    PreTestGroup {
        group_name: "Pre O-NET ม.3",
        grade: "ม.3",
        attempts: ["Pre O-NET ม.3 (ครั้งที่ 1)", "Pre O-NET ม.3 (ครั้งที่ 2)"],
    },
    PreTestGroup {
        group_name: "Pre O-NET ม.6",
        grade: "ม.6",
        attempts: ["Pre O-NET ม.6 (ครั้งที่ 1)", "Pre O-NET ม.6 (ครั้งที่ 2)"],
    },
];

#[derive(Debug, Clone, Copy)]
pub struct ChartConfig {
    pub id: &'static str,
    pub title: &'static str,
}

pub const CHARTS: [ChartConfig; 6] = [
    ChartConfig {
        id: GRADE_COMPARISON_CHART,
        title: "ผลคะแนนรวมเปรียบเทียบระดับชั้น",
    },
    ChartConfig {
        id: "p1Subjects",
        title: "ผลคะแนนรายวิชา ระดับชั้น ป.1 (RT)",
    },
    ChartConfig {
        id: "p3Subjects",
        title: "ผลคะแนนรายวิชา ระดับชั้น ป.3 (NT)",
    },
    ChartConfig {
        id: "p6Subjects",
        title: "ผลคะแนนรายวิชา ระดับชั้น ป.6",
    },
    ChartConfig {
        id: "m3Subjects",
        title: "ผลคะแนนรายวิชา ระดับชั้น ม.3",
    },
    ChartConfig {
        id: "m6Subjects",
        title: "ผลคะแนนรายวิชา ระดับชั้น ม.6",
    },
];

pub fn grade_config(grade: &str) -> Option<&'static GradeConfig> {
    GRADES.iter().find(|g| g.grade == grade)
}

pub fn chart_config(chart_id: &str) -> Option<&'static ChartConfig> {
    CHARTS.iter().find(|c| c.id == chart_id)
}

pub fn pre_test_group(group_name: &str) -> Option<&'static PreTestGroup> {
    PRE_TEST_GROUPS.iter().find(|g| g.group_name == group_name)
}

pub fn pre_test_group_for_attempt(attempt: &str) -> Option<&'static PreTestGroup> {
    PRE_TEST_GROUPS
        .iter()
        .find(|g| g.attempts.contains(&attempt))
}

pub fn is_pre_test_attempt(attempt: &str) -> bool {
    pre_test_group_for_attempt(attempt).is_some()
}

pub fn is_regular_attempt(attempt: &str) -> bool {
    REGULAR_ATTEMPTS.contains(&attempt)
}

pub fn is_classroom(value: &str) -> bool {
    CLASSROOMS.contains(&value)
}

/// Regular attempts first, then every pre-test round in group order.
pub fn all_attempts() -> impl Iterator<Item = &'static str> {
    REGULAR_ATTEMPTS
        .iter()
        .copied()
        .chain(PRE_TEST_GROUPS.iter().flat_map(|g| g.attempts.iter().copied()))
}

/// Grades offered for score entry under an attempt.
pub fn attempt_grades(attempt: &str) -> Vec<&'static str> {
    if is_regular_attempt(attempt) {
        return GRADES.iter().map(|g| g.grade).collect();
    }
    match pre_test_group_for_attempt(attempt) {
        Some(group) => vec![group.grade],
        None => Vec::new(),
    }
}

/// Banner order: primary (ป) before secondary (ม), then by year number.
pub fn banner_order() -> Vec<&'static GradeConfig> {
    let mut grades: Vec<&'static GradeConfig> = GRADES.iter().collect();
    grades.sort_by_key(|g| grade_sort_key(g.grade));
    grades
}

fn grade_sort_key(grade: &str) -> (u8, u32) {
    let (level, num) = grade.split_once('.').unwrap_or((grade, ""));
    let level_rank = match level {
        "ป" => 1,
        "ม" => 2,
        _ => 3,
    };
    (level_rank, num.parse().unwrap_or(u32::MAX))
}

pub fn catalog_json() -> serde_json::Value {
    let grades: Vec<serde_json::Value> = GRADES
        .iter()
        .map(|g| {
            json!({
                "grade": g.grade,
                "name": g.name,
                "chartId": g.chart_id,
                "subjects": g.subjects,
                "classrooms": if g.multi_class { CLASSROOMS.to_vec() } else { Vec::new() },
            })
        })
        .collect();
    let pre_tests: Vec<serde_json::Value> = PRE_TEST_GROUPS
        .iter()
        .map(|g| {
            json!({
                "groupName": g.group_name,
                "label": g.label(),
                "grade": g.grade,
                "attempts": g.attempts,
            })
        })
        .collect();
    let charts: Vec<serde_json::Value> = CHARTS
        .iter()
        .map(|c| json!({ "id": c.id, "title": c.title, "dataKey": "averageScore" }))
        .collect();
    let attempt_grades: serde_json::Map<String, serde_json::Value> = all_attempts()
        .map(|a| (a.to_string(), json!(attempt_grades(a))))
        .collect();

    json!({
        "grades": grades,
        "attemptGrades": attempt_grades,
        "regularAttempts": REGULAR_ATTEMPTS,
        "preTestGroups": pre_tests,
        "overallAttempt": OVERALL_ATTEMPT,
        "filterOptions": std::iter::once(OVERALL_ATTEMPT)
            .chain(REGULAR_ATTEMPTS.iter().copied())
            .collect::<Vec<_>>(),
        "charts": charts,
        "classrooms": CLASSROOMS,
        "passingScore": PASSING_SCORE,
        "preTestScoreKey": PRE_TEST_OVERALL_SCORE_KEY,
        "academicYear": ACADEMIC_YEAR,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pre_test_label_wraps_grade_in_parens() {
        assert_eq!(PRE_TEST_GROUPS[0].label(), "Pre RT (ป.1)");
        assert_eq!(PRE_TEST_GROUPS[4].label(), "Pre O-NET (ม.6)");
    }

    #[test]
    fn attempt_classification() {
        assert!(is_regular_attempt("ครั้งที่ 3"));
        assert!(!is_pre_test_attempt("ครั้งที่ 3"));
        assert!(is_pre_test_attempt("Pre NT ป.3 (ครั้งที่ 2)"));
        assert!(!is_regular_attempt(OVERALL_ATTEMPT));
        assert_eq!(all_attempts().count(), 15);
        assert_eq!(attempt_grades("Pre O-NET ม.3 (ครั้งที่ 1)"), vec!["ม.3"]);
        assert_eq!(attempt_grades("ครั้งที่ 1").len(), 5);
    }

    #[test]
    fn banner_order_puts_primary_first() {
        let order: Vec<&str> = banner_order().iter().map(|g| g.grade).collect();
        assert_eq!(order, vec!["ป.1", "ป.3", "ป.6", "ม.3", "ม.6"]);
    }
}
