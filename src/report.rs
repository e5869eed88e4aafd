//! Read-only report page model built from a dataset.

use crate::calc::{AttemptView, ChartSeries, Dataset};
use crate::catalog::{self, CHARTS, GRADES, PRE_TEST_GROUPS, REGULAR_ATTEMPTS};
use serde::Serialize;

pub const NOT_APPLICABLE: &str = "N/A";
pub const NO_SCORE: &str = "-";

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportRow {
    pub grade: String,
    pub subject: String,
    /// One entry per column of `ReportTable::columns`, same order.
    pub cells: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ColumnGroup {
    pub name: String,
    pub span: usize,
    pub pre_test: bool,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportTable {
    pub columns: Vec<String>,
    pub column_groups: Vec<ColumnGroup>,
    pub rows: Vec<ReportRow>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PreTestComparison {
    pub name: String,
    pub label: String,
    pub round1: f64,
    pub round2: f64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OverallChart {
    pub id: String,
    pub title: String,
    pub series: ChartSeries,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportModel {
    pub academic_year: String,
    pub table: ReportTable,
    pub overall_charts: Vec<OverallChart>,
    pub pre_test_comparison: Vec<PreTestComparison>,
}

pub fn format_cell(v: Option<f64>) -> String {
    match v {
        Some(v) if v > 0.0 => format!("{:.2}", v),
        _ => NO_SCORE.to_string(),
    }
}

pub fn build_table(dataset: &Dataset) -> ReportTable {
    let columns: Vec<String> = catalog::all_attempts().map(str::to_string).collect();

    let mut column_groups: Vec<ColumnGroup> = REGULAR_ATTEMPTS
        .iter()
        .map(|a| ColumnGroup {
            name: a.to_string(),
            span: 1,
            pre_test: false,
        })
        .collect();
    column_groups.extend(PRE_TEST_GROUPS.iter().map(|g| ColumnGroup {
        name: g.group_name.to_string(),
        span: g.attempts.len(),
        pre_test: true,
    }));

    let mut rows = Vec::new();
    for config in GRADES.iter() {
        for subject in config.subjects {
            let cells = columns
                .iter()
                .map(|attempt| match catalog::pre_test_group_for_attempt(attempt) {
                    Some(group) if group.grade != config.grade => NOT_APPLICABLE.to_string(),
                    _ => format_cell(
                        dataset
                            .attempt(attempt)
                            .and_then(|v| v.value(config.chart_id, subject)),
                    ),
                })
                .collect();
            rows.push(ReportRow {
                grade: config.grade.to_string(),
                subject: subject.to_string(),
                cells,
            });
        }
    }

    ReportTable {
        columns,
        column_groups,
        rows,
    }
}

fn first_point(view: Option<&AttemptView>, chart_id: &str) -> f64 {
    view.and_then(|v| v.series(chart_id).first())
        .map(|p| p.average_score)
        .unwrap_or(0.0)
}

pub fn pre_test_comparison(dataset: &Dataset) -> Vec<PreTestComparison> {
    PRE_TEST_GROUPS
        .iter()
        .map(|group| {
            let Some(config) = catalog::grade_config(group.grade) else {
                return PreTestComparison {
                    name: group.group_name.to_string(),
                    label: group.label(),
                    round1: 0.0,
                    round2: 0.0,
                };
            };
            let [first, second] = group.attempts;
            PreTestComparison {
                name: group.group_name.to_string(),
                label: group.label(),
                round1: first_point(dataset.attempt(first), config.chart_id),
                round2: first_point(dataset.attempt(second), config.chart_id),
            }
        })
        .collect()
}

pub fn overall_charts(dataset: &Dataset) -> Vec<OverallChart> {
    let overall = dataset.overall();
    CHARTS
        .iter()
        .map(|chart| OverallChart {
            id: chart.id.to_string(),
            title: chart.title.to_string(),
            series: overall
                .map(|v| v.series(chart.id).to_vec())
                .unwrap_or_default(),
        })
        .collect()
}

pub fn build_model(dataset: &Dataset) -> ReportModel {
    ReportModel {
        academic_year: catalog::ACADEMIC_YEAR.to_string(),
        table: build_table(dataset),
        overall_charts: overall_charts(dataset),
        pre_test_comparison: pre_test_comparison(dataset),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calc::compute_dataset;
    use crate::catalog::PRE_TEST_OVERALL_SCORE_KEY;
    use crate::scores::{GradeScores, ScorePatch, ScoreStore, SubjectScores};
    use std::collections::BTreeMap;

    fn store(cells: &[(&str, &str, &str, f64)]) -> ScoreStore {
        let mut patch = ScorePatch::new();
        for (i, (attempt, grade, subject, v)) in cells.iter().enumerate() {
            patch
                .entry(attempt.to_string())
                .or_default()
                .entry(grade.to_string())
                .or_insert_with(GradeScores::new)
                .entry(format!("s{}", i))
                .or_insert_with(SubjectScores::new)
                .insert(subject.to_string(), Some(*v));
        }
        ScoreStore::default().merged(&patch)
    }

    fn row_by_attempt(table: &ReportTable, row: &ReportRow) -> BTreeMap<String, String> {
        table
            .columns
            .iter()
            .cloned()
            .zip(row.cells.iter().cloned())
            .collect()
    }

    #[test]
    fn table_marks_foreign_pre_tests_and_missing_scores() {
        let ds = compute_dataset(&store(&[
            ("ครั้งที่ 1", "ป.1", "การอ่านรู้เรื่อง", 72.0),
            ("Pre RT ป.1 (ครั้งที่ 1)", "ป.1", PRE_TEST_OVERALL_SCORE_KEY, 55.5),
        ]));
        let table = build_table(&ds);
        assert_eq!(table.columns.len(), 15);
        assert_eq!(table.rows.len(), 17);

        let p1 = row_by_attempt(&table, &table.rows[0]);
        assert_eq!(p1["ครั้งที่ 1"], "72.00");
        assert_eq!(p1["ครั้งที่ 2"], NO_SCORE);
        assert_eq!(p1["Pre RT ป.1 (ครั้งที่ 1)"], "55.50");
        assert_eq!(p1["Pre RT ป.1 (ครั้งที่ 2)"], NO_SCORE);
        assert_eq!(p1["Pre NT ป.3 (ครั้งที่ 1)"], NOT_APPLICABLE);

        let spans: usize = table.column_groups.iter().map(|g| g.span).sum();
        assert_eq!(spans, table.columns.len());
    }

    #[test]
    fn comparison_takes_first_subject_of_each_round() {
        let ds = compute_dataset(&store(&[
            ("Pre O-NET ม.3 (ครั้งที่ 1)", "ม.3", PRE_TEST_OVERALL_SCORE_KEY, 30.0),
            ("Pre O-NET ม.3 (ครั้งที่ 2)", "ม.3", PRE_TEST_OVERALL_SCORE_KEY, 44.0),
        ]));
        let cmp = pre_test_comparison(&ds);
        assert_eq!(cmp.len(), 5);
        let m3 = cmp.iter().find(|c| c.name == "Pre O-NET ม.3").expect("m3");
        assert_eq!((m3.round1, m3.round2), (30.0, 44.0));
        assert_eq!(m3.label, "Pre O-NET (ม.3)");
        assert_eq!(cmp[0].round1, 0.0);
    }

    #[test]
    fn overall_charts_follow_catalog_order() {
        let model = build_model(&compute_dataset(&ScoreStore::default()));
        let ids: Vec<&str> = model.overall_charts.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids[0], catalog::GRADE_COMPARISON_CHART);
        assert_eq!(ids.len(), 6);
        assert_eq!(model.overall_charts[0].series.len(), 5);
    }
}
