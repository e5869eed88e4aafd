//! Score aggregation: per-attempt grade and subject averages plus the derived
//! overall pseudo-attempt. Pure functions of the score store.

use crate::catalog::{
    self, GRADES, GRADE_COMPARISON_CHART, OVERALL_ATTEMPT, PRE_TEST_OVERALL_SCORE_KEY,
    REGULAR_ATTEMPTS,
};
use crate::scores::ScoreStore;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

/// Two-decimal rounding used for every published average.
pub fn round_2(x: f64) -> f64 {
    (x * 100.0).round() / 100.0
}

/// Mean rounded to two decimals; empty input averages to 0.
pub fn average(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    round_2(values.iter().sum::<f64>() / values.len() as f64)
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChartPoint {
    pub name: String,
    pub average_score: f64,
}

impl ChartPoint {
    fn new(name: &str, average_score: f64) -> Self {
        Self {
            name: name.to_string(),
            average_score,
        }
    }
}

pub type ChartSeries = Vec<ChartPoint>;

/// Six series keyed by chart id: `gradeComparison` plus one per grade.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AttemptView {
    pub charts: BTreeMap<String, ChartSeries>,
}

impl AttemptView {
    pub fn series(&self, chart_id: &str) -> &[ChartPoint] {
        self.charts
            .get(chart_id)
            .map(|s| s.as_slice())
            .unwrap_or(&[])
    }

    pub fn value(&self, chart_id: &str, name: &str) -> Option<f64> {
        self.series(chart_id)
            .iter()
            .find(|p| p.name == name)
            .map(|p| p.average_score)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Dataset {
    pub attempts: BTreeMap<String, AttemptView>,
}

impl Dataset {
    pub fn attempt(&self, attempt: &str) -> Option<&AttemptView> {
        self.attempts.get(attempt)
    }

    pub fn overall(&self) -> Option<&AttemptView> {
        self.attempt(OVERALL_ATTEMPT)
    }
}

type RawScores = HashMap<String, HashMap<String, HashMap<String, Vec<f64>>>>;

/// attempt -> grade -> subject -> every non-null score.
fn collect_raw(store: &ScoreStore) -> RawScores {
    let mut raw: RawScores = HashMap::new();
    for (attempt, grades) in store.attempts() {
        let by_grade = raw.entry(attempt.to_string()).or_default();
        for (grade, students) in grades {
            let by_subject = by_grade.entry(grade.clone()).or_default();
            for subjects in students.values() {
                for (subject, score) in subjects {
                    if let Some(v) = score {
                        by_subject.entry(subject.clone()).or_default().push(*v);
                    }
                }
            }
        }
    }
    raw
}

pub fn compute_dataset(store: &ScoreStore) -> Dataset {
    let raw = collect_raw(store);
    let empty = HashMap::new();
    let mut attempts = BTreeMap::new();

    for attempt in catalog::all_attempts() {
        let attempt_raw = raw.get(attempt).unwrap_or(&empty);
        let view = compute_attempt_view(attempt_raw, catalog::is_pre_test_attempt(attempt));
        attempts.insert(attempt.to_string(), view);
    }

    let overall = compute_overall(&attempts);
    attempts.insert(OVERALL_ATTEMPT.to_string(), overall);
    Dataset { attempts }
}

fn compute_attempt_view(
    attempt_raw: &HashMap<String, HashMap<String, Vec<f64>>>,
    is_pre_test: bool,
) -> AttemptView {
    let no_scores = HashMap::new();
    let mut charts = BTreeMap::new();
    let mut comparison = Vec::with_capacity(GRADES.len());

    for config in GRADES.iter() {
        let grade_raw = attempt_raw.get(config.grade).unwrap_or(&no_scores);
        let subject_value = |subject: &str| {
            grade_raw
                .get(subject)
                .map(|v| average(v))
                .unwrap_or(0.0)
        };

        let (series, grade_average) = if is_pre_test {
            // One synthetic series replicated under every subject label.
            let avg = subject_value(PRE_TEST_OVERALL_SCORE_KEY);
            let series: ChartSeries = config
                .subjects
                .iter()
                .map(|s| ChartPoint::new(s, avg))
                .collect();
            (series, avg)
        } else {
            let series: ChartSeries = config
                .subjects
                .iter()
                .map(|s| ChartPoint::new(s, subject_value(s)))
                .collect();
            let positive: Vec<f64> = series
                .iter()
                .map(|p| p.average_score)
                .filter(|v| *v > 0.0)
                .collect();
            (series, average(&positive))
        };

        comparison.push(ChartPoint::new(config.grade, grade_average));
        charts.insert(config.chart_id.to_string(), series);
    }

    charts.insert(GRADE_COMPARISON_CHART.to_string(), comparison);
    AttemptView { charts }
}

#[derive(Debug, Clone, Copy, Default)]
struct Total {
    sum: f64,
    count: usize,
}

/// Mean of strictly positive per-attempt values across the regular attempts only.
fn compute_overall(attempts: &BTreeMap<String, AttemptView>) -> AttemptView {
    let mut totals: HashMap<&str, HashMap<String, Total>> = HashMap::new();

    for attempt in REGULAR_ATTEMPTS.iter() {
        let Some(view) = attempts.get(*attempt) else {
            continue;
        };
        for (chart_id, series) in &view.charts {
            let chart_totals = totals.entry(chart_id.as_str()).or_default();
            for point in series.iter().filter(|p| p.average_score > 0.0) {
                let t = chart_totals.entry(point.name.clone()).or_default();
                t.sum += point.average_score;
                t.count += 1;
            }
        }
    }

    let finish = |chart_id: &str, names: &[&str]| -> ChartSeries {
        names
            .iter()
            .map(|name| {
                let avg = totals
                    .get(chart_id)
                    .and_then(|t| t.get(*name))
                    .filter(|t| t.count > 0)
                    .map(|t| round_2(t.sum / t.count as f64))
                    .unwrap_or(0.0);
                ChartPoint::new(name, avg)
            })
            .collect()
    };

    let mut charts = BTreeMap::new();
    let grade_names: Vec<&str> = GRADES.iter().map(|g| g.grade).collect();
    charts.insert(
        GRADE_COMPARISON_CHART.to_string(),
        finish(GRADE_COMPARISON_CHART, &grade_names),
    );
    for config in GRADES.iter() {
        charts.insert(
            config.chart_id.to_string(),
            finish(config.chart_id, config.subjects),
        );
    }
    AttemptView { charts }
}

/// Recomputes only when the score store revision changes.
#[derive(Debug, Default)]
pub struct DatasetCache {
    revision: Option<u64>,
    dataset: Option<Arc<Dataset>>,
}

impl DatasetCache {
    pub fn get(&mut self, store: &ScoreStore) -> Arc<Dataset> {
        if let (Some(rev), Some(ds)) = (self.revision, self.dataset.as_ref()) {
            if rev == store.revision() {
                return Arc::clone(ds);
            }
        }
        let ds = Arc::new(compute_dataset(store));
        tracing::debug!(revision = store.revision(), "dataset recomputed");
        self.revision = Some(store.revision());
        self.dataset = Some(Arc::clone(&ds));
        ds
    }
}

/// Dashboard filter; never empty.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct AttemptSelection(Vec<String>);

impl Default for AttemptSelection {
    fn default() -> Self {
        AttemptSelection(vec![OVERALL_ATTEMPT.to_string()])
    }
}

impl AttemptSelection {
    pub fn attempts(&self) -> &[String] {
        &self.0
    }

    /// Adds the attempt, or removes it unless it is the last one selected.
    pub fn toggle(&mut self, attempt: &str) {
        if let Some(pos) = self.0.iter().position(|a| a == attempt) {
            if self.0.len() > 1 {
                self.0.remove(pos);
            }
        } else {
            self.0.push(attempt.to_string());
        }
    }
}

/// chart id -> attempt -> series, for the attempts present in the dataset.
pub fn chart_selection(
    dataset: &Dataset,
    attempts: &[String],
) -> BTreeMap<String, BTreeMap<String, ChartSeries>> {
    let mut out = BTreeMap::new();
    for chart in catalog::CHARTS.iter() {
        let per_attempt: BTreeMap<String, ChartSeries> = attempts
            .iter()
            .filter_map(|attempt| {
                dataset
                    .attempt(attempt)
                    .map(|view| (attempt.clone(), view.series(chart.id).to_vec()))
            })
            .collect();
        out.insert(chart.id.to_string(), per_attempt);
    }
    out
}
