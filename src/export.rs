//! Exports: the upload template and the score-sheet reports.
//!
//! Reports read the open entry sheet as displayed, unsaved edits included, and are
//! written either as a workbook or as a PDF built from the same rows.

use crate::catalog::{ACADEMIC_YEAR, CLASSROOMS, GRADES};
use crate::entry::{PreTestSheet, SingleAttemptSheet};
use crate::pdf::{self, Orientation, PdfFont, Section};
use crate::roster::StudentRecord;
use crate::scores::{format_development, format_score, mean_of_entered, PassStatus};
use anyhow::Context;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use umya_spreadsheet::structs::{DataValidation, DataValidationValues, DataValidations};
use umya_spreadsheet::{Spreadsheet, Worksheet};

pub const TEMPLATE_FILE_NAME: &str = "student-list-template.xlsx";
pub const TEMPLATE_SHEET: &str = "รายชื่อนักเรียน";
pub const TEMPLATE_HEADERS: [&str; 4] = ["เลขที่", "คำนำหน้าชื่อ ชื่อ - สกุล", "ระดับชั้น", "ห้องเรียน"];
const TEMPLATE_WIDTHS: [(&str, f64); 4] = [("A", 10.0), ("B", 40.0), ("C", 15.0), ("D", 15.0)];

pub const SUMMARY_SHEET: &str = "สรุปผลคะแนน";
pub const STUDENT_SHEET: &str = "ผลคะแนน";
const SCHOOL_NAME: &str = "โรงเรียนวัดคิรีวิหาร(สมเด็จพระวันรัต อุปถัมภ์)";
const SHEET_NAME_MAX_CHARS: usize = 31;

/// Output format of a report export.
#[derive(Debug, Clone)]
pub enum Format {
    Xlsx,
    Pdf(PdfFont),
}

impl Format {
    fn extension(&self) -> &'static str {
        match self {
            Format::Xlsx => "xlsx",
            Format::Pdf(_) => "pdf",
        }
    }
}

/// One spreadsheet cell: text, a number, or blank.
#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Text(String),
    Number(f64),
    Blank,
}

impl From<&str> for Cell {
    fn from(v: &str) -> Self {
        Cell::Text(v.to_string())
    }
}

impl From<String> for Cell {
    fn from(v: String) -> Self {
        Cell::Text(v)
    }
}

impl From<Option<f64>> for Cell {
    fn from(v: Option<f64>) -> Self {
        match v {
            Some(n) => Cell::Number(n),
            None => Cell::Blank,
        }
    }
}

fn write_rows(sheet: &mut Worksheet, rows: &[Vec<Cell>]) {
    for (r, row) in rows.iter().enumerate() {
        for (c, value) in row.iter().enumerate() {
            let coord = ((c as u32) + 1, (r as u32) + 1);
            match value {
                Cell::Text(t) => {
                    sheet.get_cell_mut(coord).set_value_string(t.as_str());
                }
                Cell::Number(n) => {
                    sheet.get_cell_mut(coord).set_value_number(*n);
                }
                Cell::Blank => {}
            }
        }
    }
}

fn bold_row(sheet: &mut Worksheet, row: u32, columns: usize) {
    for c in 0..columns {
        sheet
            .get_cell_mut(((c as u32) + 1, row))
            .get_style_mut()
            .get_font_mut()
            .set_bold(true);
    }
}

/// Builds a workbook whose sheets are named and filled in order.
fn build_book(sheets: &[(String, Vec<Vec<Cell>>)]) -> anyhow::Result<Spreadsheet> {
    let mut book = umya_spreadsheet::new_file();
    for (idx, (name, rows)) in sheets.iter().enumerate() {
        let sheet = if idx == 0 {
            let ws = book
                .get_sheet_mut(&0)
                .context("new workbook has no default sheet")?;
            ws.set_name(name.as_str());
            ws
        } else {
            book.new_sheet(name.as_str())
                .map_err(|e| anyhow::anyhow!("create sheet {}: {}", name, e))?
        };
        write_rows(sheet, rows);
    }
    Ok(book)
}

fn save_book(book: &Spreadsheet, out_dir: &Path, file_name: &str) -> anyhow::Result<PathBuf> {
    std::fs::create_dir_all(out_dir)
        .with_context(|| format!("create export dir {}", out_dir.display()))?;
    let path = out_dir.join(file_name);
    umya_spreadsheet::writer::xlsx::write(book, &path)
        .map_err(|e| anyhow::anyhow!("write {}: {}", path.display(), e))?;
    tracing::info!(path = %path.display(), "workbook written");
    Ok(path)
}

fn save_pdf(
    out_dir: &Path,
    file_name: &str,
    font: &PdfFont,
    orientation: Orientation,
    sections: &[Section],
) -> anyhow::Result<PathBuf> {
    std::fs::create_dir_all(out_dir)
        .with_context(|| format!("create export dir {}", out_dir.display()))?;
    let path = out_dir.join(file_name);
    let title = file_name.trim_end_matches(".pdf");
    let pages = pdf::render(&path, title, orientation, font, sections)?;
    tracing::info!(path = %path.display(), pages, "pdf written");
    Ok(path)
}

/// One portrait page per entry, rows as they appear in the workbook sheet.
fn save_pages(
    out_dir: &Path,
    file_name: &str,
    font: &PdfFont,
    pages: Vec<Vec<Vec<Cell>>>,
) -> anyhow::Result<PathBuf> {
    let sections: Vec<Section> = pages
        .into_iter()
        .map(|rows| Section {
            title: None,
            rows,
            header_rows: 0,
        })
        .collect();
    save_pdf(out_dir, file_name, font, Orientation::Portrait, &sections)
}

/// Strips characters the filesystem would treat as separators.
fn file_safe(name: &str) -> String {
    name.chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            c => c,
        })
        .collect()
}

/// Removes `*?:/\[]`, cuts to 31 characters, and suffixes repeats until unique.
pub fn sheet_name(raw: &str, taken: &mut HashSet<String>) -> String {
    let cleaned: String = raw
        .chars()
        .filter(|c| !matches!(c, '*' | '?' | ':' | '/' | '\\' | '[' | ']'))
        .collect();
    let base: String = cleaned.trim().chars().take(SHEET_NAME_MAX_CHARS).collect();
    let base = if base.is_empty() { "Sheet".to_string() } else { base };

    let mut candidate = base.clone();
    let mut n = 2;
    while !taken.insert(candidate.to_lowercase()) {
        let suffix = format!(" ({})", n);
        let keep = SHEET_NAME_MAX_CHARS.saturating_sub(suffix.chars().count());
        candidate = format!("{}{}", base.chars().take(keep).collect::<String>(), suffix);
        n += 1;
    }
    candidate
}

pub fn write_template(out_dir: &Path) -> anyhow::Result<PathBuf> {
    let header: Vec<Cell> = TEMPLATE_HEADERS.iter().map(|h| Cell::from(*h)).collect();
    let mut book = build_book(&[(TEMPLATE_SHEET.to_string(), vec![header])])?;
    let sheet = book
        .get_sheet_mut(&0)
        .context("template workbook has no sheet")?;
    bold_row(sheet, 1, TEMPLATE_HEADERS.len());
    for (col, width) in TEMPLATE_WIDTHS {
        sheet.get_column_dimension_mut(col).set_width(width);
    }

    let grades: Vec<&str> = GRADES.iter().map(|g| g.grade).collect();
    let mut validations = DataValidations::default();
    validations.add_data_validation_list(list_validation("C2:C1000", &grades));
    validations.add_data_validation_list(list_validation("D2:D1000", &CLASSROOMS));
    sheet.set_data_validations(validations);

    save_book(&book, out_dir, TEMPLATE_FILE_NAME)
}

fn list_validation(range: &str, options: &[&str]) -> DataValidation {
    let mut dv = DataValidation::default();
    dv.set_type(DataValidationValues::List);
    dv.set_allow_blank(true);
    dv.set_show_error_message(true);
    dv.set_formula1(format!("\"{}\"", options.join(",")));
    dv.get_sequence_of_references_mut().set_sqref(range);
    dv
}

fn format_average(v: Option<f64>) -> Cell {
    match v {
        Some(v) => Cell::Text(format!("{:.2}", v)),
        None => Cell::from("-"),
    }
}

pub fn class_summary_rows(sheet: &SingleAttemptSheet) -> Vec<Vec<Cell>> {
    let mut header: Vec<Cell> = vec!["เลขที่".into(), "ชื่อ - สกุล".into()];
    for subject in &sheet.subjects {
        header.push(subject.as_str().into());
        header.push("สถานะ".into());
    }
    header.push("คะแนนรวมเฉลี่ย".into());

    let mut rows = vec![header];
    for student in sheet.visible_students() {
        let mut row: Vec<Cell> = vec![
            student.roll_number.as_str().into(),
            student.name.as_str().into(),
        ];
        for (_, score) in sheet.student_scores(&student.id) {
            row.push(score.into());
            row.push(PassStatus::of(score).label().into());
        }
        row.push(format_average(sheet.row_average(&student.id)));
        rows.push(row);
    }
    rows
}

fn class_summary_title(sheet: &SingleAttemptSheet) -> String {
    let room = sheet
        .classroom
        .as_deref()
        .map(|c| format!(" ห้อง {}", c))
        .unwrap_or_default();
    format!("ผลสัมฤทธิ์ O-NET {}{} {}", sheet.grade, room, sheet.attempt)
}

pub fn class_summary_file_name(sheet: &SingleAttemptSheet, extension: &str) -> String {
    file_safe(&format!("{}.{}", class_summary_title(sheet), extension))
}

/// Landscape in PDF; the header row repeats on every page.
pub fn write_class_summary(
    sheet: &SingleAttemptSheet,
    out_dir: &Path,
    format: &Format,
) -> anyhow::Result<PathBuf> {
    let rows = class_summary_rows(sheet);
    let file_name = class_summary_file_name(sheet, format.extension());
    match format {
        Format::Xlsx => {
            let columns = rows.first().map(|r| r.len()).unwrap_or(0);
            let mut book = build_book(&[(SUMMARY_SHEET.to_string(), rows)])?;
            if let Some(ws) = book.get_sheet_mut(&0) {
                bold_row(ws, 1, columns);
            }
            save_book(&book, out_dir, &file_name)
        }
        Format::Pdf(font) => {
            let section = Section {
                title: Some(class_summary_title(sheet)),
                rows,
                header_rows: 1,
            };
            save_pdf(out_dir, &file_name, font, Orientation::Landscape, &[section])
        }
    }
}

fn student_rows(sheet: &SingleAttemptSheet, student: &StudentRecord) -> Vec<Vec<Cell>> {
    let mut rows: Vec<Vec<Cell>> = vec![
        vec!["ใบรายงานผลการทดสอบระดับชาติ O-NET".into()],
        vec![SCHOOL_NAME.into()],
        vec![],
        vec!["ชื่อ-สกุล".into(), student.name.as_str().into()],
        vec![
            "ระดับชั้น".into(),
            student.grade.as_str().into(),
            "ห้องเรียน".into(),
            student.classroom.as_str().into(),
        ],
        vec![
            "เลขที่".into(),
            student.roll_number.as_str().into(),
            "ครั้งที่สอบ".into(),
            sheet.attempt.as_str().into(),
        ],
        vec!["ปีการศึกษา".into(), ACADEMIC_YEAR.into()],
        vec![],
        vec!["รายวิชา".into(), "คะแนน".into(), "สถานะ".into()],
    ];
    for (subject, score) in sheet.student_scores(&student.id) {
        rows.push(vec![
            subject.into(),
            format_score(score).into(),
            PassStatus::of(score).label().into(),
        ]);
    }
    let average = sheet.row_average(&student.id);
    rows.push(vec![
        "คะแนนรวมเฉลี่ย".into(),
        format_score(average).into(),
        PassStatus::of(average).label().into(),
    ]);
    rows
}

pub fn student_reports_file_name(sheet: &SingleAttemptSheet, extension: &str) -> String {
    let room = sheet
        .classroom
        .as_deref()
        .map(|c| format!("_ห้อง{}", c))
        .unwrap_or_default();
    file_safe(&format!(
        "รายงานรายบุคคล_{}{}_{}.{}",
        sheet.grade, room, sheet.attempt, extension
    ))
}

/// One sheet (or PDF page) per visible student. Returns `None` when nobody is visible.
pub fn write_student_reports(
    sheet: &SingleAttemptSheet,
    out_dir: &Path,
    format: &Format,
) -> anyhow::Result<Option<PathBuf>> {
    let students = sheet.visible_students();
    if students.is_empty() {
        return Ok(None);
    }
    let file_name = student_reports_file_name(sheet, format.extension());
    let path = match format {
        Format::Xlsx => {
            let mut taken = HashSet::new();
            let sheets: Vec<(String, Vec<Vec<Cell>>)> = students
                .into_iter()
                .map(|s| (sheet_name(&s.name, &mut taken), student_rows(sheet, s)))
                .collect();
            save_book(&build_book(&sheets)?, out_dir, &file_name)?
        }
        Format::Pdf(font) => {
            let pages = students.into_iter().map(|s| student_rows(sheet, s)).collect();
            save_pages(out_dir, &file_name, font, pages)?
        }
    };
    Ok(Some(path))
}

pub fn write_student_report(
    sheet: &SingleAttemptSheet,
    student: &StudentRecord,
    out_dir: &Path,
    format: &Format,
) -> anyhow::Result<PathBuf> {
    let rows = student_rows(sheet, student);
    let file_name = file_safe(&format!("รายงานผล_{}.{}", student.name, format.extension()));
    match format {
        Format::Xlsx => save_book(
            &build_book(&[(STUDENT_SHEET.to_string(), rows)])?,
            out_dir,
            &file_name,
        ),
        Format::Pdf(font) => save_pages(out_dir, &file_name, font, vec![rows]),
    }
}

pub fn pre_test_student_rows(sheet: &PreTestSheet, student: &StudentRecord) -> Vec<Vec<Cell>> {
    let r = sheet.rounds(&student.id);
    vec![
        vec!["ใบรายงานผลการทดสอบ".into(), sheet.group.group_name.into()],
        vec!["ชื่อ-สกุล".into(), student.name.as_str().into()],
        vec![
            "ระดับชั้น".into(),
            sheet.grade().into(),
            "ห้องเรียน".into(),
            student.classroom.as_str().into(),
        ],
        vec!["เลขที่".into(), student.roll_number.as_str().into()],
        vec![],
        vec!["รายการ".into(), "คะแนน".into()],
        vec!["ผลการทดสอบครั้งที่ 1".into(), format_score(r.round1).into()],
        vec!["ผลการทดสอบครั้งที่ 2".into(), format_score(r.round2).into()],
        vec!["คะแนนพัฒนาการ".into(), format_development(r.development()).into()],
        vec![
            "คะแนนเฉลี่ย".into(),
            format_score(mean_of_entered([r.round1, r.round2])).into(),
        ],
    ]
}

pub fn write_pre_test_student(
    sheet: &PreTestSheet,
    student: &StudentRecord,
    out_dir: &Path,
    format: &Format,
) -> anyhow::Result<PathBuf> {
    let rows = pre_test_student_rows(sheet, student);
    let file_name = file_safe(&format!(
        "รายงานผล_{}_{}.{}",
        sheet.group.group_name,
        student.name,
        format.extension()
    ));
    match format {
        Format::Xlsx => save_book(
            &build_book(&[(STUDENT_SHEET.to_string(), rows)])?,
            out_dir,
            &file_name,
        ),
        Format::Pdf(font) => save_pages(out_dir, &file_name, font, vec![rows]),
    }
}
