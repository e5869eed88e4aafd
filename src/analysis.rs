//! Narrative score analysis through the Gemini `generateContent` REST API.

use crate::calc::ChartSeries;
use crate::config::Config;
use crate::error::ErrorCode;
use reqwest::blocking::Client;
use serde::Deserialize;
use std::collections::BTreeMap;

pub const ANALYSIS_FAILED_MESSAGE: &str = "เกิดข้อผิดพลาดในการวิเคราะห์ข้อมูล กรุณาลองใหม่อีกครั้ง";

#[derive(Debug, thiserror::Error)]
pub enum AnalysisError {
    #[error("no Gemini API key configured")]
    MissingApiKey,
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("service returned HTTP {status}")]
    Status { status: u16, body: String },
    #[error("service returned no text")]
    EmptyAnswer,
}

impl ErrorCode for AnalysisError {
    fn code(&self) -> &'static str {
        "analysis_failed"
    }

    fn details(&self) -> Option<serde_json::Value> {
        let mut details = serde_json::json!({ "reason": self.to_string() });
        if let AnalysisError::Status { status, .. } = self {
            details["status"] = serde_json::json!(status);
        }
        Some(details)
    }
}

/// Attempt name -> series of one chart.
pub type AnalysisData = BTreeMap<String, ChartSeries>;

pub fn build_prompt(
    title: &str,
    data: &AnalysisData,
    target_score: Option<f64>,
) -> Result<String, serde_json::Error> {
    let data_string = serde_json::to_string_pretty(data)?;

    let comparison = if data.len() > 1 {
        "*   **แนวโน้มและผลการเปรียบเทียบ:** เปรียบเทียบผลคะแนนระหว่างครั้งต่างๆ ที่เลือกมา มีแนวโน้มดีขึ้น คงที่ หรือลดลงอย่างไร"
            .to_string()
    } else {
        String::new()
    };
    let target = match target_score.filter(|t| *t > 0.0) {
        Some(t) => format!(
            "5.  **เปรียบเทียบกับเป้าหมาย:** วิเคราะห์ผลคะแนนเมื่อเทียบกับคะแนนเป้าหมายที่ {} คะแนน ว่ามีรายวิชาหรือระดับชั้นใดบ้างที่สูงหรือต่ำกว่าเป้าหมาย และแตกต่างกันมากน้อยเพียงใดในแต่ละครั้งที่สอบ",
            t
        ),
        None => String::new(),
    };

    Ok(format!(
        "ในฐานะผู้เชี่ยวชาญด้านการวิเคราะห์ข้อมูลการศึกษา โปรดวิเคราะห์ข้อมูลผลการทดสอบ O-NET ต่อไปนี้
หัวข้อ: \"{title}\"
ข้อมูลคะแนน (JSON, โดยที่ Key คือชื่อครั้งที่สอบ):
{data_string}

โปรดสรุปประเด็นสำคัญตามรูปแบบด้านล่างนี้ โดยเน้นการเปรียบเทียบหากมีข้อมูลหลายชุด:
1.  **ภาพรวม:**
    *   สรุปผลคะแนนโดยรวมของแต่ละครั้งว่าเป็นอย่างไร
    {comparison}
2.  **จุดแข็ง:** ระบุรายวิชาหรือระดับชั้นที่ทำคะแนนได้ดีที่สุดในแต่ละครั้ง และวิเคราะห์ว่ามีจุดแข็งที่สม่ำเสมอหรือไม่
3.  **จุดที่ควรพัฒนา:** ระบุรายวิชาหรือระดับชั้นที่ทำคะแนนได้น้อยที่สุดในแต่ละครั้ง และวิเคราะห์ว่ามีจุดที่ต้องพัฒนาอย่างต่อเนื่องหรือไม่
4.  **ข้อเสนอแนะ:** เสนอแนะแนวทางในการพัฒนานักเรียนในจุดที่ยังต้องปรับปรุงอย่างเป็นรูปธรรม 1-2 ข้อ โดยพิจารณาจากข้อมูลทั้งหมด
{target}

คำตอบต้องเป็นภาษาไทยที่กระชับและเข้าใจง่ายสำหรับครูและผู้บริหาร
"
    ))
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<Content>,
}

#[derive(Debug, Deserialize)]
struct Content {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Deserialize)]
struct Part {
    text: Option<String>,
}

fn first_candidate_text(resp: GenerateResponse) -> Option<String> {
    let text: String = resp
        .candidates
        .into_iter()
        .next()?
        .content?
        .parts
        .into_iter()
        .filter_map(|p| p.text)
        .collect();
    (!text.trim().is_empty()).then_some(text)
}

pub fn generate(config: &Config, prompt: &str) -> Result<String, AnalysisError> {
    let key = config
        .gemini_api_key
        .as_deref()
        .ok_or(AnalysisError::MissingApiKey)?;
    let url = format!(
        "{}/models/{}:generateContent",
        config.gemini_endpoint, config.gemini_model
    );
    let body = serde_json::json!({ "contents": [{ "parts": [{ "text": prompt }] }] });

    let client = Client::builder().timeout(config.analysis_timeout).build()?;
    let response = client
        .post(&url)
        .query(&[("key", key)])
        .json(&body)
        .send()?;

    if !response.status().is_success() {
        let status = response.status().as_u16();
        let body = response.text().unwrap_or_default();
        return Err(AnalysisError::Status { status, body });
    }

    let parsed: GenerateResponse = response.json()?;
    first_candidate_text(parsed).ok_or(AnalysisError::EmptyAnswer)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calc::ChartPoint;

    fn data(attempts: &[&str]) -> AnalysisData {
        attempts
            .iter()
            .map(|a| {
                (
                    a.to_string(),
                    vec![ChartPoint {
                        name: "ป.1".to_string(),
                        average_score: 61.5,
                    }],
                )
            })
            .collect()
    }

    #[test]
    fn prompt_sections_depend_on_inputs() {
        let single = build_prompt("ผลรวม", &data(&["ครั้งที่ 1"]), None).expect("prompt");
        assert!(single.contains("หัวข้อ: \"ผลรวม\""));
        assert!(single.contains("\"averageScore\": 61.5"));
        assert!(!single.contains("แนวโน้มและผลการเปรียบเทียบ"));
        assert!(!single.contains("เปรียบเทียบกับเป้าหมาย"));

        let multi =
            build_prompt("ผลรวม", &data(&["ครั้งที่ 1", "ครั้งที่ 2"]), Some(55.0)).expect("prompt");
        assert!(multi.contains("แนวโน้มและผลการเปรียบเทียบ"));
        assert!(multi.contains("เป้าหมายที่ 55 คะแนน"));
    }

    #[test]
    fn response_text_joins_parts_of_first_candidate() {
        let resp: GenerateResponse = serde_json::from_value(serde_json::json!({
            "candidates": [
                { "content": { "parts": [{ "text": "ก" }, { "text": "ข" }] } },
                { "content": { "parts": [{ "text": "ignored" }] } }
            ]
        }))
        .expect("parse");
        assert_eq!(first_candidate_text(resp).as_deref(), Some("กข"));

        let empty: GenerateResponse =
            serde_json::from_value(serde_json::json!({ "candidates": [] })).expect("parse");
        assert_eq!(first_candidate_text(empty), None);
    }

    #[test]
    fn missing_key_fails_before_any_request() {
        let err = generate(&Config::default(), "x").expect_err("no key");
        assert!(matches!(err, AnalysisError::MissingApiKey));
        assert_eq!(err.code(), "analysis_failed");
    }
}
