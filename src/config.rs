use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DEFAULT_GEMINI_MODEL: &str = "gemini-2.5-pro";
pub const DEFAULT_GEMINI_ENDPOINT: &str = "https://generativelanguage.googleapis.com/v1beta";
pub const DEFAULT_ANALYSIS_TIMEOUT_SECS: u64 = 60;

/// Thai-capable TrueType fonts tried in order when `SCOREBOARD_PDF_FONT` is unset.
const PDF_FONT_CANDIDATES: [&str; 7] = [
    "/usr/share/fonts/truetype/thai/THSarabunNew.ttf",
    "/usr/share/fonts/truetype/tlwg/Garuda.ttf",
    "/usr/share/fonts/truetype/tlwg/Loma.ttf",
    "/usr/share/fonts/truetype/noto/NotoSansThai-Regular.ttf",
    "/Library/Fonts/THSarabunNew.ttf",
    "/System/Library/Fonts/Supplemental/Tahoma.ttf",
    "C:\\Windows\\Fonts\\THSarabunNew.ttf",
];

/// Process configuration, read once at startup.
#[derive(Debug, Clone)]
pub struct Config {
    pub gemini_api_key: Option<String>,
    pub gemini_model: String,
    pub gemini_endpoint: String,
    pub analysis_timeout: Duration,
    pub pdf_font: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            gemini_api_key: None,
            gemini_model: DEFAULT_GEMINI_MODEL.to_string(),
            gemini_endpoint: DEFAULT_GEMINI_ENDPOINT.to_string(),
            analysis_timeout: Duration::from_secs(DEFAULT_ANALYSIS_TIMEOUT_SECS),
            pdf_font: None,
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        let mut config = Self::from_lookup(|k| std::env::var(k).ok());
        if config.pdf_font.is_none() {
            config.pdf_font = PDF_FONT_CANDIDATES
                .iter()
                .map(|p| Path::new(*p))
                .find(|p| p.is_file())
                .map(Path::to_path_buf);
        }
        config
    }

    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |k: &str| lookup(k).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let defaults = Config::default();

        let timeout_secs = non_empty("SCOREBOARD_ANALYSIS_TIMEOUT_SECS")
            .and_then(|v| match v.parse::<u64>() {
                Ok(n) if n > 0 => Some(n),
                _ => {
                    tracing::warn!(value = %v, "ignoring invalid SCOREBOARD_ANALYSIS_TIMEOUT_SECS");
                    None
                }
            })
            .unwrap_or(DEFAULT_ANALYSIS_TIMEOUT_SECS);

        Self {
            gemini_api_key: non_empty("SCOREBOARD_GEMINI_API_KEY")
                .or_else(|| non_empty("GEMINI_API_KEY"))
                .or_else(|| non_empty("API_KEY")),
            gemini_model: non_empty("SCOREBOARD_GEMINI_MODEL").unwrap_or(defaults.gemini_model),
            gemini_endpoint: non_empty("SCOREBOARD_GEMINI_ENDPOINT")
                .map(|v| v.trim_end_matches('/').to_string())
                .unwrap_or(defaults.gemini_endpoint),
            analysis_timeout: Duration::from_secs(timeout_secs),
            pdf_font: non_empty("SCOREBOARD_PDF_FONT").map(PathBuf::from),
        }
    }

    pub fn has_api_key(&self) -> bool {
        self.gemini_api_key.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config(vars: &[(&str, &str)]) -> Config {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|k| map.get(k).cloned())
    }

    #[test]
    fn key_fallback_order() {
        assert_eq!(
            config(&[("API_KEY", "c"), ("GEMINI_API_KEY", "b")]).gemini_api_key.as_deref(),
            Some("b")
        );
        assert_eq!(
            config(&[("SCOREBOARD_GEMINI_API_KEY", "a"), ("API_KEY", "c")])
                .gemini_api_key
                .as_deref(),
            Some("a")
        );
        assert!(!config(&[("SCOREBOARD_GEMINI_API_KEY", "  ")]).has_api_key());
    }

    #[test]
    fn defaults_and_bad_timeout() {
        let c = config(&[("SCOREBOARD_ANALYSIS_TIMEOUT_SECS", "zero")]);
        assert_eq!(c.gemini_model, DEFAULT_GEMINI_MODEL);
        assert_eq!(c.analysis_timeout, Duration::from_secs(60));
        let c = config(&[("SCOREBOARD_GEMINI_ENDPOINT", "http://127.0.0.1:9/")]);
        assert_eq!(c.gemini_endpoint, "http://127.0.0.1:9");
        assert_eq!(c.pdf_font, None);
    }

    #[test]
    fn pdf_font_from_env() {
        let c = config(&[("SCOREBOARD_PDF_FONT", " /fonts/THSarabunNew.ttf ")]);
        assert_eq!(c.pdf_font, Some(PathBuf::from("/fonts/THSarabunNew.ttf")));
    }
}
