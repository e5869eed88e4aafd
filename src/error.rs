/// Stable machine-readable identity for domain errors crossing the IPC boundary.
pub trait ErrorCode: std::fmt::Display {
    fn code(&self) -> &'static str;

    fn details(&self) -> Option<serde_json::Value> {
        None
    }
}
