use serde::Deserialize;

/// Characters that still fit one segment; longer bodies go through the platform divider.
pub const DEFAULT_SINGLE_SEGMENT_LIMIT: usize = 160;
pub const DEFAULT_WORKER_THREAD_NAME: &str = "sms-io";

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
/// Tunables for [`crate::SmsManager`].
///
/// Every field is optional when loaded from JSON:
///
/// ```rust
/// let config = smsbridge::BridgeConfig::from_json(r#"{ "single_segment_limit": 70 }"#).unwrap();
/// assert_eq!(config.single_segment_limit, 70);
/// assert_eq!(config.worker_thread_name, "sms-io");
/// ```
pub struct BridgeConfig {
    pub single_segment_limit: usize,
    pub worker_thread_name: String,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            single_segment_limit: DEFAULT_SINGLE_SEGMENT_LIMIT,
            worker_thread_name: DEFAULT_WORKER_THREAD_NAME.to_owned(),
        }
    }
}

impl BridgeConfig {
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}
