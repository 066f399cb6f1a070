use serde::{Deserialize, Serialize};

pub mod api {
    use super::*;

    /// Duration as sent by clients: `"24"`, `24` or `"permanent"`.
    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    #[serde(untagged)]
    pub enum DurationValue {
        Hours(u64),
        Text(String),
    }

    impl DurationValue {
        pub fn as_text(&self) -> String {
            match self {
                DurationValue::Hours(h) => h.to_string(),
                DurationValue::Text(s) => s.clone(),
            }
        }
    }

    #[derive(Debug, Clone, Default, Serialize, Deserialize)]
    pub struct GenerateKeyRequest {
        pub username: Option<String>,
        pub duration: Option<DurationValue>,
    }

    #[derive(Debug, Clone, Serialize, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct GenerateKeyResponse {
        pub success: bool,
        pub message: String,
        pub key: String,
        pub username: String,
        pub duration: String,
        pub duration_label: String,
        pub created_at: String,
        pub expires_at: Option<String>,
        pub expires_at_formatted: String,
    }

    #[derive(Debug, Clone, Default, Serialize, Deserialize)]
    pub struct VerifyKeyRequest {
        pub key: Option<String>,
        pub username: Option<String>,
    }

    #[derive(Debug, Clone, Serialize, Deserialize)]
    pub struct VerifyKeyResponse {
        pub valid: bool,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        pub message: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        pub error: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        pub data: Option<VerifiedKey>,
    }

    #[derive(Debug, Clone, Serialize, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct VerifiedKey {
        pub username: String,
        pub duration: String,
        pub created_at: String,
        pub expires_at: Option<String>,
    }

    #[derive(Debug, Clone, Default, Serialize, Deserialize)]
    pub struct RenewKeyRequest {
        pub key: Option<String>,
        pub username: Option<String>,
        pub duration: Option<DurationValue>,
    }

    #[derive(Debug, Clone, Serialize, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct RenewKeyResponse {
        pub success: bool,
        pub message: String,
        pub new_expires_at: String,
        pub renew_count: u32,
        pub new_expires_at_formatted: String,
    }

    #[derive(Debug, Clone, Serialize, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct CleanupResponse {
        pub success: bool,
        pub message: String,
        pub deleted_count: usize,
        pub remaining_keys: usize,
    }

    #[derive(Debug, Clone, Serialize, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct ErrorResponse {
        pub success: bool,
        pub error: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        pub existing_key: Option<ExistingKey>,
    }

    #[derive(Debug, Clone, Serialize, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct ExistingKey {
        pub key: String,
        pub expires_at: Option<String>,
        pub duration: String,
    }
}
