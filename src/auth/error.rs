#[derive(Debug, Clone)]
#[derive(serde::Serialize)]
pub struct ErrorResponse<K> {
    #[serde(rename = "error")]
    pub kind: K,
    #[serde(rename = "error_description")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(rename = "error_uri")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub uri: Option<String>,
}

impl<K> ErrorResponse<K> {
    pub fn with_description(kind: K, description: impl Into<String>) -> Self {
        Self {
            kind,
            description: Some(description.into()),
            uri: None,
        }
    }
}
