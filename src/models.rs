use std::sync::Arc;

use serde::Deserialize;

use crate::{catalog::CatalogSource, config::BrokerSummary, producer::Publisher};

/// Collaborators injected into every handler.
#[derive(Clone)]
pub struct AppState {
    pub catalog: Arc<dyn CatalogSource>,
    pub publisher: Arc<dyn Publisher>,
    pub topic: String,
    pub broker: BrokerSummary,
}

/// Form body of `POST /submit`. Missing fields decode as empty strings so
/// that validation, not extraction, rejects them.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Submission {
    #[serde(default, rename = "selectedFile")]
    pub selected_file: String,
    #[serde(default)]
    pub content: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Confirmation {
    pub id: String,
    pub file: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct SuccessQuery {
    pub id: Option<String>,
    pub file: Option<String>,
}
