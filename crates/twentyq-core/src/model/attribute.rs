use serde::{Deserialize, Serialize};

/// A yes/no question used to discriminate entities.
///
/// `alpha`/`beta` are Beta-distribution parameters kept for future
/// uncertainty modeling; the belief update does not read them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Attribute {
    pub id: String,
    pub question: String,
    #[serde(default = "default_category")]
    pub category: String,
    #[serde(default = "default_shape")]
    pub alpha: f64,
    #[serde(default = "default_shape")]
    pub beta: f64,
}

impl Attribute {
    pub fn new(id: impl Into<String>, question: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            question: question.into(),
            category: default_category(),
            alpha: default_shape(),
            beta: default_shape(),
        }
    }

    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = category.into();
        self
    }
}

fn default_category() -> String {
    "general".to_string()
}

fn default_shape() -> f64 {
    1.0
}
