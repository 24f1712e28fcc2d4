use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Building {
    pub address: String,
    pub name: Option<String>,
    pub neighborhood: Option<String>,
    pub city: Option<String>,
    pub postal_code: Option<String>,
    pub year_built: Option<i32>,
    pub floors: Option<i32>,
    pub units: Option<i32>,
}

impl Building {
    pub fn display_name(&self) -> &str {
        self.name
            .as_deref()
            .filter(|n| !n.trim().is_empty())
            .unwrap_or(&self.address)
    }
}
