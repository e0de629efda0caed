//! Listing filters and sort orders shared by the tool and comment queries.

use serde::Deserialize;

use crate::models::Tool;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortOrder {
    /// Net vote score, highest first
    #[default]
    Votes,
    /// Newest first
    Date,
}

impl SortOrder {
    /// Anything other than an explicit `votes` (or nothing) sorts by date.
    pub fn from_param(param: Option<&str>) -> Self {
        match param.map(str::trim) {
            None | Some("") | Some("votes") => SortOrder::Votes,
            Some(_) => SortOrder::Date,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ToolFilters {
    pub search: Option<String>,
    pub category_id: Option<i64>,
}

impl ToolFilters {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn search(mut self, text: impl Into<String>) -> Self {
        self.search = Some(text.into());
        self
    }

    pub fn category(mut self, category_id: i64) -> Self {
        self.category_id = Some(category_id);
        self
    }

    /// Lowercased search needle; blank input counts as no search.
    pub fn search_needle(&self) -> Option<String> {
        self.search
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_lowercase)
    }

    /// Case-insensitive substring match on name or description.
    pub fn matches_search(&self, tool: &Tool) -> bool {
        match self.search_needle() {
            None => true,
            Some(needle) => {
                tool.name.to_lowercase().contains(&needle)
                    || tool.description.to_lowercase().contains(&needle)
            }
        }
    }
}
