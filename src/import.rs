//! Bulk JSON import and export of tools and categories.
//!
//! Import goes through the same tool insert as interactive submission, so
//! descriptions are sanitized. Category links, and any categories created for
//! the tool, are written in the tool's own transaction. Categories are matched by name; what happens
//! to names that match nothing is decided by [`UnknownCategoryPolicy`].

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::str::FromStr;

use crate::error::{DirectoryError, DirectoryResult};
use crate::models::{Category, ToolResource, Viewer};
use crate::store::{NewTool, Store};
use crate::visibility::{require_admin, require_authenticated};

pub const EXPORT_VERSION: &str = "1.0";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum UnknownCategoryPolicy {
    /// Drop names that match no existing category
    #[default]
    Skip,
    /// Create a category for each unknown name
    Create,
}

impl FromStr for UnknownCategoryPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "skip" => Ok(UnknownCategoryPolicy::Skip),
            "create" => Ok(UnknownCategoryPolicy::Create),
            other => Err(format!("unknown category policy '{}' (expected skip or create)", other)),
        }
    }
}

/// One tool as it may appear in an import file. Several field spellings are
/// accepted since import files come from different scrapers.
#[derive(Debug, Clone, Deserialize)]
pub struct ImportTool {
    pub name: Option<String>,
    pub description: Option<String>,
    #[serde(alias = "website")]
    pub url: Option<String>,
    #[serde(alias = "logo", alias = "icon")]
    pub image_url: Option<String>,
    #[serde(alias = "video")]
    pub youtube_url: Option<String>,
    #[serde(alias = "category", default)]
    pub categories: CategoryNames,
    #[serde(default)]
    pub resources: Vec<ToolResource>,
    pub is_approved: Option<bool>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum CategoryNames {
    One(String),
    Many(Vec<String>),
}

impl Default for CategoryNames {
    fn default() -> Self {
        CategoryNames::Many(Vec::new())
    }
}

impl CategoryNames {
    fn names(&self) -> Vec<&str> {
        let raw: Vec<&str> = match self {
            CategoryNames::One(name) => vec![name.as_str()],
            CategoryNames::Many(names) => names.iter().map(String::as_str).collect(),
        };
        raw.into_iter().map(str::trim).filter(|s| !s.is_empty()).collect()
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ImportCategory {
    pub name: String,
    #[serde(default)]
    pub description: String,
}

#[derive(Debug, Default, Serialize)]
pub struct ImportReport {
    pub imported: usize,
    /// Tools skipped because a tool with the same name exists
    pub skipped: Vec<String>,
    pub created_categories: Vec<String>,
    /// Category names dropped under the skip policy
    pub unknown_categories: Vec<String>,
    pub failures: Vec<ImportFailure>,
}

#[derive(Debug, Serialize)]
pub struct ImportFailure {
    pub name: String,
    pub error: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ExportDocument {
    pub version: String,
    pub exported_at: DateTime<Utc>,
    pub categories: Vec<Category>,
    pub tools: Vec<ExportTool>,
}

/// Tools are exported with category names so the file imports cleanly into
/// another directory.
#[derive(Debug, Serialize, Deserialize)]
pub struct ExportTool {
    pub name: String,
    pub description: String,
    pub url: String,
    pub image_url: Option<String>,
    pub youtube_url: Option<String>,
    pub categories: Vec<String>,
    pub resources: Vec<ToolResource>,
    pub is_approved: bool,
}

/// Split a payload into category definitions and tools. Accepts a bare array
/// of tools, an object wrapping one under `tools`, `data` or `items`, or a
/// single tool object.
pub fn parse_payload(payload: Value) -> DirectoryResult<(Vec<ImportCategory>, Vec<ImportTool>)> {
    match payload {
        Value::Array(_) => Ok((Vec::new(), serde_json::from_value(payload).map_err(invalid_payload)?)),
        Value::Object(mut obj) => {
            match take_tool_list(&mut obj) {
                Some(tools) => {
                    let categories = match obj.remove("categories") {
                        Some(value @ Value::Array(_)) => {
                            serde_json::from_value(value).map_err(invalid_payload)?
                        }
                        _ => Vec::new(),
                    };
                    Ok((categories, serde_json::from_value(tools).map_err(invalid_payload)?))
                }
                None => Ok((
                    Vec::new(),
                    vec![serde_json::from_value(Value::Object(obj)).map_err(invalid_payload)?],
                )),
            }
        }
        _ => Err(DirectoryError::Validation(
            "Import must be an array of tools or an object containing tools".to_string(),
        )),
    }
}

/// Remove and return the first of `tools`, `data` or `items` that holds an
/// array. Keys holding anything else stay in place.
fn take_tool_list(obj: &mut Map<String, Value>) -> Option<Value> {
    let key = ["tools", "data", "items"]
        .into_iter()
        .find(|key| obj.get(*key).map_or(false, Value::is_array))?;
    obj.remove(key)
}

fn invalid_payload(e: serde_json::Error) -> DirectoryError {
    DirectoryError::Validation(format!("Invalid import payload: {}", e))
}

pub fn import_tools(
    store: &Store,
    viewer: &Viewer,
    payload: Value,
    policy: UnknownCategoryPolicy,
) -> DirectoryResult<ImportReport> {
    require_admin(viewer)?;
    let owner_id = require_authenticated(viewer)?;

    let (categories, tools) = parse_payload(payload)?;
    let mut report = ImportReport::default();

    for category in categories {
        match store.create_category(&category.name, &category.description) {
            Ok(created) => report.created_categories.push(created.name),
            Err(DirectoryError::Conflict(_)) | Err(DirectoryError::Validation(_)) => {}
            Err(e) => return Err(e),
        }
    }

    for tool in tools {
        let name = tool.name.as_deref().map(str::trim).unwrap_or_default().to_string();
        match import_one(store, owner_id, &tool, policy, &mut report) {
            Ok(true) => report.imported += 1,
            Ok(false) => report.skipped.push(name),
            Err(e) => {
                log::warn!("Failed to import tool '{}': {}", name, e);
                report.failures.push(ImportFailure {
                    name,
                    error: e.public_message(),
                });
            }
        }
    }

    log::info!(
        "Import finished: {} imported, {} skipped, {} failed",
        report.imported,
        report.skipped.len(),
        report.failures.len()
    );
    Ok(report)
}

/// Returns `Ok(false)` when the tool already exists.
fn import_one(
    store: &Store,
    owner_id: i64,
    tool: &ImportTool,
    policy: UnknownCategoryPolicy,
    report: &mut ImportReport,
) -> DirectoryResult<bool> {
    let name = tool.name.as_deref().map(str::trim).unwrap_or_default();
    if name.is_empty() {
        return Err(DirectoryError::Validation("Tool name is required".to_string()));
    }
    if store.tool_name_exists(name)? {
        return Ok(false);
    }

    let new_tool = NewTool {
        name: name.to_string(),
        description: tool
            .description
            .clone()
            .unwrap_or_else(|| "No description provided".to_string()),
        url: tool.url.clone().unwrap_or_default(),
        image_url: tool.image_url.clone(),
        youtube_url: tool.youtube_url.clone(),
        category_ids: Vec::new(),
        resources: tool.resources.clone(),
        is_approved: tool.is_approved.unwrap_or(true),
    };
    let inserted = store.create_tool_with_category_names(
        owner_id,
        &new_tool,
        &tool.categories.names(),
        policy == UnknownCategoryPolicy::Create,
    )?;

    report.created_categories.extend(inserted.created_categories);
    for unknown in inserted.unknown_categories {
        if !report.unknown_categories.contains(&unknown) {
            report.unknown_categories.push(unknown);
        }
    }
    Ok(true)
}

pub fn export_directory(store: &Store, viewer: &Viewer) -> DirectoryResult<ExportDocument> {
    require_admin(viewer)?;

    let mut tools = store.list_all_tools()?;
    // Oldest first so a re-import keeps submission order
    tools.sort_by_key(|tool| tool.id);
    let tools = tools
        .into_iter()
        .map(|tool| ExportTool {
            name: tool.name,
            description: tool.description,
            url: tool.url,
            image_url: tool.image_url,
            youtube_url: tool.youtube_url,
            categories: tool.categories.into_iter().map(|c| c.name).collect(),
            resources: tool.resources,
            is_approved: tool.is_approved,
        })
        .collect();

    Ok(ExportDocument {
        version: EXPORT_VERSION.to_string(),
        exported_at: Utc::now(),
        categories: store.list_categories()?,
        tools,
    })
}
