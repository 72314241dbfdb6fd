//! Descriptive model metadata.

use earthgrids_store::ModelStore;
use serde::Serialize;

use crate::error::ModelResult;

/// Human-readable metadata stored on the container root.
///
/// All fields are required container attributes except `auxiliary`, which is
/// free-form JSON carried as a string attribute.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ModelInfo {
    pub title: String,
    pub id: String,
    pub description: String,
    pub keywords: Vec<String>,
    pub history: String,
    pub comment: String,
    pub creator_name: String,
    pub creator_email: String,
    pub creator_institution: String,
    pub acknowledgement: String,
    pub authors: Vec<String>,
    pub references: Vec<String>,
    pub repository_name: String,
    pub repository_url: String,
    pub repository_doi: String,
    pub version: String,
    pub license: String,
    pub auxiliary: Option<serde_json::Value>,
}

impl ModelInfo {
    /// Read the descriptive attributes from the container root.
    pub fn load(store: &ModelStore) -> ModelResult<Self> {
        let auxiliary = if store.has_attribute("/", "auxiliary") {
            let raw = store.string_attribute("/", "auxiliary")?;
            serde_json::from_str(&raw).ok()
        } else {
            None
        };

        Ok(Self {
            title: store.string_attribute("/", "title")?,
            id: store.string_attribute("/", "id")?,
            description: store.string_attribute("/", "description")?,
            keywords: store.string_vec_attribute("/", "keywords")?,
            history: store.string_attribute("/", "history")?,
            comment: store.string_attribute("/", "comment")?,
            creator_name: store.string_attribute("/", "creator_name")?,
            creator_email: store.string_attribute("/", "creator_email")?,
            creator_institution: store.string_attribute("/", "creator_institution")?,
            acknowledgement: store.string_attribute("/", "acknowledgement")?,
            authors: store.string_vec_attribute("/", "authors")?,
            references: store.string_vec_attribute("/", "references")?,
            repository_name: store.string_attribute("/", "repository_name")?,
            repository_url: store.string_attribute("/", "repository_url")?,
            repository_doi: store.string_attribute("/", "repository_doi")?,
            version: store.string_attribute("/", "version")?,
            license: store.string_attribute("/", "license")?,
            auxiliary,
        })
    }
}
