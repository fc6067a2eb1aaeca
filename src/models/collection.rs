//! Collection models, in their local (file) and stored (document) forms.

use serde::{Deserialize, Serialize};

use super::Memo;

/// Someone credited for authoring a collection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct Contributor {
    pub name: String,
    pub url: String,
    pub avatar_url: String,
}

/// Kind of external material referenced by a collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResourceType {
    Article,
    Book,
    Video,
    Other,
}

/// External material related to a collection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Resource {
    #[serde(rename = "type")]
    pub kind: ResourceType,
    pub description: String,
    pub url: String,
}

/// A collection as committed to the repository, owning its full memo list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct LocalCollection {
    pub id: String,
    pub name: String,
    pub description: String,
    pub tags: Vec<String>,
    pub category: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub locale: Option<String>,
    pub contributors: Vec<Contributor>,
    pub resources: Vec<Resource>,
    pub memos: Vec<Memo>,
}

/// The stored projection of a collection: memo bodies live in a sub-collection,
/// only their count and order are kept here.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct StoredCollection {
    pub id: String,
    pub name: String,
    pub description: String,
    pub tags: Vec<String>,
    pub category: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub locale: Option<String>,
    pub contributors: Vec<Contributor>,
    pub resources: Vec<Resource>,
    pub memos_amount: usize,
    pub memos_order: Vec<String>,
}

impl LocalCollection {
    /// Ids of this collection's memos, in file order.
    pub fn memo_ids(&self) -> Vec<String> {
        self.memos.iter().map(|memo| memo.id.clone()).collect()
    }

    /// Derive the stored projection, aggregating memo count and order.
    pub fn to_stored(&self) -> StoredCollection {
        let memos_order = self.memo_ids();

        StoredCollection {
            id: self.id.clone(),
            name: self.name.clone(),
            description: self.description.clone(),
            tags: self.tags.clone(),
            category: self.category.clone(),
            locale: self.locale.clone(),
            contributors: self.contributors.clone(),
            resources: self.resources.clone(),
            memos_amount: memos_order.len(),
            memos_order,
        }
    }
}
