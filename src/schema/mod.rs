//! Schema validation for collections and memos.
//!
//! Raw documents go through parse-then-validate-then-construct: a failure at any
//! step yields [`AppError::Serialization`] naming the schema and every violation.
//! Already-typed entities are re-checked with [`validate`], which reports
//! [`AppError::Validation`] instead.

use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::errors::AppError;
use crate::models::{ContentRun, LocalCollection, Memo, StoredCollection};

/// Default upper bound for short strings (ids, names, categories).
pub const MAX_STRING_LENGTH: usize = 255;
/// Upper bound for a collection description.
pub const MAX_DESCRIPTION_LENGTH: usize = 10_000;
/// Upper bound for a single run of memo content.
pub const MAX_CONTENT_LENGTH: usize = 10_000;

/// An entity with a named schema and a set of structural rules.
pub trait Validate {
    /// Schema name reported in serialization errors.
    const SCHEMA: &'static str;

    /// Every rule this entity breaks, as human readable messages.
    fn violations(&self) -> Vec<String>;
}

/// Deserialize a raw document and check it against its schema.
pub fn parse_value<T>(raw: Value) -> Result<T, AppError>
where
    T: DeserializeOwned + Validate,
{
    let entity: T = serde_json::from_value(raw).map_err(|err| AppError::Serialization {
        schema: T::SCHEMA.to_string(),
        details: vec![err.to_string()],
    })?;

    let details = entity.violations();
    if !details.is_empty() {
        return Err(AppError::Serialization {
            schema: T::SCHEMA.to_string(),
            details,
        });
    }

    Ok(entity)
}

/// Parse a JSON string and check it against its schema.
pub fn parse_str<T>(raw: &str) -> Result<T, AppError>
where
    T: DeserializeOwned + Validate,
{
    let value: Value = serde_json::from_str(raw).map_err(|err| AppError::Serialization {
        schema: T::SCHEMA.to_string(),
        details: vec![err.to_string()],
    })?;
    parse_value(value)
}

/// Check an entity about to be persisted, reporting failures as serialization errors.
pub fn ensure_serializable<T: Validate>(entity: &T) -> Result<(), AppError> {
    let details = entity.violations();
    if details.is_empty() {
        Ok(())
    } else {
        Err(AppError::Serialization {
            schema: T::SCHEMA.to_string(),
            details,
        })
    }
}

/// Check a typed entity's invariants.
pub fn validate<T: Validate>(entity: &T) -> Result<(), AppError> {
    let details = entity.violations();
    if details.is_empty() {
        Ok(())
    } else {
        Err(AppError::Validation(details.join(", ")))
    }
}

impl Validate for Memo {
    const SCHEMA: &'static str = "memo";

    fn violations(&self) -> Vec<String> {
        let mut rules = Rules::default();
        rules.memo("", self);
        rules.into_inner()
    }
}

impl Validate for LocalCollection {
    const SCHEMA: &'static str = "local-public-collection";

    fn violations(&self) -> Vec<String> {
        let mut rules = Rules::default();
        rules.public_collection(
            &self.id,
            &self.name,
            &self.description,
            &self.tags,
            &self.category,
            self.locale.as_deref(),
        );
        rules.contributors(&self.contributors);
        rules.resources(&self.resources);

        rules.non_empty_unique("memos", &self.memos);
        let mut seen: Vec<&str> = Vec::with_capacity(self.memos.len());
        for (index, memo) in self.memos.iter().enumerate() {
            let prefix = format!("memos[{}].", index);
            rules.memo(&prefix, memo);
            if seen.contains(&memo.id.as_str()) {
                rules.push(format!("\"{}id\" contains a duplicate memo id \"{}\"", prefix, memo.id));
            }
            seen.push(&memo.id);
        }

        rules.into_inner()
    }
}

impl Validate for StoredCollection {
    const SCHEMA: &'static str = "stored-public-collection";

    fn violations(&self) -> Vec<String> {
        let mut rules = Rules::default();
        rules.public_collection(
            &self.id,
            &self.name,
            &self.description,
            &self.tags,
            &self.category,
            self.locale.as_deref(),
        );
        rules.contributors(&self.contributors);
        rules.resources(&self.resources);

        if self.memos_amount < 1 {
            rules.push("\"memosAmount\" must be greater than or equal to 1".to_string());
        }
        if self.memos_order.len() != self.memos_amount {
            rules.push(format!("\"memosOrder\" must contain {} items", self.memos_amount));
        }
        rules.unique("memosOrder", &self.memos_order);
        for (index, id) in self.memos_order.iter().enumerate() {
            rules.string(&format!("memosOrder[{}]", index), id, MAX_STRING_LENGTH);
        }

        rules.into_inner()
    }
}

/// Collects rule violations with field paths.
#[derive(Default)]
struct Rules(Vec<String>);

impl Rules {
    fn push(&mut self, message: String) {
        self.0.push(message);
    }

    fn into_inner(self) -> Vec<String> {
        self.0
    }

    fn string(&mut self, field: &str, value: &str, max: usize) {
        if value.is_empty() {
            self.push(format!("\"{}\" is not allowed to be empty", field));
        } else if value.chars().count() > max {
            self.push(format!(
                "\"{}\" length must be less than or equal to {} characters long",
                field, max
            ));
        }
    }

    fn uri(&mut self, field: &str, value: &str) {
        if url::Url::parse(value).is_err() {
            self.push(format!("\"{}\" must be a valid uri", field));
        }
    }

    fn unique<T: PartialEq>(&mut self, field: &str, items: &[T]) {
        for (index, item) in items.iter().enumerate() {
            if items[..index].contains(item) {
                self.push(format!("\"{}[{}]\" contains a duplicate value", field, index));
            }
        }
    }

    fn non_empty_unique<T: PartialEq>(&mut self, field: &str, items: &[T]) {
        if items.is_empty() {
            self.push(format!("\"{}\" must contain at least 1 items", field));
        }
        self.unique(field, items);
    }

    fn public_collection(
        &mut self,
        id: &str,
        name: &str,
        description: &str,
        tags: &[String],
        category: &str,
        locale: Option<&str>,
    ) {
        self.string("id", id, MAX_STRING_LENGTH);
        self.string("name", name, MAX_STRING_LENGTH);
        self.string("description", description, MAX_DESCRIPTION_LENGTH);
        self.string("category", category, MAX_STRING_LENGTH);
        if let Some(locale) = locale {
            self.string("locale", locale, MAX_STRING_LENGTH);
        }

        self.non_empty_unique("tags", tags);
        for (index, tag) in tags.iter().enumerate() {
            self.string(&format!("tags[{}]", index), tag, MAX_STRING_LENGTH);
        }
    }

    fn contributors(&mut self, contributors: &[crate::models::Contributor]) {
        self.non_empty_unique("contributors", contributors);
        for (index, contributor) in contributors.iter().enumerate() {
            self.string(&format!("contributors[{}].name", index), &contributor.name, MAX_STRING_LENGTH);
            self.uri(&format!("contributors[{}].url", index), &contributor.url);
            self.uri(&format!("contributors[{}].avatarUrl", index), &contributor.avatar_url);
        }
    }

    fn resources(&mut self, resources: &[crate::models::Resource]) {
        self.non_empty_unique("resources", resources);
        for (index, resource) in resources.iter().enumerate() {
            self.string(
                &format!("resources[{}].description", index),
                &resource.description,
                MAX_STRING_LENGTH,
            );
            self.uri(&format!("resources[{}].url", index), &resource.url);
        }
    }

    fn memo(&mut self, prefix: &str, memo: &Memo) {
        self.string(&format!("{}id", prefix), &memo.id, MAX_STRING_LENGTH);
        self.content(&format!("{}question", prefix), &memo.question);
        self.content(&format!("{}answer", prefix), &memo.answer);
    }

    fn content(&mut self, field: &str, runs: &[ContentRun]) {
        if runs.is_empty() {
            self.push(format!("\"{}\" must contain at least 1 items", field));
        }
        for (index, run) in runs.iter().enumerate() {
            self.string(&format!("{}[{}].insert", field, index), &run.insert, MAX_CONTENT_LENGTH);
            if run.attributes.as_ref().is_some_and(|attributes| attributes.is_empty()) {
                self.push(format!("\"{}[{}].attributes\" must have at least 1 key", field, index));
            }
        }
    }
}
