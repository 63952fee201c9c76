use std::collections::HashSet;

use serde::Serialize;

use quill_core::{DomainError, DomainResult, Entity, HashTagId};

use crate::post::reject_nul;

/// Longest accepted hashtag name, in characters.
pub const MAX_HASHTAG_LEN: usize = 50;

/// Most hashtags a single post may carry, counted before deduplication.
pub const MAX_HASHTAGS_PER_POST: usize = 20;

/// Normalized hashtag name.
///
/// Surrounding whitespace and a single leading `#` are stripped, so `" #rust "`
/// and `"rust"` name the same tag. Two names are the same tag iff they are equal.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct HashTagName(String);

impl HashTagName {
    pub fn parse(raw: &str) -> DomainResult<Self> {
        let trimmed = raw.trim();
        let name = trimmed.strip_prefix('#').unwrap_or(trimmed);

        reject_nul("hashtag name", name)?;
        if name.is_empty() {
            return Err(DomainError::validation("hashtag name cannot be empty"));
        }
        if name.chars().count() > MAX_HASHTAG_LEN {
            return Err(DomainError::validation(format!(
                "hashtag name cannot exceed {MAX_HASHTAG_LEN} characters"
            )));
        }
        if name.chars().any(char::is_whitespace) {
            return Err(DomainError::validation(format!(
                "hashtag name cannot contain whitespace: '{name}'"
            )));
        }

        Ok(Self(name.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl core::fmt::Display for HashTagName {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}

/// A stored hashtag. Names are unique across the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HashTag {
    pub id: HashTagId,
    pub name: HashTagName,
}

impl HashTag {
    pub fn new(name: HashTagName) -> Self {
        Self {
            id: HashTagId::new(),
            name,
        }
    }
}

impl Entity for HashTag {
    type Id = HashTagId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}

/// Parse a client-supplied list of names into a duplicate-free set.
///
/// Order of first occurrence is kept; the first invalid name fails the whole
/// list, as does a list with more than [`MAX_HASHTAGS_PER_POST`] entries.
pub fn normalize_hashtags<I, S>(raw: I) -> DomainResult<Vec<HashTagName>>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut seen = HashSet::new();
    let mut names = Vec::new();
    for (i, r) in raw.into_iter().enumerate() {
        if i >= MAX_HASHTAGS_PER_POST {
            return Err(DomainError::validation(format!(
                "a post cannot have more than {MAX_HASHTAGS_PER_POST} hashtags"
            )));
        }
        let name = HashTagName::parse(r.as_ref())?;
        if seen.insert(name.clone()) {
            names.push(name);
        }
    }
    Ok(names)
}
