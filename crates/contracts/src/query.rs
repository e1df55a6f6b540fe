//! Query - normalised search term

use serde::{Deserialize, Serialize};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;
use std::sync::Arc;

use crate::ContractError;

/// Search term flowing into the search-and-download stage.
///
/// Built with [`Query::parse`]: surrounding whitespace is dropped and inner
/// runs of whitespace collapse to a single space. Equality and hashing go
/// through [`Query::key`], the case-folded text, so `"Colombo"` followed by
/// `"colombo "` counts as a consecutive duplicate. The text sent to the search
/// endpoint keeps the spelling it was given.
///
/// # Examples
/// ```
/// use contracts::Query;
///
/// let q = Query::parse("  Scattered\tclouds ").unwrap();
/// assert_eq!(q.as_str(), "Scattered clouds");
/// assert_eq!(q.key(), "scattered clouds");
/// assert_eq!(q, "scattered CLOUDS".parse::<Query>().unwrap());
/// ```
#[derive(Clone, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Query {
    text: Arc<str>,
    key: Arc<str>,
}

impl Query {
    /// Longest accepted term, in characters
    pub const MAX_LEN: usize = 200;

    /// Normalise and validate a raw search term
    ///
    /// # Errors
    /// `ConfigValidation` for a term that is blank, longer than
    /// [`MAX_LEN`](Self::MAX_LEN) or contains control characters.
    pub fn parse(raw: &str) -> Result<Self, ContractError> {
        let text = raw.split_whitespace().collect::<Vec<_>>().join(" ");
        if text.is_empty() {
            return Err(ContractError::config_validation("query", "search term is blank"));
        }
        let len = text.chars().count();
        if len > Self::MAX_LEN {
            return Err(ContractError::config_validation(
                "query",
                format!("search term has {len} characters, at most {} allowed", Self::MAX_LEN),
            ));
        }
        if text.chars().any(char::is_control) {
            return Err(ContractError::config_validation(
                "query",
                format!("search term {text:?} contains control characters"),
            ));
        }

        let key = text.to_lowercase();
        Ok(Self {
            text: Arc::from(text),
            key: Arc::from(key),
        })
    }

    /// Normalised text, as sent to the search endpoint
    pub fn as_str(&self) -> &str {
        &self.text
    }

    /// Case-folded text that identifies the query
    pub fn key(&self) -> &str {
        &self.key
    }
}

impl FromStr for Query {
    type Err = ContractError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for Query {
    type Error = ContractError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::parse(&s)
    }
}

impl From<Query> for String {
    fn from(query: Query) -> Self {
        query.text.to_string()
    }
}

impl fmt::Display for Query {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

impl fmt::Debug for Query {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Query({:?})", self.text)
    }
}

impl PartialEq for Query {
    fn eq(&self, other: &Self) -> bool {
        self.key == other.key
    }
}

impl Eq for Query {}

impl Hash for Query {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.key.hash(state)
    }
}
