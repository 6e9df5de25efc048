//! Resource tags.

use crate::error::{Result, StratusError};
use serde::{Deserialize, Serialize};

/// Key reserved for the display name of launched instances.
pub const NAME_TAG: &str = "Name";

/// Key/value pair attached to every provisioned resource.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Tag {
    pub key: String,
    pub value: String,
}

impl Tag {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self { key: key.into(), value: value.into() }
    }
}

/// Parse `key1=value1,key2=value2` into tags, keeping input order.
///
/// Values may contain `=`; keys may not be empty.
pub fn parse_tags(input: &str) -> Result<Vec<Tag>> {
    let mut tags = Vec::new();
    for pair in input.split(',') {
        let pair = pair.trim();
        if pair.is_empty() {
            continue;
        }
        match pair.split_once('=') {
            Some((key, value)) if !key.trim().is_empty() => {
                tags.push(Tag::new(key.trim(), value.trim()));
            }
            _ => {
                return Err(StratusError::validation(format!(
                    "Tag input '{}' is malformed. Tags must be specified as key=value pairs separated by commas",
                    pair
                )));
            }
        }
    }
    Ok(tags)
}
