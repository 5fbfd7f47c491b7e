//! Composite identity keys
//!
//! Every managed object is addressed by a fixed-arity tuple that can be
//! written as a single string (for state files and `import`) and parsed back
//! without loss.

use crate::error::{CloudError, Result};
use std::fmt::Debug;

/// A composite key that uniquely addresses one remote object.
pub trait IdentityKey: Sized + Clone + PartialEq + Debug + Send + Sync {
    /// Resource type the key belongs to, used in error messages
    const RESOURCE_TYPE: &'static str;

    /// Number of parts in the key
    const ARITY: usize;

    /// Separator used when the key is written as one string
    const DELIMITER: char = '/';

    /// Whether the last part absorbs any further delimiters
    /// (e.g. an ARN containing `/`)
    const TRAILING_REMAINDER: bool = false;

    /// Key parts in order
    fn parts(&self) -> Vec<&str>;

    /// Build the key from exactly `ARITY` non-empty parts
    fn from_parts(parts: Vec<String>) -> Self;

    /// Parse a delimited string into the key
    fn parse(raw: &str) -> Result<Self> {
        split_id(
            raw,
            Self::ARITY,
            Self::DELIMITER,
            Self::TRAILING_REMAINDER,
            Self::RESOURCE_TYPE,
        )
        .map(Self::from_parts)
    }

    /// Render the key as a delimited string
    fn to_id(&self) -> String {
        let mut buf = [0u8; 4];
        let delimiter = Self::DELIMITER.encode_utf8(&mut buf);
        self.parts().join(delimiter)
    }
}

/// Split `raw` into exactly `arity` non-empty parts.
pub fn split_id(
    raw: &str,
    arity: usize,
    delimiter: char,
    trailing_remainder: bool,
    resource_type: &'static str,
) -> Result<Vec<String>> {
    let invalid = |reason: String| CloudError::InvalidImportId {
        resource_type,
        raw: raw.to_string(),
        reason,
    };

    let parts: Vec<&str> = if trailing_remainder {
        raw.splitn(arity, delimiter).collect()
    } else {
        raw.split(delimiter).collect()
    };

    if parts.len() != arity {
        let expected = (1..=arity)
            .map(|i| format!("PART{}", i))
            .collect::<Vec<_>>()
            .join(&delimiter.to_string());
        return Err(invalid(format!(
            "expected {} part(s) in the form {}, found {}",
            arity,
            expected,
            parts.len()
        )));
    }

    if let Some(pos) = parts.iter().position(|p| p.is_empty()) {
        return Err(invalid(format!("part {} is empty", pos + 1)));
    }

    Ok(parts.into_iter().map(str::to_string).collect())
}
