use std::{fmt, sync::OnceLock};

use regex::Regex;
use run_report_core::config::DEFAULT_IDENTIFIER;
use sha2::{Digest, Sha256};

const MARKER_PREFIX: &str = "run-report";

/// Hidden marker identifying which failure(s) a comment represents.
///
/// Rendered as an HTML comment so it survives in the body without being
/// displayed: `<!-- run-report:{identifier} -->` for a summary document and
/// `<!-- run-report:{identifier}:{key} -->` for a single task, where `key`
/// is a digest of the task target.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Token {
    pub identifier: String,
    pub key: Option<String>,
}

impl Token {
    pub fn summary(identifier: &str) -> Self {
        Self { identifier: sanitize_identifier(identifier), key: None }
    }

    pub fn task(identifier: &str, target: &str) -> Self {
        Self { identifier: sanitize_identifier(identifier), key: Some(target_key(target)) }
    }

    /// Every token embedded in `body`, in order of appearance.
    pub fn find_all(body: &str) -> Vec<Self> {
        static REGEX: OnceLock<Regex> = OnceLock::new();
        let regex = REGEX.get_or_init(|| {
            Regex::new(&format!(
                r"<!-- {}:(?P<identifier>[^:\s]+)(?::(?P<key>[0-9a-f]+))? -->",
                regex::escape(MARKER_PREFIX)
            ))
            .unwrap()
        });
        regex
            .captures_iter(body)
            .filter_map(|caps| {
                let identifier = caps.name("identifier")?.as_str().to_string();
                let key = caps.name("key").map(|m| m.as_str().to_string());
                Some(Self { identifier, key })
            })
            .collect()
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.key {
            Some(key) => write!(f, "<!-- {MARKER_PREFIX}:{}:{key} -->", self.identifier),
            None => write!(f, "<!-- {MARKER_PREFIX}:{} -->", self.identifier),
        }
    }
}

fn target_key(target: &str) -> String {
    let digest = Sha256::digest(target.trim().as_bytes());
    hex::encode(&digest[..8])
}

/// Identifiers must not contain whitespace or `:`, which delimit the marker,
/// or `>`, which could close the HTML comment early.
pub fn sanitize_identifier(identifier: &str) -> String {
    let sanitized = identifier
        .trim()
        .chars()
        .map(|c| if c.is_whitespace() || c == ':' || c == '>' { '-' } else { c })
        .collect::<String>();
    if sanitized.is_empty() { DEFAULT_IDENTIFIER.to_string() } else { sanitized }
}
