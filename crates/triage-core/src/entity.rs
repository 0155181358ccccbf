//! Tracker entities: the items being classified.
//!
//! An entity is either a numeric bug id on the primary tracker or a composite
//! `(platform, owner, repo, number)` issue reference on a secondary tracker.
//! Entities are immutable inputs; identity is their natural key.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::errors::CoreError;

/// Issue on a secondary tracker, e.g. `github/webcompat/web-bugs/12345`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct IssueRef {
    pub platform: String,
    pub owner: String,
    pub repo: String,
    pub number: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Entity {
    Bug { id: u64 },
    Issue(IssueRef),
}

impl Entity {
    #[must_use]
    pub const fn bug(id: u64) -> Self {
        Self::Bug { id }
    }

    /// Build an issue reference.
    ///
    /// # Errors
    ///
    /// Returns `CoreError::MalformedEntity` if a path segment is empty or
    /// contains a separator (`/`, `:`) or whitespace, since such a segment
    /// would make store keys and job keys ambiguous.
    pub fn issue(
        platform: impl Into<String>,
        owner: impl Into<String>,
        repo: impl Into<String>,
        number: u64,
    ) -> Result<Self, CoreError> {
        let issue = IssueRef {
            platform: platform.into(),
            owner: owner.into(),
            repo: repo.into(),
            number,
        };
        for segment in [&issue.platform, &issue.owner, &issue.repo] {
            if let Some(reason) = segment_problem(segment) {
                return Err(CoreError::MalformedEntity {
                    input: format!(
                        "{}/{}/{}/{}",
                        issue.platform, issue.owner, issue.repo, issue.number
                    ),
                    reason: reason.to_string(),
                });
            }
        }
        Ok(Self::Issue(issue))
    }

    /// Tagged key used inside job keys and storage rows.
    ///
    /// Unlike [`Display`](fmt::Display), the tag keeps bugs and issues in
    /// disjoint key spaces.
    #[must_use]
    pub fn store_key(&self) -> String {
        match self {
            Self::Bug { id } => format!("bug/{id}"),
            Self::Issue(issue) => format!(
                "issue/{}/{}/{}/{}",
                issue.platform, issue.owner, issue.repo, issue.number
            ),
        }
    }

    /// Message reported when the tracker does not know this entity.
    #[must_use]
    pub fn not_found_message(&self) -> String {
        match self {
            Self::Bug { id } => format!("Bug {id} not found"),
            Self::Issue(_) => format!("Issue {self} not found"),
        }
    }
}

fn segment_problem(segment: &str) -> Option<&'static str> {
    if segment.is_empty() {
        Some("empty path segment")
    } else if segment
        .chars()
        .any(|c| c == '/' || c == ':' || c.is_whitespace())
    {
        Some("path segment contains a separator or whitespace")
    } else {
        None
    }
}

/// Renders the identifier as a caller supplies it: `123` for bugs,
/// `github/webcompat/web-bugs/12345` for issues.
impl fmt::Display for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bug { id } => write!(f, "{id}"),
            Self::Issue(issue) => write!(
                f,
                "{}/{}/{}/{}",
                issue.platform, issue.owner, issue.repo, issue.number
            ),
        }
    }
}

impl FromStr for Entity {
    type Err = CoreError;

    /// Parse either display form or store-key form.
    fn from_str(input: &str) -> Result<Self, Self::Err> {
        let malformed = |reason: &str| CoreError::MalformedEntity {
            input: input.to_string(),
            reason: reason.to_string(),
        };

        let trimmed = input.trim();
        let body = trimmed.strip_prefix("bug/").unwrap_or(trimmed);
        if !body.is_empty() && body.bytes().all(|b| b.is_ascii_digit()) {
            let id = body
                .parse::<u64>()
                .map_err(|_| malformed("bug id out of range"))?;
            return Ok(Self::bug(id));
        }

        let body = trimmed.strip_prefix("issue/").unwrap_or(trimmed);
        let parts: Vec<&str> = body.split('/').collect();
        let [platform, owner, repo, number] = parts.as_slice() else {
            return Err(malformed(
                "expected a bug id or platform/owner/repo/number",
            ));
        };
        if let Some(reason) = [platform, owner, repo]
            .iter()
            .find_map(|part| segment_problem(part))
        {
            return Err(malformed(reason));
        }
        let number = number
            .parse::<u64>()
            .map_err(|_| malformed("issue number must be an unsigned integer"))?;
        Self::issue(*platform, *owner, *repo, number)
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    use super::*;

    #[test]
    fn bug_display_and_store_key() {
        let bug = Entity::bug(123_456);
        assert_eq!(bug.to_string(), "123456");
        assert_eq!(bug.store_key(), "bug/123456");
        assert_eq!(bug.not_found_message(), "Bug 123456 not found");
    }

    #[test]
    fn issue_display_and_store_key() {
        let issue = Entity::issue("github", "webcompat", "web-bugs", 12345).unwrap();
        assert_eq!(issue.to_string(), "github/webcompat/web-bugs/12345");
        assert_eq!(issue.store_key(), "issue/github/webcompat/web-bugs/12345");
    }

    #[rstest]
    #[case("123", Entity::bug(123))]
    #[case("bug/7890231", Entity::bug(7_890_231))]
    #[case(
        "github/webcompat/web-bugs/12345",
        Entity::issue("github", "webcompat", "web-bugs", 12345).unwrap()
    )]
    #[case(
        "issue/github/webcompat/web-bugs/1",
        Entity::issue("github", "webcompat", "web-bugs", 1).unwrap()
    )]
    fn parse_valid(#[case] input: &str, #[case] expected: Entity) {
        assert_eq!(input.parse::<Entity>().unwrap(), expected);
    }

    #[rstest]
    #[case("")]
    #[case("abc")]
    #[case("github/webcompat/web-bugs/abc")]
    #[case("github//web-bugs/1")]
    #[case("99999999999999999999999")]
    #[case("gitlab/org:team/repo/5")]
    #[case("github/web compat/repo/5")]
    fn parse_invalid(#[case] input: &str) {
        let err = input.parse::<Entity>().unwrap_err();
        assert!(matches!(err, CoreError::MalformedEntity { .. }), "{input}: {err}");
    }

    #[test]
    fn display_roundtrips_through_parse() {
        let issue = Entity::issue("github", "mozilla", "gecko-dev", 42).unwrap();
        assert_eq!(issue.to_string().parse::<Entity>().unwrap(), issue);
        assert_eq!(issue.store_key().parse::<Entity>().unwrap(), issue);
    }

    #[rstest]
    #[case("gitlab", "org:team", "repo")]
    #[case("gitlab", "org", "sub/repo")]
    #[case("", "org", "repo")]
    fn issue_rejects_ambiguous_segments(
        #[case] platform: &str,
        #[case] owner: &str,
        #[case] repo: &str,
    ) {
        let err = Entity::issue(platform, owner, repo, 5).unwrap_err();
        assert!(matches!(err, CoreError::MalformedEntity { .. }), "{err}");
    }

    #[test]
    fn serde_is_tagged() {
        let json = serde_json::to_value(Entity::bug(1)).unwrap();
        assert_eq!(json, serde_json::json!({"kind": "bug", "id": 1}));
        let json = serde_json::to_value(Entity::issue("github", "o", "r", 2).unwrap()).unwrap();
        assert_eq!(json["kind"], "issue");
        assert_eq!(json["number"], 2);
    }
}
