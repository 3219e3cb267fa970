// Copyright 2025 New Vector Ltd.
//
// SPDX-License-Identifier: AGPL-3.0-only
// Please see LICENSE in the repository root for full details.

//! Types for the [scope] parameter of authorization requests and tokens.
//!
//! A scope is a space-separated set of tokens; each token is a sequence of
//! printable ASCII characters excluding space, `"` and `\`, per [RFC 6749
//! section 3.3].
//!
//! [scope]: https://www.rfc-editor.org/rfc/rfc6749#section-3.3
//! [RFC 6749 section 3.3]: https://www.rfc-editor.org/rfc/rfc6749#section-3.3

use std::{borrow::Cow, collections::BTreeSet, ops::Deref, str::FromStr};

use serde::{Deserialize, Serialize, de};
use thiserror::Error;

/// The error type returned when a scope or scope token is invalid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("invalid scope format")]
pub struct InvalidScope;

/// The `base` scope, implicitly granted to every token.
pub const BASE: ScopeToken = ScopeToken(Cow::Borrowed("base"));

/// The `offline` scope, which makes the grant eligible for a refresh token.
pub const OFFLINE: ScopeToken = ScopeToken(Cow::Borrowed("offline"));

/// A single scope token.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ScopeToken(Cow<'static, str>);

impl ScopeToken {
    /// Create a `ScopeToken` from a static string. The validity of it is not
    /// checked since it has to be valid in const contexts
    #[must_use]
    pub const fn from_static(token: &'static str) -> Self {
        Self(Cow::Borrowed(token))
    }

    /// Get the scope token as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

// As per RFC 6749 appendix A:
//
//    NQCHAR = %x21 / %x23-5B / %x5D-7E
fn nqchar(c: char) -> bool {
    matches!(c, '\x21' | '\x23'..='\x5B' | '\x5D'..='\x7E')
}

impl FromStr for ScopeToken {
    type Err = InvalidScope;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if !s.is_empty() && s.chars().all(nqchar) {
            Ok(Self(Cow::Owned(s.into())))
        } else {
            Err(InvalidScope)
        }
    }
}

impl std::fmt::Display for ScopeToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A set of scope tokens.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Scope(BTreeSet<ScopeToken>);

impl Deref for Scope {
    type Target = BTreeSet<ScopeToken>;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl FromStr for Scope {
    type Err = InvalidScope;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let scopes: Result<BTreeSet<ScopeToken>, InvalidScope> = s
            .split(' ')
            .filter(|t| !t.is_empty())
            .map(ScopeToken::from_str)
            .collect();

        Ok(Self(scopes?))
    }
}

impl Scope {
    /// Whether the scope is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// The number of tokens in the scope.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the scope contains the given token.
    #[must_use]
    pub fn contains(&self, token: &ScopeToken) -> bool {
        self.0.contains(token)
    }

    /// Insert the given token in the scope. Returns whether the token was
    /// newly inserted.
    pub fn insert(&mut self, token: ScopeToken) -> bool {
        self.0.insert(token)
    }

    /// Whether every token of this scope is also in `other`.
    #[must_use]
    pub fn is_subset_of(&self, other: &Scope) -> bool {
        self.0.is_subset(&other.0)
    }
}

impl std::fmt::Display for Scope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for (index, token) in self.0.iter().enumerate() {
            if index > 0 {
                write!(f, " ")?;
            }

            write!(f, "{token}")?;
        }

        Ok(())
    }
}

impl FromIterator<ScopeToken> for Scope {
    fn from_iter<T: IntoIterator<Item = ScopeToken>>(iter: T) -> Self {
        Self(BTreeSet::from_iter(iter))
    }
}

impl IntoIterator for Scope {
    type Item = ScopeToken;
    type IntoIter = std::collections::btree_set::IntoIter<ScopeToken>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl Serialize for Scope {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for Scope {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let scope = String::deserialize(deserializer)?;
        Scope::from_str(&scope).map_err(de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use super::*;

    #[test]
    fn parse_scope_token() {
        assert_eq!(ScopeToken::from_str("base"), Ok(BASE));
        assert_eq!(ScopeToken::from_str(""), Err(InvalidScope));
        assert_eq!(ScopeToken::from_str("with space"), Err(InvalidScope));
        assert_eq!(ScopeToken::from_str("with\"quote"), Err(InvalidScope));
        assert_eq!(ScopeToken::from_str("with\\backslash"), Err(InvalidScope));
    }

    #[test]
    fn parse_scope() {
        let scope = Scope::from_str("base offline base").unwrap();
        // Duplicates are deduplicated
        assert_eq!(scope.len(), 2);
        assert!(scope.contains(&BASE));
        assert!(scope.contains(&OFFLINE));

        // Extra spaces are ignored
        let scope = Scope::from_str("  base   offline ").unwrap();
        assert_eq!(scope.len(), 2);

        assert_eq!(Scope::from_str("base inva\"lid"), Err(InvalidScope));
    }

    #[test]
    fn display_scope_is_sorted() {
        let scope: Scope = [OFFLINE, BASE].into_iter().collect();
        assert_eq!(scope.to_string(), "base offline");
    }

    #[test]
    fn subset() {
        let granted = Scope::from_str("base offline").unwrap();
        let requested = Scope::from_str("base").unwrap();
        assert!(requested.is_subset_of(&granted));
        assert!(!granted.is_subset_of(&requested));
    }
}
