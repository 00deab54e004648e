use crate::base::GovernanceRule;
use crate::Error;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::hash::{Hash, Hasher};

#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize, Hash)]
pub enum AuthorityStrategy {
    /// only the listed origins pass
    WhiteList,
    /// the listed origins are rejected
    BlackList,
}

impl Default for AuthorityStrategy {
    fn default() -> AuthorityStrategy {
        AuthorityStrategy::WhiteList
    }
}

/// Rule describes origin-based access control of a resource. `limit_app`
/// holds the listed origins, comma separated.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Rule {
    /// unique ID of the rule (optional)
    pub id: String,
    /// resource name
    pub resource: String,
    pub strategy: AuthorityStrategy,
    /// comma separated origin names this rule lists
    pub limit_app: String,
}

impl Default for Rule {
    fn default() -> Self {
        Rule {
            id: uuid::Uuid::new_v4().to_string(),
            resource: String::default(),
            strategy: AuthorityStrategy::default(),
            limit_app: String::default(),
        }
    }
}

impl Hash for Rule {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
        self.resource.hash(state);
    }
}

impl GovernanceRule for Rule {
    fn resource_name(&self) -> String {
        self.resource.clone()
    }

    fn is_valid(&self) -> crate::Result<()> {
        if self.resource.is_empty() {
            return Err(Error::msg("empty resource name"));
        }
        Ok(())
    }
}

impl PartialEq for Rule {
    fn eq(&self, other: &Self) -> bool {
        self.resource == other.resource
            && self.strategy == other.strategy
            && self.limit_app == other.limit_app
    }
}

impl Eq for Rule {}

impl fmt::Display for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let fmtted = serde_json::to_string_pretty(self).unwrap();
        write!(f, "{}", fmtted)
    }
}

impl Rule {
    /// Exact-match membership of `origin` in the comma separated list.
    /// The substring scan is only a cheap pre-filter.
    pub fn contains_origin(&self, origin: &str) -> bool {
        if !self.limit_app.contains(origin) {
            return false;
        }
        self.limit_app.split(',').any(|app| app == origin)
    }

    /// Whether a call from `origin` passes this rule. Empty origins and
    /// empty lists always pass.
    pub fn pass_check(&self, origin: &str) -> bool {
        if origin.is_empty() || self.limit_app.is_empty() {
            return true;
        }
        let contained = self.contains_origin(origin);
        match self.strategy {
            AuthorityStrategy::WhiteList => contained,
            AuthorityStrategy::BlackList => !contained,
        }
    }
}
