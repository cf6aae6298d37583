//! Group lookup and compiled parse plans.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use thiserror::Error;

use super::groups::{
    AgentScopeGroup, AggGroup, DurationGroup, FieldsGroup, Group, IntervalGroup, NameDataGroup,
    PassthroughGroup, StartEndGroup, PASSTHROUGH_KEYS,
};
use super::raw::RawQuery;
use super::result::ParseResult;

/// Marks a group as required.
const REQUIRED_PREFIX: char = '!';
/// Marks a group as disabled; it is skipped without being resolved.
const DISABLED_PREFIX: char = '/';

/// Errors raised while resolving group tokens.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum QueryError {
    /// A token names a group that was never registered.
    #[error("unknown parse group {0}")]
    UnknownGroup(String),
}

/// Named parse groups available to route schemas.
///
/// Built once at startup and shared read-only afterwards.
#[derive(Clone)]
pub struct GroupRegistry {
    groups: HashMap<String, Arc<dyn Group>>,
}

impl GroupRegistry {
    /// A registry with no groups at all.
    pub fn empty() -> Self {
        Self {
            groups: HashMap::new(),
        }
    }

    /// A registry holding every built-in group.
    pub fn with_builtins() -> Self {
        let mut registry = Self::empty();
        registry.register("agentScope", AgentScopeGroup);
        registry.register("duration", DurationGroup);
        registry.register("nameData", NameDataGroup);
        registry.register("fields", FieldsGroup);
        registry.register("interval", IntervalGroup);
        registry.register("startEnd", StartEndGroup);
        registry.register("agg", AggGroup);
        for key in PASSTHROUGH_KEYS {
            registry.register_passthrough(key);
        }
        registry
    }

    /// Register (or replace) a group under `name`.
    pub fn register(&mut self, name: impl Into<String>, group: impl Group + 'static) {
        self.groups.insert(name.into(), Arc::new(group));
    }

    /// Register a passthrough group whose name is also its query key.
    pub fn register_passthrough(&mut self, key: impl Into<String>) {
        let key = key.into();
        self.register(key.clone(), PassthroughGroup::new(key));
    }

    pub fn contains(&self, name: &str) -> bool {
        self.groups.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    /// Resolve group tokens into a reusable plan.
    ///
    /// Fails on the first token (after prefix stripping) that has no group.
    pub fn compile<S: AsRef<str>>(&self, tokens: &[S]) -> Result<GroupPlan, QueryError> {
        let mut steps = Vec::with_capacity(tokens.len());

        for token in tokens {
            let token = token.as_ref();
            if token.starts_with(DISABLED_PREFIX) {
                continue;
            }

            let (name, required) = match token.strip_prefix(REQUIRED_PREFIX) {
                Some(name) => (name, true),
                None => (token, false),
            };

            let group = self
                .groups
                .get(name)
                .ok_or_else(|| QueryError::UnknownGroup(name.to_string()))?;

            steps.push(PlanStep {
                name: name.to_string(),
                group: Arc::clone(group),
                required,
            });
        }

        Ok(GroupPlan { steps })
    }

    /// Compile and run in one go.
    pub fn parse<S: AsRef<str>>(
        &self,
        tokens: &[S],
        query: &RawQuery,
    ) -> Result<ParseResult, QueryError> {
        Ok(self.compile(tokens)?.run(query))
    }
}

impl Default for GroupRegistry {
    fn default() -> Self {
        Self::with_builtins()
    }
}

impl fmt::Debug for GroupRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<&str> = self.groups.keys().map(String::as_str).collect();
        names.sort_unstable();
        f.debug_struct("GroupRegistry").field("groups", &names).finish()
    }
}

#[derive(Clone, Debug)]
struct PlanStep {
    name: String,
    group: Arc<dyn Group>,
    required: bool,
}

/// An ordered, fully resolved list of groups. Running it cannot fail.
#[derive(Clone, Debug, Default)]
pub struct GroupPlan {
    steps: Vec<PlanStep>,
}

impl GroupPlan {
    /// Validate `query` against every group in order.
    pub fn run(&self, query: &RawQuery) -> ParseResult {
        let mut working = query.pruned();
        let mut out = ParseResult::new();

        for step in &self.steps {
            step.group.parse(&mut working, &mut out, step.required);
        }

        out.apply_semantic_rules();

        for key in working.keys() {
            out.warn(format!("unknown query string param \"{key}\""));
        }

        out
    }

    /// Names of the groups in run order.
    pub fn group_names(&self) -> impl Iterator<Item = &str> {
        self.steps.iter().map(|s| s.name.as_str())
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }
}
