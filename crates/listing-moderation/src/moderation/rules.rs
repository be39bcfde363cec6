use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::domain::Listing;
use super::policy::{CategoryPolicy, PolicyTable};

/// Result of running the text and price rules against one listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleOutcome {
    pub approved: bool,
    pub reason: String,
}

impl RuleOutcome {
    fn approved() -> Self {
        Self {
            approved: true,
            reason: String::new(),
        }
    }

    fn rejected(reason: String) -> Self {
        Self {
            approved: false,
            reason,
        }
    }
}

/// Applies the category policy table to a listing's text and price, stopping at the
/// first failing rule.
#[derive(Debug, Clone)]
pub struct CategoryRuleEngine {
    table: Arc<PolicyTable>,
}

impl CategoryRuleEngine {
    pub fn new(table: Arc<PolicyTable>) -> Self {
        Self { table }
    }

    pub fn table(&self) -> &PolicyTable {
        &self.table
    }

    pub fn evaluate(&self, listing: &Listing) -> RuleOutcome {
        let policy = self.table.resolve(listing.category.as_deref());
        let content = listing.combined_text();

        match self.first_violation(policy, listing, &content) {
            Some(reason) => RuleOutcome::rejected(reason),
            None => RuleOutcome::approved(),
        }
    }

    fn first_violation(
        &self,
        policy: &CategoryPolicy,
        listing: &Listing,
        content: &str,
    ) -> Option<String> {
        let name = &policy.name;

        if let Some(term) = first_contained(self.table.global_forbidden(), content) {
            return Some(format!("[{name}] contains prohibited content: '{term}'"));
        }

        if let Some(term) = first_contained(&policy.forbidden_keywords, content) {
            return Some(format!(
                "[{name}] contains terms not allowed in this category: '{term}'"
            ));
        }

        if listing.price > policy.max_price {
            return Some(format!(
                "[{name}] price {} exceeds the maximum of {} for this category",
                listing.price.normalize(),
                policy.max_price.normalize()
            ));
        }

        let length = listing.description.chars().count();
        if length < policy.min_description_length {
            return Some(format!(
                "[{name}] description must be at least {} characters long (got {length})",
                policy.min_description_length
            ));
        }

        if !policy.required_keywords.is_empty()
            && first_contained(&policy.required_keywords, content).is_none()
        {
            let examples = policy
                .required_keywords
                .iter()
                .take(5)
                .map(String::as_str)
                .collect::<Vec<_>>()
                .join("', '");
            return Some(format!(
                "[{name}] listing must mention at least one category term such as '{examples}'"
            ));
        }

        if policy
            .suspicious_patterns
            .iter()
            .any(|pattern| pattern.is_match(content))
        {
            return Some(format!(
                "[{name}] content matches a suspicious pattern for this category"
            ));
        }

        None
    }
}

fn first_contained<'a>(terms: &'a [String], content: &str) -> Option<&'a str> {
    terms
        .iter()
        .find(|term| content.contains(term.as_str()))
        .map(String::as_str)
}
