//! Query-parameter composition.
//!
//! # Design
//! Callers pass their own filters as an ordered list. Some names are
//! controlled by the client from contextual identifiers (the company id, the
//! batch of document ids). `compose` strips any caller-supplied entry for a
//! managed name and appends the managed values in a fixed order, so the
//! result never carries two `company_id` entries and composing twice is the
//! same as composing once.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::types::ResourceId;

/// A single `name=value` query-string pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryParameter {
    pub name: String,
    pub value: String,
}

impl QueryParameter {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

/// Names the composer controls. Variant order is the order in which managed
/// values are appended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ManagedName {
    CompanyId,
    Installments,
}

impl ManagedName {
    pub fn as_str(self) -> &'static str {
        match self {
            ManagedName::CompanyId => "company_id",
            ManagedName::Installments => "installments",
        }
    }
}

/// The managed names for one request and the value (if any) each one takes.
///
/// A name registered with no value still removes caller-supplied entries of
/// that name; it just isn't re-added.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ManagedParameters {
    entries: BTreeMap<ManagedName, Option<String>>,
}

impl ManagedParameters {
    pub fn new() -> Self {
        Self::default()
    }

    /// Manage `company_id`. Zero or `None` counts as absent.
    pub fn company_id(mut self, id: Option<ResourceId>) -> Self {
        let value = id.filter(|id| *id != 0).map(|id| id.to_string());
        self.entries.insert(ManagedName::CompanyId, value);
        self
    }

    /// Manage `installments` as a comma-joined id list. An empty slice counts
    /// as absent.
    pub fn installments(mut self, ids: &[ResourceId]) -> Self {
        let value = (!ids.is_empty()).then(|| {
            ids.iter()
                .map(ResourceId::to_string)
                .collect::<Vec<_>>()
                .join(",")
        });
        self.entries.insert(ManagedName::Installments, value);
        self
    }

    pub fn manages(&self, name: &str) -> bool {
        self.entries.keys().any(|managed| managed.as_str() == name)
    }
}

/// Merge caller filters with the managed identifiers.
pub fn compose(existing: &[QueryParameter], managed: &ManagedParameters) -> Vec<QueryParameter> {
    let mut composed: Vec<QueryParameter> = existing
        .iter()
        .filter(|param| !managed.manages(&param.name))
        .cloned()
        .collect();

    for (name, value) in &managed.entries {
        if let Some(value) = value {
            composed.push(QueryParameter::new(name.as_str(), value.clone()));
        }
    }
    composed
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    fn names(params: &[QueryParameter]) -> Vec<&str> {
        params.iter().map(|p| p.name.as_str()).collect()
    }

    #[test]
    fn appends_company_id_when_present() {
        let managed = ManagedParameters::new().company_id(Some(7));
        let composed = compose(&[QueryParameter::new("status", "open")], &managed);
        assert_eq!(
            composed,
            vec![
                QueryParameter::new("status", "open"),
                QueryParameter::new("company_id", "7"),
            ]
        );
    }

    #[test]
    fn caller_company_id_is_replaced() {
        let existing = vec![
            QueryParameter::new("company_id", "1"),
            QueryParameter::new("page", "2"),
            QueryParameter::new("company_id", "3"),
        ];
        let composed = compose(&existing, &ManagedParameters::new().company_id(Some(9)));
        assert_eq!(names(&composed), vec!["page", "company_id"]);
        assert_eq!(composed[1].value, "9");
    }

    #[test]
    fn absent_company_id_still_strips_caller_entry() {
        let existing = vec![QueryParameter::new("company_id", "1")];
        assert!(compose(&existing, &ManagedParameters::new().company_id(None)).is_empty());
        assert!(compose(&existing, &ManagedParameters::new().company_id(Some(0))).is_empty());
    }

    #[test]
    fn installments_are_comma_joined_after_company_id() {
        // Registration order does not matter; append order is fixed.
        let managed = ManagedParameters::new()
            .installments(&[10, 11, 12])
            .company_id(Some(5));
        let composed = compose(&[], &managed);
        assert_eq!(
            composed,
            vec![
                QueryParameter::new("company_id", "5"),
                QueryParameter::new("installments", "10,11,12"),
            ]
        );
    }

    #[test]
    fn unmanaged_parameters_keep_relative_order_and_duplicates() {
        let existing = vec![
            QueryParameter::new("b", "1"),
            QueryParameter::new("company_id", "4"),
            QueryParameter::new("a", "2"),
            QueryParameter::new("b", "3"),
        ];
        let composed = compose(&existing, &ManagedParameters::new().company_id(Some(1)));
        assert_eq!(names(&composed), vec!["b", "a", "b", "company_id"]);
    }

    #[test]
    fn composing_twice_equals_composing_once() {
        let existing = vec![
            QueryParameter::new("installments", "1"),
            QueryParameter::new("x", "y"),
        ];
        let managed = ManagedParameters::new().company_id(Some(2)).installments(&[3, 4]);
        let once = compose(&existing, &managed);
        let twice = compose(&once, &managed);
        assert_eq!(once, twice);
    }
}
