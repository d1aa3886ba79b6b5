//! Finding the single field a raw GraphQL query asks for.
//!
//! Routing only needs `(operation type, field name)`, so extraction sits
//! behind [`FieldExtractor`]. [`HeuristicFieldExtractor`] is a whitespace
//! token scan: it knows nothing about aliases, fragments, nested selection
//! sets or multiple top-level fields, and it takes an operation name that has
//! no argument list for the field. [`DocumentFieldExtractor`] parses the
//! document with `graphql-parser` instead.

use graphql_parser::query::{Definition, OperationDefinition, Selection, SelectionSet, parse_query};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::{Error, Result};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OperationType {
    Query,
    Mutation,
    Subscription,
}

impl OperationType {
    pub fn keyword(self) -> &'static str {
        match self {
            OperationType::Query => "query",
            OperationType::Mutation => "mutation",
            OperationType::Subscription => "subscription",
        }
    }
}

impl fmt::Display for OperationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.keyword())
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ParsedOperation {
    pub operation_type: OperationType,
    pub field_name: String,
}

pub trait FieldExtractor {
    fn extract(&self, query: &str) -> Result<ParsedOperation>;
}

#[derive(Clone, Copy, Debug, Default)]
pub struct HeuristicFieldExtractor;

impl HeuristicFieldExtractor {
    pub fn new() -> Self {
        HeuristicFieldExtractor
    }
}

// Blank lines and `#` comment lines are dropped, the rest joined with single spaces.
fn normalize(query: &str) -> String {
    query
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .collect::<Vec<_>>()
        .join(" ")
}

fn detect_operation_type(normalized: &str) -> OperationType {
    let lowered = normalized.to_lowercase();
    [OperationType::Mutation, OperationType::Subscription]
        .into_iter()
        .find(|op| lowered.starts_with(op.keyword()))
        .unwrap_or(OperationType::Query)
}

impl FieldExtractor for HeuristicFieldExtractor {
    fn extract(&self, query: &str) -> Result<ParsedOperation> {
        let normalized = normalize(query);
        let operation_type = detect_operation_type(&normalized);

        for token in normalized.split_whitespace() {
            if token == "{" || token == operation_type.keyword() {
                continue;
            }
            // Operation name with an argument list, e.g. `GetUser($id:`.
            if token.contains('(') {
                continue;
            }
            let field_name = token.trim_end_matches(['{', '(']);
            if field_name.is_empty() {
                continue;
            }
            return Ok(ParsedOperation {
                operation_type,
                field_name: field_name.to_string(),
            });
        }

        Err(Error::parse("could not extract field name from query"))
    }
}

/// Extraction backed by a real GraphQL parser. Takes the first field of the
/// first operation in the document; aliases resolve to the underlying field.
#[derive(Clone, Copy, Debug, Default)]
pub struct DocumentFieldExtractor;

impl DocumentFieldExtractor {
    pub fn new() -> Self {
        DocumentFieldExtractor
    }
}

fn first_field(selection_set: &SelectionSet<'_, String>) -> Option<String> {
    selection_set.items.iter().find_map(|selection| match selection {
        Selection::Field(field) => Some(field.name.clone()),
        Selection::InlineFragment(fragment) => first_field(&fragment.selection_set),
        Selection::FragmentSpread(_) => None,
    })
}

impl FieldExtractor for DocumentFieldExtractor {
    fn extract(&self, query: &str) -> Result<ParsedOperation> {
        let document = parse_query::<String>(query).map_err(|e| Error::parse(e.to_string()))?;

        let operation = document
            .definitions
            .iter()
            .find_map(|definition| match definition {
                Definition::Operation(op) => Some(op),
                Definition::Fragment(_) => None,
            })
            .ok_or_else(|| Error::parse("document has no operation"))?;

        let (operation_type, selection_set) = match operation {
            OperationDefinition::SelectionSet(set) => (OperationType::Query, set),
            OperationDefinition::Query(q) => (OperationType::Query, &q.selection_set),
            OperationDefinition::Mutation(m) => (OperationType::Mutation, &m.selection_set),
            OperationDefinition::Subscription(s) => {
                (OperationType::Subscription, &s.selection_set)
            }
        };

        let field_name = first_field(selection_set)
            .ok_or_else(|| Error::parse("operation selects no field"))?;
        Ok(ParsedOperation {
            operation_type,
            field_name,
        })
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExtractorKind {
    #[default]
    Heuristic,
    Document,
}

impl ExtractorKind {
    pub fn build(self) -> Box<dyn FieldExtractor + Send + Sync> {
        match self {
            ExtractorKind::Heuristic => Box::new(HeuristicFieldExtractor::new()),
            ExtractorKind::Document => Box::new(DocumentFieldExtractor::new()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn heuristic(query: &str) -> Result<ParsedOperation> {
        HeuristicFieldExtractor::new().extract(query)
    }

    fn parsed(operation_type: OperationType, field_name: &str) -> ParsedOperation {
        ParsedOperation {
            operation_type,
            field_name: field_name.to_string(),
        }
    }

    #[test]
    fn keyword_followed_by_field() {
        assert_eq!(
            heuristic("query { users { id } }").unwrap(),
            parsed(OperationType::Query, "users")
        );
        assert_eq!(
            heuristic("mutation { deleteAll }").unwrap(),
            parsed(OperationType::Mutation, "deleteAll")
        );
        assert_eq!(
            heuristic("subscription { onEvent { id } }").unwrap(),
            parsed(OperationType::Subscription, "onEvent")
        );
    }

    #[test]
    fn trailing_brace_and_paren_are_trimmed() {
        assert_eq!(heuristic("query { users{ id } }").unwrap().field_name, "users");
        assert_eq!(heuristic("query {\n  hero{\n name }\n}").unwrap().field_name, "hero");
    }

    #[test]
    fn missing_keyword_defaults_to_query() {
        assert_eq!(
            heuristic("{ hero { name } }").unwrap(),
            parsed(OperationType::Query, "hero")
        );
    }

    #[test]
    fn keyword_detection_ignores_case_but_skipping_does_not() {
        assert_eq!(
            heuristic("MUTATION { reset }").unwrap(),
            parsed(OperationType::Mutation, "MUTATION")
        );
        assert_eq!(
            heuristic("QUERY { users }").unwrap(),
            parsed(OperationType::Query, "QUERY")
        );
    }

    #[test]
    fn comments_and_blank_lines_are_skipped() {
        let query = "# fetch everyone\n\n   # another comment\nquery {\n\n  users {\n    id\n  }\n}\n";
        assert_eq!(heuristic(query).unwrap().field_name, "users");
    }

    #[test]
    fn operation_name_with_arguments_is_skipped() {
        let query = "query GetUsers($first:Int) { users { id } }";
        assert_eq!(heuristic(query).unwrap().field_name, "users");
    }

    #[test]
    fn bare_operation_name_is_taken_as_the_field() {
        assert_eq!(
            heuristic("query GetUsers { users { id } }").unwrap().field_name,
            "GetUsers"
        );
    }

    #[test]
    fn empty_queries_fail() {
        assert!(matches!(heuristic(""), Err(Error::Parse(_))));
        assert!(matches!(heuristic("# only a comment\n"), Err(Error::Parse(_))));
        assert!(matches!(heuristic("query {"), Err(Error::Parse(_))));
        assert_eq!(
            heuristic("").unwrap_err().to_string(),
            "failed to parse query: could not extract field name from query"
        );
    }

    #[test]
    fn document_extractor_reads_the_first_root_field() {
        let extractor = DocumentFieldExtractor::new();
        assert_eq!(
            extractor.extract("query GetUsers { everyone: users { id } }").unwrap(),
            parsed(OperationType::Query, "users")
        );
        assert_eq!(
            extractor.extract("{ hero { name } }").unwrap(),
            parsed(OperationType::Query, "hero")
        );
        assert_eq!(
            extractor
                .extract("mutation AddUser($name: String!) { createUser(name: $name) { id } }")
                .unwrap(),
            parsed(OperationType::Mutation, "createUser")
        );
    }

    #[test]
    fn document_extractor_rejects_invalid_documents() {
        let extractor = DocumentFieldExtractor::new();
        assert!(matches!(extractor.extract("query {"), Err(Error::Parse(_))));
        assert!(matches!(
            extractor.extract("fragment F on User { id }"),
            Err(Error::Parse(_))
        ));
    }

    #[test]
    fn extractor_kind_deserializes_lowercase() {
        let kind: ExtractorKind = serde_yaml::from_str("document").unwrap();
        assert_eq!(kind, ExtractorKind::Document);
        assert_eq!(ExtractorKind::default(), ExtractorKind::Heuristic);
    }
}
