//! Correlation of error locations with nodes of a submitted document.
//!
//! Each error location is resolved to a node of the parsed document and the
//! node is given a stable identifier. Display layers use the resulting
//! location-to-identifier map to anchor messages to the exact element they
//! describe.
//!
//! The document model is immutable. Identifiers live in an
//! [`ErrorIdAssignments`] map threaded through every call that works on the
//! same document, which makes assignment idempotent across error groups.
//! [`ErrorIdAssignments::annotate`] renders the identifiers back onto the
//! document text when an annotated copy is needed.
//!
//! # Invariants
//!
//! - Every node referenced by at least one resolvable location carries
//!   exactly one identifier for the lifetime of its assignments map.
//! - An identifier already present on the node in the source document is
//!   reused, never replaced.
//! - Locations that cannot be resolved are dropped from the map.

mod locator;


use std::collections::{BTreeMap, HashMap, HashSet};

use roxmltree::{Document, Node, NodeId};
use serde::{Deserialize, Serialize};
use tracing::debug;

pub use locator::{LocationError, LocationPath, LocationPathResolver, NodeResolver, ResolvedNode};

use crate::config::CorrelationConfig;
use crate::model::ExecutionError;

/// Parses document bytes into a tree the correlator can work on.
///
/// DTDs are accepted; QRDA exports occasionally carry one.
///
/// # Errors
///
/// Returns the parser error for malformed XML.
pub fn parse_document(text: &str) -> Result<Document<'_>, roxmltree::Error> {
    let options = roxmltree::ParsingOptions {
        allow_dtd: true,
        ..roxmltree::ParsingOptions::default()
    };
    Document::parse_with_options(text, options)
}

// =============================================================================
// Identifier assignments
// =============================================================================

#[derive(Debug, Clone)]
struct Assignment {
    id: String,
    from_source: bool,
}

/// Identifiers assigned to the nodes of one parsed document.
///
/// Node ids are only meaningful for the document they were taken from; a
/// map must not be shared between documents.
#[derive(Debug, Clone, Default)]
pub struct ErrorIdAssignments {
    ids: HashMap<NodeId, Assignment>,
}

impl ErrorIdAssignments {
    /// Creates an empty assignments map.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the identifier assigned to `node`, if any.
    #[must_use]
    pub fn get(&self, node: NodeId) -> Option<&str> {
        self.ids.get(&node).map(|a| a.id.as_str())
    }

    /// Returns the number of nodes with an identifier.
    #[must_use]
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    /// Returns `true` if no node has an identifier.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// Returns the identifier for `node`, assigning one if needed.
    ///
    /// An `attribute` value already present on the node in the source wins
    /// over a freshly generated UUID.
    pub fn id_for(&mut self, node: Node<'_, '_>, attribute: &str) -> String {
        self.ids
            .entry(node.id())
            .or_insert_with(|| match node.attribute(attribute) {
                Some(existing) => Assignment {
                    id: existing.to_string(),
                    from_source: true,
                },
                None => Assignment {
                    id: uuid::Uuid::new_v4().to_string(),
                    from_source: false,
                },
            })
            .id
            .clone()
    }

    /// Renders the document text with every generated identifier written
    /// as an `attribute` attribute on its element.
    ///
    /// Identifiers taken from the source are already present and are left
    /// untouched.
    #[must_use]
    pub fn annotate(&self, document: &Document<'_>, attribute: &str) -> String {
        let text = document.input_text();
        let mut insertions: Vec<(usize, &str)> = self
            .ids
            .iter()
            .filter(|(_, a)| !a.from_source)
            .filter_map(|(node_id, a)| {
                let node = document.get_node(*node_id)?;
                node.is_element()
                    .then(|| (start_tag_name_end(text, node.range().start), a.id.as_str()))
            })
            .collect();
        insertions.sort_unstable_by(|a, b| b.0.cmp(&a.0));

        let mut annotated = text.to_string();
        for (offset, id) in insertions {
            annotated.insert_str(offset, &format!(" {attribute}=\"{id}\""));
        }
        annotated
    }
}

/// Returns the byte offset just past the element name of the start tag at
/// `start`.
fn start_tag_name_end(text: &str, start: usize) -> usize {
    let tag = &text[start..];
    let name_len = tag
        .char_indices()
        .skip(1)
        .find(|(_, c)| c.is_whitespace() || matches!(c, '/' | '>'))
        .map_or(tag.len(), |(idx, _)| idx);
    start + name_len
}

// =============================================================================
// Correlation
// =============================================================================

/// An attribute an error location pointed at.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReferencedAttribute {
    /// The location as reported.
    pub location: String,
    /// Identifier of the element owning the attribute.
    pub error_id: String,
    /// Attribute local name.
    pub name: String,
    /// Attribute value.
    pub value: String,
}

/// Result of correlating a group of errors with a document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Correlation {
    /// Node identifier per reported location.
    pub error_map: BTreeMap<String, String>,
    /// Attributes referenced by locations, in first-seen order.
    pub error_attributes: Vec<ReferencedAttribute>,
}

impl Correlation {
    /// Returns the identifier a location resolved to.
    #[must_use]
    pub fn error_id(&self, location: &str) -> Option<&str> {
        self.error_map.get(location).map(String::as_str)
    }

    /// Returns `true` if nothing was correlated.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.error_map.is_empty() && self.error_attributes.is_empty()
    }
}

/// Correlates error locations with document nodes.
#[derive(Debug, Clone)]
pub struct Correlator<R = LocationPathResolver> {
    resolver: R,
    error_id_attribute: String,
    namespace_predicates: Vec<String>,
}

impl Correlator {
    /// Creates a correlator with the default location resolver.
    #[must_use]
    pub fn new(config: &CorrelationConfig) -> Self {
        Self::with_resolver(config, LocationPathResolver)
    }
}

impl Default for Correlator {
    fn default() -> Self {
        Self::new(&CorrelationConfig::default())
    }
}

impl<R: NodeResolver> Correlator<R> {
    /// Creates a correlator using `resolver` to interpret locations.
    #[must_use]
    pub fn with_resolver(config: &CorrelationConfig, resolver: R) -> Self {
        Self {
            resolver,
            error_id_attribute: config.error_id_attribute.clone(),
            namespace_predicates: config.namespace_predicates.clone(),
        }
    }

    /// Returns the attribute identifiers are read from and written to.
    #[must_use]
    pub fn error_id_attribute(&self) -> &str {
        &self.error_id_attribute
    }

    /// Removes every configured namespace predicate from `location`.
    #[must_use]
    pub fn normalize_location(&self, location: &str) -> String {
        self.namespace_predicates
            .iter()
            .fold(location.to_string(), |acc, predicate| acc.replace(predicate.as_str(), ""))
    }

    /// Correlates the locations of `errors` with nodes of `document`.
    ///
    /// Errors without a location are ignored. Each distinct location is
    /// resolved once; a document-node result is redirected to the root
    /// element and an attribute result to its owning element.
    pub fn correlate<'e>(
        &self,
        document: &Document<'_>,
        errors: impl IntoIterator<Item = &'e ExecutionError>,
        assignments: &mut ErrorIdAssignments,
    ) -> Correlation {
        let mut correlation = Correlation::default();
        let mut seen = HashSet::new();
        let mut dropped = 0usize;

        for location in errors.into_iter().filter_map(ExecutionError::location) {
            if !seen.insert(location) {
                continue;
            }

            let normalized = self.normalize_location(location);
            let Some(resolved) = self.resolver.resolve(document, &normalized) else {
                debug!(location = %location, "Location did not resolve, dropping");
                dropped += 1;
                continue;
            };

            let owner = match &resolved {
                ResolvedNode::Document => Some(document.root_element()),
                ResolvedNode::Element(id) | ResolvedNode::Attribute { owner: id, .. } => {
                    document.get_node(*id)
                },
            };
            let Some(owner) = owner else {
                dropped += 1;
                continue;
            };

            let error_id = assignments.id_for(owner, &self.error_id_attribute);
            if let ResolvedNode::Attribute { name, value, .. } = resolved {
                correlation.error_attributes.push(ReferencedAttribute {
                    location: location.to_string(),
                    error_id: error_id.clone(),
                    name,
                    value,
                });
            }
            correlation.error_map.insert(location.to_string(), error_id);
        }

        debug!(
            locations = seen.len(),
            correlated = correlation.error_map.len(),
            dropped,
            "Correlated error locations"
        );
        correlation
    }
}
