//! Location path parsing and resolution.
//!
//! Validation tools report where a problem sits as an XPath-style location
//! such as
//! `/*:ClinicalDocument[1]/*:component[1]/*:structuredBody[1]/@classCode`.
//! This module parses the subset of XPath those tools emit and resolves it
//! against a parsed [`roxmltree::Document`].
//!
//! Supported syntax:
//!
//! - absolute (`/a/b`) and descendant (`//b`) steps; relative paths start at
//!   the document node
//! - name tests `name`, `*`, `*:name`, `*:*` and `prefix:name`
//! - attribute steps `@name`, `@*:name`, `@prefix:name`, `@*`
//! - positional predicates `[n]` and namespace predicates
//!   `[namespace-uri()='uri']`, applied in order
//!
//! Unprefixed and `*:` name tests match on local name only. A declared
//! `prefix:` additionally requires the namespace the prefix is bound to.

use roxmltree::{Document, Node, NodeId};
use thiserror::Error;

/// Errors raised while parsing a location.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[non_exhaustive]
pub enum LocationError {
    /// The location is empty.
    #[error("empty location")]
    Empty,

    /// A step uses syntax outside the supported subset.
    #[error("unsupported location step '{step}'")]
    UnsupportedStep {
        /// The offending step text.
        step: String,
    },

    /// A predicate uses syntax outside the supported subset.
    #[error("unsupported predicate '[{predicate}]'")]
    UnsupportedPredicate {
        /// The offending predicate text.
        predicate: String,
    },

    /// Brackets or quotes are not balanced.
    #[error("unbalanced location '{location}'")]
    Unbalanced {
        /// The location text.
        location: String,
    },
}

/// A node a location resolved to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolvedNode {
    /// The document node itself.
    Document,
    /// An element.
    Element(NodeId),
    /// An attribute of an element.
    Attribute {
        /// Element owning the attribute.
        owner: NodeId,
        /// Attribute local name.
        name: String,
        /// Attribute value.
        value: String,
    },
}

/// Resolves locations against a parsed document.
pub trait NodeResolver {
    /// Returns the first node `location` addresses, or `None` when nothing
    /// matches or the location cannot be interpreted.
    fn resolve(&self, document: &Document<'_>, location: &str) -> Option<ResolvedNode>;
}

/// Resolver for the location subset described in the module docs.
#[derive(Debug, Clone, Copy, Default)]
pub struct LocationPathResolver;

impl NodeResolver for LocationPathResolver {
    fn resolve(&self, document: &Document<'_>, location: &str) -> Option<ResolvedNode> {
        let path = LocationPath::parse(location).ok()?;
        path.evaluate(document)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Prefix {
    None,
    Wildcard,
    Named(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum NameTest {
    Any,
    Name { prefix: Prefix, local: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Predicate {
    Position(usize),
    Namespace(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Axis {
    Child,
    Descendant,
    Attribute,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Step {
    axis: Axis,
    test: NameTest,
    predicates: Vec<Predicate>,
}

/// A parsed location.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocationPath {
    steps: Vec<Step>,
}

impl LocationPath {
    /// Parses a location.
    ///
    /// # Errors
    ///
    /// Returns a [`LocationError`] when the location is empty, unbalanced or
    /// uses unsupported syntax.
    pub fn parse(location: &str) -> Result<Self, LocationError> {
        let location = location.trim();
        if location.is_empty() {
            return Err(LocationError::Empty);
        }

        let mut steps = Vec::new();
        let mut rest = location;
        while !rest.is_empty() {
            let descendant = rest.starts_with("//");
            rest = rest.trim_start_matches('/');
            if rest.is_empty() {
                if descendant || !steps.is_empty() {
                    return Err(LocationError::UnsupportedStep {
                        step: location.to_string(),
                    });
                }
                break;
            }

            let end = step_end(rest).ok_or_else(|| LocationError::Unbalanced {
                location: location.to_string(),
            })?;
            let (text, tail) = rest.split_at(end);
            if steps.last().is_some_and(|s: &Step| s.axis == Axis::Attribute) {
                return Err(LocationError::UnsupportedStep {
                    step: text.to_string(),
                });
            }
            steps.push(parse_step(text, descendant)?);
            rest = tail;
        }

        Ok(Self { steps })
    }

    /// Returns `true` if the location addresses the document node.
    #[must_use]
    pub fn is_document(&self) -> bool {
        self.steps.is_empty()
    }

    /// Resolves the path against `document`, returning the first match in
    /// document order.
    #[must_use]
    pub fn evaluate(&self, document: &Document<'_>) -> Option<ResolvedNode> {
        let mut context: Vec<Node<'_, '_>> = vec![document.root()];

        for step in &self.steps {
            if step.axis == Axis::Attribute {
                return context
                    .iter()
                    .find_map(|node| select_attribute(*node, step));
            }

            let mut next = Vec::new();
            for node in &context {
                match step.axis {
                    Axis::Child => next.extend(select_children(*node, step)),
                    Axis::Descendant => {
                        for descendant in node.descendants() {
                            next.extend(select_children(descendant, step));
                        }
                    },
                    Axis::Attribute => {},
                }
            }
            next.sort_by_key(|n| n.id().get());
            next.dedup_by_key(|n| n.id());
            if next.is_empty() {
                return None;
            }
            context = next;
        }

        let first = context.first()?;
        if first.is_root() {
            Some(ResolvedNode::Document)
        } else {
            Some(ResolvedNode::Element(first.id()))
        }
    }
}

/// Returns the byte offset where the step starting at `rest` ends, skipping
/// slashes inside predicates and quoted strings.
fn step_end(rest: &str) -> Option<usize> {
    let mut depth = 0usize;
    let mut quote: Option<char> = None;
    for (idx, ch) in rest.char_indices() {
        match (quote, ch) {
            (Some(q), c) if c == q => quote = None,
            (Some(_), _) => {},
            (None, '\'' | '"') => quote = Some(ch),
            (None, '[') => depth += 1,
            (None, ']') => depth = depth.checked_sub(1)?,
            (None, '/') if depth == 0 => return Some(idx),
            (None, _) => {},
        }
    }
    (depth == 0 && quote.is_none()).then_some(rest.len())
}

fn parse_step(text: &str, descendant: bool) -> Result<Step, LocationError> {
    let unsupported = || LocationError::UnsupportedStep {
        step: text.to_string(),
    };

    let (name_part, mut predicate_part) = text.find('[').map_or((text, ""), |i| text.split_at(i));

    let (axis, name_part) = match name_part.strip_prefix('@') {
        Some(name) if !descendant => (Axis::Attribute, name),
        Some(_) => return Err(unsupported()),
        None if descendant => (Axis::Descendant, name_part),
        None => (Axis::Child, name_part),
    };

    let test = parse_name_test(name_part).ok_or_else(unsupported)?;

    let mut predicates = Vec::new();
    while !predicate_part.is_empty() {
        let inner = predicate_part.strip_prefix('[').ok_or_else(unsupported)?;
        let close = closing_bracket(inner).ok_or_else(unsupported)?;
        predicates.push(parse_predicate(&inner[..close])?);
        predicate_part = &inner[close + 1..];
    }

    Ok(Step {
        axis,
        test,
        predicates,
    })
}

fn closing_bracket(inner: &str) -> Option<usize> {
    let mut quote: Option<char> = None;
    for (idx, ch) in inner.char_indices() {
        match (quote, ch) {
            (Some(q), c) if c == q => quote = None,
            (Some(_), _) => {},
            (None, '\'' | '"') => quote = Some(ch),
            (None, ']') => return Some(idx),
            (None, _) => {},
        }
    }
    None
}

fn is_name(text: &str) -> bool {
    !text.is_empty()
        && text
            .chars()
            .all(|c| c.is_alphanumeric() || matches!(c, '_' | '-' | '.'))
}

fn parse_name_test(text: &str) -> Option<NameTest> {
    match text.split_once(':') {
        None if text == "*" => Some(NameTest::Any),
        None => is_name(text).then(|| NameTest::Name {
            prefix: Prefix::None,
            local: text.to_string(),
        }),
        Some(("*", "*")) => Some(NameTest::Any),
        Some(("*", local)) => is_name(local).then(|| NameTest::Name {
            prefix: Prefix::Wildcard,
            local: local.to_string(),
        }),
        Some((prefix, local)) => (is_name(prefix) && is_name(local)).then(|| NameTest::Name {
            prefix: Prefix::Named(prefix.to_string()),
            local: local.to_string(),
        }),
    }
}

fn parse_predicate(text: &str) -> Result<Predicate, LocationError> {
    let unsupported = || LocationError::UnsupportedPredicate {
        predicate: text.to_string(),
    };
    let trimmed = text.trim();

    if let Ok(position) = trimmed.parse::<usize>() {
        return if position == 0 {
            Err(unsupported())
        } else {
            Ok(Predicate::Position(position))
        };
    }

    let literal = trimmed
        .strip_prefix("namespace-uri()")
        .map(str::trim_start)
        .and_then(|t| t.strip_prefix('='))
        .map(str::trim)
        .ok_or_else(unsupported)?;
    let uri = literal
        .strip_prefix('\'')
        .and_then(|l| l.strip_suffix('\''))
        .or_else(|| literal.strip_prefix('"').and_then(|l| l.strip_suffix('"')))
        .ok_or_else(unsupported)?;
    Ok(Predicate::Namespace(uri.to_string()))
}

fn matches_name(
    scope: Node<'_, '_>,
    name: &str,
    namespace: Option<&str>,
    test: &NameTest,
) -> bool {
    match test {
        NameTest::Any => true,
        NameTest::Name { prefix, local } => {
            if name != local {
                return false;
            }
            match prefix {
                Prefix::None | Prefix::Wildcard => true,
                Prefix::Named(p) => scope
                    .lookup_namespace_uri(Some(p.as_str()))
                    .map_or(true, |uri| namespace == Some(uri)),
            }
        },
    }
}

fn apply_predicates<T>(
    mut candidates: Vec<T>,
    predicates: &[Predicate],
    namespace_of: impl Fn(&T) -> Option<String>,
) -> Vec<T> {
    for predicate in predicates {
        candidates = match predicate {
            Predicate::Position(position) => candidates
                .into_iter()
                .nth(position - 1)
                .into_iter()
                .collect(),
            Predicate::Namespace(uri) => candidates
                .into_iter()
                .filter(|c| namespace_of(c).as_deref() == Some(uri.as_str()))
                .collect(),
        };
    }
    candidates
}

fn select_children<'a, 'input>(node: Node<'a, 'input>, step: &Step) -> Vec<Node<'a, 'input>> {
    let candidates: Vec<Node<'a, 'input>> = node
        .children()
        .filter(Node::is_element)
        .filter(|child| {
            let tag = child.tag_name();
            matches_name(*child, tag.name(), tag.namespace(), &step.test)
        })
        .collect();
    apply_predicates(candidates, &step.predicates, |n| {
        n.tag_name().namespace().map(str::to_string)
    })
}

fn select_attribute(node: Node<'_, '_>, step: &Step) -> Option<ResolvedNode> {
    if !node.is_element() {
        return None;
    }
    let candidates: Vec<_> = node
        .attributes()
        .filter(|attr| matches_name(node, attr.name(), attr.namespace(), &step.test))
        .collect();
    apply_predicates(candidates, &step.predicates, |a| {
        a.namespace().map(str::to_string)
    })
    .first()
    .map(|attr| ResolvedNode::Attribute {
        owner: node.id(),
        name: attr.name().to_string(),
        value: attr.value().to_string(),
    })
}
