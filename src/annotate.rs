//! Annotation grammar extractor.
//!
//! The model is instructed to emit inline markup binding entity mentions to
//! codes and declaring relations between them:
//!
//! - entity:   `[<name>|<category>]($N<digits>)` or `[<name>]($N<digits>)`
//! - relation: `[<predicate>]($R<digits>, $N<a>, $N<b>[; $N<c>, $N<d> ...])`
//!
//! Extraction is a two-pass regex scan over the whole accumulated buffer,
//! re-run from scratch on every call, with no incremental tokenization. Code
//! resolution is positional: a relation takes the latest binding of each
//! code occurring before the relation in the buffer, falling back to the
//! earliest later binding when the entity is introduced just after its
//! relation ("can [reduce]($R2, $N1, $N3) the risk of [cognitive
//! decline]($N3)"). A code with no binding anywhere drops its group.
//! Malformed markup is simply not matched and contributes nothing; this
//! module never fails.

use std::collections::HashMap;
use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

/// A (subject, predicate, object) fact extracted from annotated text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Triple {
    pub subject: String,
    pub predicate: String,
    pub object: String,
}

impl Triple {
    pub fn new(
        subject: impl Into<String>,
        predicate: impl Into<String>,
        object: impl Into<String>,
    ) -> Self {
        Self {
            subject: subject.into(),
            predicate: predicate.into(),
            object: object.into(),
        }
    }

    /// Canonical key used by the session's seen-triple set.
    pub fn key(&self) -> String {
        format!("{}|{}|{}", self.subject, self.predicate, self.object)
    }
}

/// Output of one extraction pass.
#[derive(Debug, Clone, Default)]
pub struct Extraction {
    /// Resolved triples, in document order.
    pub triples: Vec<Triple>,
    /// Entity name to raw category label, for explicitly annotated mentions
    /// only. Last annotation in the buffer wins.
    pub entity_categories: HashMap<String, String>,
}

fn entity_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"\[([^\]|]+)(?:\|([^\]]+))?\]\(\$N(\d+)\)").expect("entity pattern")
    })
}

fn relation_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\[([^\]]+)\]\(\$R\d+, (.+?)\)").expect("relation pattern"))
}

/// Resolve a code against its bindings, positionally relative to `at`.
///
/// Bindings are (byte offset, name) in document order. Latest binding before
/// `at` wins; an entity first introduced after the relation resolves to that
/// first later binding.
fn resolve_at<'t>(bindings: &[(usize, &'t str)], at: usize) -> Option<&'t str> {
    if bindings.is_empty() {
        return None;
    }
    let idx = bindings.partition_point(|(offset, _)| *offset < at);
    if idx > 0 {
        Some(bindings[idx - 1].1)
    } else {
        Some(bindings[0].1)
    }
}

/// Extract triples and entity categories from an accumulated answer buffer.
///
/// Deterministic: the same buffer always yields the same output. The buffer
/// may be any prefix of the final answer; partial trailing markup is ignored.
pub fn extract(text: &str) -> Extraction {
    // Pass 1: entity bindings, keyed by full code token ("$N1"), each a
    // document-ordered list of (offset, name).
    let mut bindings: HashMap<String, Vec<(usize, &str)>> = HashMap::new();
    let mut entity_categories: HashMap<String, String> = HashMap::new();

    for caps in entity_re().captures_iter(text) {
        let whole = caps.get(0).expect("match");
        let name = caps.get(1).expect("name").as_str();
        let code = format!("$N{}", caps.get(3).expect("code").as_str());
        if let Some(cat) = caps.get(2) {
            entity_categories.insert(name.to_string(), cat.as_str().trim().to_string());
        }
        bindings.entry(code).or_default().push((whole.start(), name));
    }

    // Pass 2: relations, resolved against the bindings in positional order.
    let mut triples = Vec::new();
    for caps in relation_re().captures_iter(text) {
        let whole = caps.get(0).expect("match");
        let predicate = caps.get(1).expect("predicate").as_str();
        let args = caps.get(2).expect("args").as_str();

        for group in args.split(';') {
            let codes: Vec<&str> = group.split(',').map(str::trim).collect();
            if codes.len() < 2 {
                continue;
            }
            // Every token in the group must resolve; otherwise the whole
            // group is dropped without affecting its siblings.
            let resolved: Option<Vec<&str>> = codes
                .iter()
                .map(|c| bindings.get(*c).and_then(|b| resolve_at(b, whole.start())))
                .collect();
            if let Some(names) = resolved {
                triples.push(Triple::new(names[0], predicate, names[1]));
            } else {
                tracing::trace!(group = %group.trim(), "dropping relation group with unbound code");
            }
        }
    }

    Extraction {
        triples,
        entity_categories,
    }
}

/// Split a raw answer into its body and the trailing salient-entity list.
///
/// The model appends a JSON string list of salient entities after a `||`
/// delimiter. Only the body is scanned for markup; a missing or malformed
/// tail yields `None` for the salient list.
pub fn split_answer(text: &str) -> (&str, Option<Vec<String>>) {
    match text.split_once("||") {
        Some((body, tail)) => {
            let salient = serde_json::from_str::<Vec<String>>(tail.trim()).ok();
            (body, salient)
        }
        None => (text, None),
    }
}
