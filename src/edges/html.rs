//! Outgoing-edge extraction for HTML files.
//!
//! Markup is a first-class edge source: custom-element and attribute selectors
//! pull in the components and directives that render them, pipe names in
//! binding expressions pull in pipe declarations, `@load(...)` directives pull
//! in lazily loaded modules, and `<link>`/`<preload>` tags pull in stylesheets.

use std::sync::OnceLock;

use anyhow::{Result, bail};
use indexmap::IndexMap;
use regex::Regex;
use scraper::{Html, Selector};

use crate::context::AnalyzerContext;
use crate::framework::FrameworkInfo;
use crate::graph::EdgeKind;
use crate::resolver::{ImportResolver, has_known_extension};

/// Stylesheet hrefs must live under this URL root to be tracked.
const CSS_HREF_PREFIX: &str = "/templates/css";
/// Directory prepended to a tracked stylesheet href to obtain its file id.
const CSS_FILE_ROOT: &str = "core";

/// One element of the parsed document, reduced to what selector matching needs.
///
/// Attribute names are normalized: binding wrappers (`[a]`, `(a)`) are
/// stripped so bound and unbound attributes match the same selectors, and
/// names are lowercased to meet the parser's case folding halfway.
struct ElementFacts {
    tag: String,
    attr_names: Vec<String>,
    attr_values: Vec<String>,
    classes: Vec<String>,
}

/// Enumerate the outgoing edges of one HTML file, in first-seen order.
pub fn extract_html_edges(
    content: &str,
    file: &str,
    framework_map: &IndexMap<String, Vec<FrameworkInfo>>,
    resolver: &ImportResolver,
    ctx: &AnalyzerContext,
) -> Result<Vec<(String, EdgeKind)>> {
    // Templates are fragments; entry-page shells are full documents. Either
    // way parsing is lenient — no schema validation, unknown tags kept.
    let lowered = content.to_ascii_lowercase();
    let document = if lowered.contains("<!doctype") || lowered.contains("<html") {
        Html::parse_document(content)
    } else {
        Html::parse_fragment(content)
    };

    let all_elements = Selector::parse("*").expect("universal selector is valid");

    let mut facts: Vec<ElementFacts> = Vec::new();
    let mut text_chunks: Vec<String> = Vec::new();
    let mut css_hrefs: Vec<String> = Vec::new();

    for element in document.select(&all_elements) {
        let value = element.value();
        let mut attr_names = Vec::new();
        let mut attr_values = Vec::new();
        for (name, attr_value) in value.attrs() {
            attr_names.push(normalize_attr_name(name));
            attr_values.push(attr_value.to_owned());
        }

        if matches!(value.name(), "link" | "preload") {
            if let Some(href) = value.attr("href") {
                if href.ends_with(".css") && href.starts_with(CSS_HREF_PREFIX) {
                    css_hrefs.push(href.to_owned());
                }
            }
        }

        facts.push(ElementFacts {
            tag: value.name().to_ascii_lowercase(),
            attr_names,
            attr_values,
            classes: value.classes().map(|c| c.to_owned()).collect(),
        });
    }

    for chunk in document.root_element().text() {
        if !chunk.trim().is_empty() {
            text_chunks.push(chunk.to_owned());
        }
    }

    let mut edges = EdgeList::new();

    // Selector and pipe edges, iterating declarations in discovery order.
    for (declaring_file, infos) in framework_map {
        for info in infos {
            match info {
                FrameworkInfo::Component {
                    selector: Some(selector),
                    ..
                }
                | FrameworkInfo::Directive {
                    selector: Some(selector),
                    ..
                } => {
                    if selector_matches_any(selector, &facts) {
                        edges.push(
                            declaring_file.clone(),
                            EdgeKind::Selector {
                                selector: selector.clone(),
                            },
                        );
                    }
                }
                FrameworkInfo::Pipe {
                    selector: Some(name),
                    ..
                } => {
                    if pipe_referenced(name, &facts, &text_chunks) {
                        edges.push(
                            declaring_file.clone(),
                            EdgeKind::Pipe {
                                selector: name.clone(),
                            },
                        );
                    }
                }
                _ => {}
            }
        }
    }

    // `@load(...)` directives in element text, in document order.
    for chunk in &text_chunks {
        for line in chunk.lines() {
            if !line.contains("@load") {
                continue;
            }
            if let Some(argument) = first_load_argument(line) {
                push_load_edge(&argument, file, resolver, ctx, &mut edges)?;
            }
        }
    }

    // CSS references, in document order.
    for href in &css_hrefs {
        let target = format!("{CSS_FILE_ROOT}{href}");
        if !ctx.is_file(&target) {
            bail!("Stylesheet '{target}' referenced by '{file}' does not exist");
        }
        edges.push(target, EdgeKind::Stylesheet);
    }

    Ok(edges.into_vec())
}

/// Strip one layer of `[...]` or `(...)` wrapping and lowercase.
fn normalize_attr_name(name: &str) -> String {
    let stripped = if (name.starts_with('[') && name.ends_with(']'))
        || (name.starts_with('(') && name.ends_with(')'))
    {
        &name[1..name.len() - 1]
    } else {
        name
    };
    stripped.to_ascii_lowercase()
}

/// One comma-free alternative of a component/directive selector.
struct CompoundSelector {
    tag: Option<String>,
    attrs: Vec<String>,
    classes: Vec<String>,
}

/// Parse a selector string into its comma-separated alternatives, each a
/// compound of optional tag, `[attr]` parts, and `.class` parts.
fn parse_selector(selector: &str) -> Vec<CompoundSelector> {
    selector
        .split(',')
        .map(str::trim)
        .filter(|alt| !alt.is_empty())
        .map(parse_compound)
        .collect()
}

fn parse_compound(alternative: &str) -> CompoundSelector {
    let mut compound = CompoundSelector {
        tag: None,
        attrs: Vec::new(),
        classes: Vec::new(),
    };

    let chars: Vec<char> = alternative.chars().collect();

    // Leading tag name, if the compound does not open with a part marker.
    let tag_end = chars
        .iter()
        .position(|&c| c == '[' || c == '.')
        .unwrap_or(chars.len());
    if tag_end > 0 {
        let tag: String = chars[..tag_end].iter().collect();
        compound.tag = Some(tag.to_ascii_lowercase());
    }
    let mut i = tag_end;

    while i < chars.len() {
        match chars[i] {
            '[' => {
                let close = chars[i..]
                    .iter()
                    .position(|&c| c == ']')
                    .map(|offset| i + offset)
                    .unwrap_or(chars.len());
                let inner: String = chars[i + 1..close].iter().collect();
                // `[attr=value]` selectors match on attribute presence only.
                let name = inner.split('=').next().unwrap_or("").trim();
                if !name.is_empty() {
                    compound.attrs.push(name.to_ascii_lowercase());
                }
                i = close.saturating_add(1);
            }
            '.' => {
                let end = chars[i + 1..]
                    .iter()
                    .position(|&c| c == '[' || c == '.')
                    .map(|offset| i + 1 + offset)
                    .unwrap_or(chars.len());
                let class: String = chars[i + 1..end].iter().collect();
                if !class.is_empty() {
                    compound.classes.push(class);
                }
                i = end;
            }
            _ => i += 1,
        }
    }

    compound
}

/// Whether any element of the document matches any alternative of `selector`.
fn selector_matches_any(selector: &str, facts: &[ElementFacts]) -> bool {
    let alternatives = parse_selector(selector);
    facts.iter().any(|element| {
        alternatives.iter().any(|alt| {
            if let Some(tag) = &alt.tag {
                if element.tag != *tag {
                    return false;
                }
            }
            alt.attrs
                .iter()
                .all(|attr| element.attr_names.iter().any(|name| name == attr))
                && alt
                    .classes
                    .iter()
                    .all(|class| element.classes.iter().any(|c| c == class))
        })
    })
}

/// A pipe is referenced iff some element text chunk or attribute value
/// contains both a `|` character and the pipe's name.
fn pipe_referenced(name: &str, facts: &[ElementFacts], text_chunks: &[String]) -> bool {
    let hit = |s: &str| s.contains('|') && s.contains(name);
    text_chunks.iter().any(|chunk| hit(chunk))
        || facts
            .iter()
            .any(|element| element.attr_values.iter().any(|value| hit(value)))
}

static LOAD_DIRECTIVE: OnceLock<Regex> = OnceLock::new();

fn load_directive_regex() -> &'static Regex {
    LOAD_DIRECTIVE.get_or_init(|| Regex::new(r"@load\s*\(").expect("invalid @load regex"))
}

/// Extract the first comma-separated argument of the `@load(...)` call on a
/// line, with one layer of surrounding quotes stripped.
fn first_load_argument(line: &str) -> Option<String> {
    let opening = load_directive_regex().find(line)?;
    let after = &line[opening.end() - 1..]; // starts at the '('
    let mut depth = 0usize;
    let mut argument = String::new();
    for c in after.chars() {
        match c {
            '(' => {
                depth += 1;
                if depth == 1 {
                    continue;
                }
            }
            ')' => {
                depth -= 1;
                if depth == 0 {
                    break;
                }
            }
            ',' if depth == 1 => break,
            _ => {}
        }
        argument.push(c);
    }
    let trimmed = argument.trim();
    let unquoted = trimmed
        .strip_prefix('\'')
        .and_then(|s| s.strip_suffix('\''))
        .or_else(|| trimmed.strip_prefix('"').and_then(|s| s.strip_suffix('"')))
        .unwrap_or(trimmed);
    if unquoted.is_empty() {
        None
    } else {
        Some(unquoted.to_owned())
    }
}

/// Resolve a `@load` target with the same existence rules as source imports.
fn push_load_edge(
    argument: &str,
    file: &str,
    resolver: &ImportResolver,
    ctx: &AnalyzerContext,
    edges: &mut EdgeList,
) -> Result<()> {
    let target = match resolver.resolve(argument, file) {
        Some(t) => t,
        None => return Ok(()),
    };
    if ctx.is_file(&target) {
        edges.push(target, EdgeKind::Load);
    } else if has_known_extension(&target) {
        bail!("'{target}' loaded by '{file}' (directive argument '{argument}') does not exist");
    }
    Ok(())
}

/// Ordered edge accumulator with first-seen target dedup.
struct EdgeList {
    seen: std::collections::HashSet<String>,
    edges: Vec<(String, EdgeKind)>,
}

impl EdgeList {
    fn new() -> Self {
        Self {
            seen: std::collections::HashSet::new(),
            edges: Vec::new(),
        }
    }

    fn push(&mut self, target: String, kind: EdgeKind) {
        if self.seen.insert(target.clone()) {
            self.edges.push((target, kind));
        }
    }

    fn into_vec(self) -> Vec<(String, EdgeKind)> {
        self.edges
    }
}
