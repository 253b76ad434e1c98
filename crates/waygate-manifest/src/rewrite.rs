//! Rewrites the index document so manifest-referenced paths point at
//! verified local blobs.
//!
//! Markup goes through a real HTML parser; the rewrite surface is a fixed
//! set of element/attribute pairs plus CSS `url(...)` literals in style
//! attributes and `<style>` blocks. External URLs are never rewritten.

use std::sync::OnceLock;

use ego_tree::NodeId;
use regex::{Captures, Regex};
use scraper::{Html, Node};

use waygate_core::looks_like_tx_id_segment;

use crate::blob::BlobHandle;

/// Element/attribute pairs eligible for rewriting. `link` is additionally
/// gated on a stylesheet/icon rel.
const REWRITE_SURFACE: [(&str, &str); 8] = [
    ("script", "src"),
    ("link", "href"),
    ("img", "src"),
    ("source", "src"),
    ("audio", "src"),
    ("video", "src"),
    ("video", "poster"),
    ("iframe", "src"),
];

/// Reports whether an attribute value points outside the manifest.
///
/// Anything carrying a scheme or protocol-relative prefix is external, and
/// so is any URL with a 43-character base64url path segment: that shape is
/// how already-addressed content looks, so we leave it alone. The segment
/// check is a heuristic and can misfire on unlucky tokens; the cost of a
/// false positive is only a skipped rewrite.
pub fn is_external_url(value: &str) -> bool {
    let trimmed = value.trim();
    if trimmed.starts_with("//") || trimmed.starts_with('#') {
        return true;
    }
    if trimmed
        .split_once(':')
        .is_some_and(|(scheme, _)| !scheme.contains('/'))
    {
        // data:, mailto:, javascript:, https:, ...
        return true;
    }
    trimmed
        .split(['/', '?', '#'])
        .any(looks_like_tx_id_segment)
}

/// Normalizes an attribute value into a manifest path key.
fn manifest_key(value: &str) -> Option<String> {
    if is_external_url(value) {
        return None;
    }
    let without_suffix = value.split(['?', '#']).next().unwrap_or_default();
    let key = without_suffix
        .trim()
        .trim_start_matches("./")
        .trim_start_matches('/');
    if key.is_empty() {
        return None;
    }
    Some(key.to_string())
}

fn css_url_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#"url\(\s*(['"]?)([^'"()\s]+)(['"]?)\s*\)"#).expect("valid css url regex")
    })
}

/// Rewrites `url(...)` literals whose targets resolve to verified blobs.
pub fn rewrite_css_urls(css: &str, resolve: &dyn Fn(&str) -> Option<BlobHandle>) -> String {
    css_url_regex()
        .replace_all(css, |caps: &Captures<'_>| {
            let quote = &caps[1];
            let target = &caps[2];
            match manifest_key(target).and_then(|key| resolve(&key)) {
                Some(handle) => format!("url({quote}{handle}{quote})"),
                None => caps[0].to_string(),
            }
        })
        .into_owned()
}

/// The rewritten document plus which manifest paths were replaced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RewriteOutcome {
    pub html: String,
    pub replaced: Vec<String>,
}

fn link_rel_is_rewritable(element: &scraper::node::Element) -> bool {
    element
        .attr("rel")
        .map(|rel| {
            rel.split_ascii_whitespace()
                .any(|token| token.eq_ignore_ascii_case("stylesheet") || token.eq_ignore_ascii_case("icon"))
        })
        .unwrap_or(false)
}

/// Parses `html`, replaces every manifest-referenced value on the rewrite
/// surface with its blob handle, and serializes the result.
pub fn rewrite_html(html: &str, resolve: &dyn Fn(&str) -> Option<BlobHandle>) -> RewriteOutcome {
    let mut document = Html::parse_document(html);
    let mut replaced: Vec<String> = Vec::new();

    enum Edit {
        Attr {
            node: NodeId,
            attr_local: String,
            value: String,
        },
        StyleText {
            node: NodeId,
            value: String,
        },
    }

    let mut edits: Vec<Edit> = Vec::new();
    for node in document.tree.root().descendants() {
        match node.value() {
            Node::Element(element) => {
                let tag = element.name();
                for (name, value) in element.attrs.iter() {
                    let local = name.local.as_ref();
                    let current: &str = value;
                    let on_surface = REWRITE_SURFACE
                        .iter()
                        .any(|(surface_tag, surface_attr)| {
                            *surface_tag == tag && *surface_attr == local
                        })
                        && (tag != "link" || link_rel_is_rewritable(element));
                    if on_surface {
                        if let Some(key) = manifest_key(current) {
                            if let Some(handle) = resolve(&key) {
                                edits.push(Edit::Attr {
                                    node: node.id(),
                                    attr_local: local.to_string(),
                                    value: handle.to_string(),
                                });
                                replaced.push(key);
                            }
                        }
                    } else if local == "style" {
                        let rewritten = rewrite_css_urls(current, resolve);
                        if rewritten != current {
                            edits.push(Edit::Attr {
                                node: node.id(),
                                attr_local: local.to_string(),
                                value: rewritten,
                            });
                        }
                    }
                }
            }
            Node::Text(text) => {
                let in_style_block = node
                    .parent()
                    .and_then(|parent| match parent.value() {
                        Node::Element(element) => Some(element.name() == "style"),
                        _ => None,
                    })
                    .unwrap_or(false);
                if in_style_block {
                    let current: &str = text;
                    let rewritten = rewrite_css_urls(current, resolve);
                    if rewritten != current {
                        edits.push(Edit::StyleText {
                            node: node.id(),
                            value: rewritten,
                        });
                    }
                }
            }
            _ => {}
        }
    }

    for edit in edits {
        match edit {
            Edit::Attr {
                node,
                attr_local,
                value,
            } => {
                if let Some(mut node) = document.tree.get_mut(node) {
                    if let Node::Element(element) = node.value() {
                        for (name, slot) in element.attrs.iter_mut() {
                            if name.local.as_ref() == attr_local {
                                *slot = value.as_str().into();
                            }
                        }
                    }
                }
            }
            Edit::StyleText { node, value } => {
                if let Some(mut node) = document.tree.get_mut(node) {
                    if let Node::Text(text) = node.value() {
                        text.text = value.as_str().into();
                    }
                }
            }
        }
    }

    let mut serialized = document.root_element().html();
    let original_head = html.trim_start();
    if original_head
        .get(..9)
        .is_some_and(|head| head.eq_ignore_ascii_case("<!doctype"))
    {
        serialized = format!("<!DOCTYPE html>{serialized}");
    }

    RewriteOutcome {
        html: serialized,
        replaced,
    }
}
