//! Bounded-token markup rewriting.
//!
//! [`MarkupRewriter`] is a single forward scan over the input: find the next
//! prefix, find its suffix, hand the text in between to a generator, emit the
//! replacement, continue after the region. It never looks back.

use crate::container::UrlGenerator;
use crate::url::WsrpUrl;

/// Opening boundary of a URL rewrite token.
pub const URL_TOKEN_PREFIX: &str = "wsrp_rewrite?";
/// Closing boundary of a URL rewrite token.
pub const URL_TOKEN_SUFFIX: &str = "/wsrp_rewrite";
/// Placeholder for the window namespace.
pub const NAMESPACE_TOKEN: &str = "wsrp_rewrite_";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MarkupRewriter {
    prefix: String,
    suffix: Option<String>,
    suffix_optional: bool,
    keep_boundaries: bool,
    replace_if_empty: bool,
}

impl MarkupRewriter {
    /// Tokens delimited by `prefix` ... `suffix`.
    pub fn bounded(prefix: impl Into<String>, suffix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            suffix: Some(suffix.into()),
            suffix_optional: false,
            keep_boundaries: false,
            replace_if_empty: true,
        }
    }

    /// Every occurrence of `prefix` alone is a token.
    pub fn prefix_only(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            suffix: None,
            suffix_optional: true,
            keep_boundaries: false,
            replace_if_empty: true,
        }
    }

    /// A prefix without a suffix before the next prefix is bounded by that
    /// next prefix (or the end of the input).
    pub fn optional_suffix(mut self) -> Self {
        self.suffix_optional = true;
        self
    }

    /// Replace only the text between the boundaries, keeping both.
    pub fn keep_boundaries(mut self) -> Self {
        self.keep_boundaries = true;
        self
    }

    /// Whether an empty bounded text is passed to the generator (default) or
    /// left untouched.
    pub fn replace_if_empty(mut self, replace: bool) -> Self {
        self.replace_if_empty = replace;
        self
    }

    /// Rewrite `input`. `generate` receives the bounded text (or the prefix
    /// itself for a prefix-only match, or after a required suffix went
    /// missing) and returns the replacement; `None` leaves the region as it
    /// was.
    pub fn rewrite<F>(&self, input: &str, mut generate: F) -> String
    where
        F: FnMut(&str) -> Option<String>,
    {
        if self.prefix.is_empty() {
            return input.to_owned();
        }

        let prefix = self.prefix.as_str();
        let mut out = String::with_capacity(input.len());
        let mut pos = 0;
        // Set once a required suffix goes missing: from there on only the
        // prefix is replaced.
        let mut prefix_mode = self.suffix.is_none();

        while let Some(found) = input[pos..].find(prefix) {
            let start = pos + found;
            let body = start + prefix.len();
            out.push_str(&input[pos..start]);

            // (end of the bounded text, closing boundary)
            let bounded = match (&self.suffix, prefix_mode) {
                (Some(suffix), false) => {
                    let next_suffix = input[body..].find(suffix.as_str()).map(|o| body + o);
                    if self.suffix_optional {
                        let next_prefix = input[body..].find(prefix).map(|o| body + o);
                        match (next_suffix, next_prefix) {
                            (Some(s), Some(p)) if s <= p => Some((s, suffix.as_str())),
                            (Some(s), None) => Some((s, suffix.as_str())),
                            (_, Some(p)) => Some((p, "")),
                            (None, None) => Some((input.len(), "")),
                        }
                    } else {
                        match next_suffix {
                            Some(s) => Some((s, suffix.as_str())),
                            None => {
                                prefix_mode = true;
                                None
                            }
                        }
                    }
                }
                _ => None,
            };

            match bounded {
                Some((text_end, suffix)) => {
                    let text = &input[body..text_end];
                    let end = text_end + suffix.len();
                    let replacement = if text.is_empty() && !self.replace_if_empty {
                        None
                    } else {
                        generate(text)
                    };
                    match replacement {
                        Some(r) if self.keep_boundaries => {
                            out.push_str(prefix);
                            out.push_str(&r);
                            out.push_str(suffix);
                        }
                        Some(r) => out.push_str(&r),
                        None => out.push_str(&input[start..end]),
                    }
                    pos = end;
                }
                None => {
                    match generate(prefix) {
                        Some(r) => out.push_str(&r),
                        None => out.push_str(prefix),
                    }
                    pos = body;
                }
            }
        }

        out.push_str(&input[pos..]);
        out
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// WSRP token rewriting
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Replace URL tokens with container URLs, then namespace tokens with
/// `namespace`. Tokens that do not parse are left as they are.
pub fn rewrite_wsrp_tokens(markup: &str, namespace: &str, urls: &dyn UrlGenerator) -> String {
    let with_urls = MarkupRewriter::bounded(URL_TOKEN_PREFIX, URL_TOKEN_SUFFIX).rewrite(
        markup,
        |params| match WsrpUrl::parse(params) {
            Ok(url) => Some(urls.url(&url, namespace)),
            Err(e) => {
                tracing::debug!(error = %e, "leaving malformed rewrite token");
                None
            }
        },
    );
    MarkupRewriter::prefix_only(NAMESPACE_TOKEN).rewrite(&with_urls, |_| Some(namespace.to_owned()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::container::BaseUrlGenerator;

    fn echo(text: &str) -> Option<String> {
        Some(text.to_owned())
    }

    #[test]
    fn echo_with_boundaries_round_trips() {
        let rw = MarkupRewriter::bounded("[[", "]]").keep_boundaries();
        let input = "A[[X]]B";
        assert_eq!(rw.rewrite(input, echo), input);

        let many = "x[[1]]y[[]]z[[3]]";
        assert_eq!(rw.rewrite(many, echo), many);
    }

    #[test]
    fn replaces_whole_region_by_default() {
        let rw = MarkupRewriter::bounded("{", "}");
        let out = rw.rewrite("a{b}c{d}e", |t| Some(t.to_uppercase()));
        assert_eq!(out, "aBcDe");
    }

    #[test]
    fn empty_text_can_be_left_alone() {
        let rw = MarkupRewriter::bounded("{", "}").replace_if_empty(false);
        assert_eq!(rw.rewrite("a{}b{x}", |_| Some("!".into())), "a{}b!");
    }

    #[test]
    fn suffix_absent_everywhere_rewrites_prefixes_only() {
        let rw = MarkupRewriter::bounded("<", ">");
        assert_eq!(rw.rewrite("x<y<z", |t| Some(format!("[{t}]"))), "x[<]y[<]z");

        let rw = MarkupRewriter::bounded("<<", ">>");
        assert_eq!(rw.rewrite("a<<b<<c", |_| Some("!".into())), "a!b!c");
    }

    #[test]
    fn missing_suffix_switches_to_prefix_mode() {
        let rw = MarkupRewriter::bounded("<", ">");
        // First token is complete; after the second '<' no '>' follows.
        let out = rw.rewrite("<a>x<y<z", |t| Some(format!("[{t}]")));
        assert_eq!(out, "[a]x[<]y[<]z");
    }

    #[test]
    fn optional_suffix_is_bounded_by_next_prefix() {
        let rw = MarkupRewriter::bounded("@", ";").optional_suffix();
        let mut seen = Vec::new();
        let out = rw.rewrite("@a@b;c", |t| {
            seen.push(t.to_owned());
            Some(format!("({t})"))
        });
        assert_eq!(out, "(a)(b)c");
        assert_eq!(seen, ["a", "b"]);
    }

    #[test]
    fn optional_suffix_trailing_prefix_runs_to_end() {
        let rw = MarkupRewriter::bounded("@", ";").optional_suffix();
        assert_eq!(rw.rewrite("x@@tail", |t| Some(format!("({t})"))), "x()(tail)");
    }

    #[test]
    fn optional_suffix_keeps_boundaries_of_adjacent_tokens() {
        let rw = MarkupRewriter::bounded("@", ";").optional_suffix().keep_boundaries();
        assert_eq!(rw.rewrite("@a@b;c", |t| Some(t.to_uppercase())), "@A@B;c");
    }

    #[test]
    fn prefix_only_replaces_each_occurrence() {
        let rw = MarkupRewriter::prefix_only("$$");
        assert_eq!(rw.rewrite("$$a$$$b", |_| Some("N".into())), "NaN$b");
    }

    #[test]
    fn none_from_generator_keeps_region() {
        let rw = MarkupRewriter::bounded("{", "}");
        assert_eq!(rw.rewrite("a{b}c", |_| None), "a{b}c");
    }

    #[test]
    fn wsrp_tokens_are_rewritten() {
        let markup = concat!(
            "<form id=\"wsrp_rewrite_form\" ",
            "action=\"wsrp_rewrite?wsrp-urlType=blockingAction&amp;wsrp-mode=view/wsrp_rewrite\">",
            "<a href=\"wsrp_rewrite?wsrp-urlType=bogus/wsrp_rewrite\">x</a>"
        );
        let out = rewrite_wsrp_tokens(markup, "ns1_", &BaseUrlGenerator::new("/p"));
        assert!(out.contains("id=\"ns1_form\""));
        assert!(out.contains(
            "action=\"/p?wsrp-urlType=blockingAction&wsrp-mode=view&ns=ns1_\""
        ));
        // Unknown url type: untouched.
        assert!(out.contains("wsrp_rewrite?wsrp-urlType=bogus/wsrp_rewrite"));
    }
}
