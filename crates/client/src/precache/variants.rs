//! URL variants tried when matching a request against the precache.
//!
//! A request for `/?utm_source=mail` should be served by a precached
//! `/index.html`. Candidates are produced in order:
//!
//! 1. the URL as requested (fragment removed)
//! 2. the URL without ignored query parameters
//! 3. (2) plus the directory index, when the path ends in `/`
//! 4. (2) plus `.html`, when clean URLs are enabled and the path does not end in `/`

use regex::Regex;
use url::Url;

/// Options controlling which variants are generated.
#[derive(Debug, Clone)]
pub struct MatchOptions {
    pub ignore_url_parameters: Vec<Regex>,
    pub directory_index: Option<String>,
    pub clean_urls: bool,
}

impl Default for MatchOptions {
    fn default() -> Self {
        Self {
            ignore_url_parameters: vec![Regex::new("^utm_").expect("static regex")],
            directory_index: Some("index.html".into()),
            clean_urls: true,
        }
    }
}

/// Remove query parameters whose name matches any of `ignore`.
pub fn strip_ignored_params(url: &Url, ignore: &[Regex]) -> Url {
    let mut stripped = url.clone();
    if url.query().is_none() || ignore.is_empty() {
        return stripped;
    }

    let kept: Vec<(String, String)> = url
        .query_pairs()
        .filter(|(name, _)| !ignore.iter().any(|re| re.is_match(name)))
        .map(|(name, value)| (name.into_owned(), value.into_owned()))
        .collect();

    if kept.is_empty() {
        stripped.set_query(None);
    } else {
        stripped.query_pairs_mut().clear().extend_pairs(kept);
    }
    stripped
}

/// Candidate URLs for `url`, most specific first, without duplicates.
pub fn candidates(url: &Url, options: &MatchOptions) -> Vec<Url> {
    let mut original = url.clone();
    original.set_fragment(None);

    let stripped = strip_ignored_params(&original, &options.ignore_url_parameters);
    let mut out = vec![original, stripped.clone()];

    if stripped.path().ends_with('/') {
        if let Some(index) = &options.directory_index {
            let mut with_index = stripped.clone();
            with_index.set_path(&format!("{}{}", stripped.path(), index));
            out.push(with_index);
        }
    } else if options.clean_urls {
        let mut with_html = stripped.clone();
        with_html.set_path(&format!("{}.html", stripped.path()));
        out.push(with_html);
    }

    out.dedup();
    out
}
