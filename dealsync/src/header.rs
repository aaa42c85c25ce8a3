//! Destination header resolution.
//!
//! Headers drift from the labels the mapping produces: case, spacing and underscores vary,
//! and some headers embed a label among other words. [`HeaderResolver`] runs an ordered chain
//! of [`HeaderMatcher`]s over normalized text and returns the first match.

use regex::Regex;

/// Lowercases and removes whitespace and underscores.
pub fn normalize(text: &str) -> String {
    text.chars()
        .filter(|c| !c.is_whitespace() && *c != '_')
        .flat_map(char::to_lowercase)
        .collect()
}

/// Normalized keys, with word patterns compiled once for every header they are matched
/// against.
#[derive(Debug, Clone)]
pub struct MatchKeys {
    texts: Vec<String>,
    word_patterns: Vec<Option<Regex>>,
}

impl MatchKeys {
    pub fn new<K: AsRef<str>>(keys: &[K]) -> Self {
        let texts: Vec<String> = keys.iter().map(|key| normalize(key.as_ref())).collect();
        let word_patterns = texts
            .iter()
            .map(|text| {
                if text.is_empty() {
                    return None;
                }
                Regex::new(&format!(r"\b{}\b", regex::escape(text))).ok()
            })
            .collect();

        Self {
            texts,
            word_patterns,
        }
    }

    pub fn texts(&self) -> &[String] {
        &self.texts
    }

    fn word_pattern(&self, index: usize) -> Option<&Regex> {
        self.word_patterns.get(index).and_then(Option::as_ref)
    }
}

/// One strategy for matching a normalized header against normalized keys.
pub trait HeaderMatcher: Send + Sync {
    /// Name used in logs.
    fn name(&self) -> &'static str;

    /// Returns the index of the key matching `header`, if any.
    fn find(&self, header: &str, keys: &MatchKeys) -> Option<usize>;
}

/// Matches when the normalized header equals the normalized key.
#[derive(Debug, Default, Clone, Copy)]
pub struct ExactMatcher;

impl HeaderMatcher for ExactMatcher {
    fn name(&self) -> &'static str {
        "exact"
    }

    fn find(&self, header: &str, keys: &MatchKeys) -> Option<usize> {
        keys.texts().iter().position(|key| key == header)
    }
}

/// Matches when the key appears in the header as a whole word.
#[derive(Debug, Default, Clone, Copy)]
pub struct WordBoundaryMatcher;

impl HeaderMatcher for WordBoundaryMatcher {
    fn name(&self) -> &'static str {
        "word_boundary"
    }

    fn find(&self, header: &str, keys: &MatchKeys) -> Option<usize> {
        (0..keys.texts().len()).find(|&index| {
            keys.word_pattern(index)
                .is_some_and(|pattern| pattern.is_match(header))
        })
    }
}

/// Matches when either text contains the other, preferring the longest key.
///
/// Ties keep the first key in order.
#[derive(Debug, Default, Clone, Copy)]
pub struct SubstringMatcher;

impl HeaderMatcher for SubstringMatcher {
    fn name(&self) -> &'static str {
        "substring"
    }

    fn find(&self, header: &str, keys: &MatchKeys) -> Option<usize> {
        let mut best: Option<(usize, usize)> = None;

        for (index, key) in keys.texts().iter().enumerate() {
            if key.is_empty() || header.is_empty() {
                continue;
            }
            if !header.contains(key.as_str()) && !key.contains(header) {
                continue;
            }
            if best.is_none_or(|(_, length)| key.len() > length) {
                best = Some((index, key.len()));
            }
        }

        best.map(|(index, _)| index)
    }
}

/// Ordered chain of matchers; the first matcher that finds a key wins.
pub struct HeaderResolver {
    matchers: Vec<Box<dyn HeaderMatcher>>,
}

impl HeaderResolver {
    pub fn new(matchers: Vec<Box<dyn HeaderMatcher>>) -> Self {
        Self { matchers }
    }

    /// Returns the index of the key that `header` resolves to.
    pub fn resolve<K: AsRef<str>>(&self, header: &str, keys: &[K]) -> Option<usize> {
        self.resolve_normalized(&normalize(header), &MatchKeys::new(keys))
    }

    fn resolve_normalized(&self, header: &str, keys: &MatchKeys) -> Option<usize> {
        self.matchers
            .iter()
            .find_map(|matcher| matcher.find(header, keys))
    }

    /// Resolves every header against `keys`, returning one entry per header column.
    pub fn plan<H, K>(&self, headers: &[H], keys: &[K]) -> Vec<Option<usize>>
    where
        H: AsRef<str>,
        K: AsRef<str>,
    {
        let keys = MatchKeys::new(keys);

        headers
            .iter()
            .map(|header| self.resolve_normalized(&normalize(header.as_ref()), &keys))
            .collect()
    }

    /// Returns the required labels that no header resolves to, in the order given.
    pub fn missing_headers<H, R>(&self, headers: &[H], required: &[R]) -> Vec<String>
    where
        H: AsRef<str>,
        R: AsRef<str>,
    {
        let headers: Vec<String> = headers.iter().map(|header| normalize(header.as_ref())).collect();

        required
            .iter()
            .filter(|label| {
                let key = MatchKeys::new(&[label.as_ref()]);
                !headers
                    .iter()
                    .any(|header| self.resolve_normalized(header, &key).is_some())
            })
            .map(|label| label.as_ref().to_owned())
            .collect()
    }
}

impl Default for HeaderResolver {
    fn default() -> Self {
        Self::new(vec![
            Box::new(ExactMatcher),
            Box::new(WordBoundaryMatcher),
            Box::new(SubstringMatcher),
        ])
    }
}

impl std::fmt::Debug for HeaderResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list()
            .entries(self.matchers.iter().map(|matcher| matcher.name()))
            .finish()
    }
}

/// Finds the column whose normalized header equals the normalized label.
pub fn find_column<H: AsRef<str>>(headers: &[H], label: &str) -> Option<usize> {
    let label = normalize(label);
    headers
        .iter()
        .position(|header| normalize(header.as_ref()) == label)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn match_keys(keys: &[&str]) -> MatchKeys {
        MatchKeys::new(keys)
    }

    #[test]
    fn normalization_ignores_case_whitespace_and_underscores() {
        assert_eq!(normalize(" Deal  Owner "), "dealowner");
        assert_eq!(normalize("deal_owner"), "dealowner");
        assert_eq!(normalize("Won\tDate"), "wondate");
    }

    #[test]
    fn exact_tier_matches_equal_normalized_text() {
        let keys = match_keys(&["Amount", "Deal Owner"]);
        assert_eq!(ExactMatcher.find("dealowner", &keys), Some(1));
        assert_eq!(ExactMatcher.find("owner", &keys), None);
    }

    #[test]
    fn word_boundary_tier_finds_embedded_keys() {
        let keys = match_keys(&["Amount", "Deal Owner"]);
        assert_eq!(WordBoundaryMatcher.find("amount(usd)", &keys), Some(0));
        assert_eq!(WordBoundaryMatcher.find("totalamount", &keys), None);
    }

    #[test]
    fn word_boundary_tier_escapes_keys() {
        let keys = match_keys(&["Amount ($)"]);
        assert_eq!(WordBoundaryMatcher.find("amount($)", &keys), None);
        assert_eq!(WordBoundaryMatcher.find("amountx", &keys), None);
    }

    #[test]
    fn substring_tier_prefers_longest_key() {
        let dates = match_keys(&["Date", "Won Date", "Won"]);
        assert_eq!(SubstringMatcher.find("dealwondate", &dates), Some(1));

        let deals = match_keys(&["Deal Id", "Deal"]);
        assert_eq!(SubstringMatcher.find("de", &deals), Some(0));
    }

    #[test]
    fn word_patterns_are_compiled_once_per_key() {
        let keys = match_keys(&["Amount", "", "Won Date"]);

        assert_eq!(keys.texts(), &["amount", "", "wondate"]);
        assert!(keys.word_pattern(0).is_some());
        assert!(keys.word_pattern(1).is_none());
        assert_eq!(WordBoundaryMatcher.find("wondate(closed)", &keys), Some(2));
        assert_eq!(WordBoundaryMatcher.find("", &keys), None);
    }

    #[test]
    fn resolver_runs_tiers_in_order() {
        let resolver = HeaderResolver::default();
        let labels = ["Amount", "Deal Owner", "Won Date"];

        assert_eq!(resolver.resolve("deal_owner", &labels), Some(1));
        assert_eq!(resolver.resolve(" AMOUNT ", &labels), Some(0));
        assert_eq!(resolver.resolve("Won Date (closed)", &labels), Some(2));
        assert_eq!(resolver.resolve("Pipeline", &labels), None);
    }

    #[test]
    fn every_normalized_equal_pair_resolves() {
        let resolver = HeaderResolver::default();
        for (header, key) in [
            ("Deal Id", "deal_id"),
            ("CREATE DATE", "Create Date"),
            ("contract_type", "Contract  Type"),
        ] {
            assert_eq!(resolver.resolve(header, &[key]), Some(0), "{header} vs {key}");
        }
    }

    #[test]
    fn plan_maps_each_header_column() {
        let resolver = HeaderResolver::default();
        let plan = resolver.plan(
            &["Deal Id", "Amount", "Notes", "Deal Owner"],
            &["Amount", "Deal Owner"],
        );
        assert_eq!(plan, vec![None, Some(0), None, Some(1)]);
    }

    #[test]
    fn missing_headers_are_reported_by_label() {
        let resolver = HeaderResolver::default();
        let missing = resolver.missing_headers(
            &["Deal Id", "Amount", "Deal Owner", "Create Date"],
            &["Amount", "Won Date", "Deal Owner", "Estimate Date"],
        );
        assert_eq!(missing, vec!["Won Date".to_owned(), "Estimate Date".to_owned()]);
    }

    #[test]
    fn key_column_requires_normalized_equality() {
        let headers = ["Deal Name", "deal_id", "Amount"];
        assert_eq!(find_column(&headers, "Deal Id"), Some(1));
        assert_eq!(find_column(&headers, "Deal"), None);
    }
}
