//! Term extraction for inverted indices.

use std::collections::BTreeMap;

use super::AttrValue;

/// Split text into lowercase terms, keeping those within `[min, max]` characters.
///
/// Any non-alphabetic character separates terms.
pub fn split_terms(text: &str, min: usize, max: usize) -> Vec<String> {
    text.split(|c: char| !c.is_alphabetic())
        .filter(|word| {
            let len = word.chars().count();
            len >= min && len <= max
        })
        .map(str::to_lowercase)
        .collect()
}

/// Count term occurrences across a text or list-of-text value.
pub fn term_frequencies(value: &AttrValue, min: usize, max: usize, out: &mut BTreeMap<String, u32>) {
    match value {
        AttrValue::Text(text) => {
            for term in split_terms(text, min, max) {
                *out.entry(term).or_insert(0) += 1;
            }
        }
        AttrValue::List(items) => {
            for item in items {
                if let AttrValue::Text(text) = item {
                    for term in split_terms(text, min, max) {
                        *out.entry(term).or_insert(0) += 1;
                    }
                }
            }
        }
        _ => {}
    }
}

/// Normalize query terms the same way indexed text is split, deduplicated and sorted.
pub fn normalize_query_terms(terms: &[String], min: usize, max: usize) -> Vec<String> {
    let mut normalized: Vec<String> = terms
        .iter()
        .flat_map(|t| split_terms(t, min, max))
        .collect();
    normalized.sort();
    normalized.dedup();
    normalized
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_terms_lowercases_and_filters_length() {
        let terms = split_terms("The News at 10: A Look-Back", 2, 30);
        assert_eq!(terms, vec!["the", "news", "at", "look", "back"]);
    }

    #[test]
    fn test_split_terms_respects_max() {
        let terms = split_terms("short extraordinarily", 2, 6);
        assert_eq!(terms, vec!["short"]);
    }

    #[test]
    fn test_split_terms_unicode() {
        let terms = split_terms("Café Müller", 3, 30);
        assert_eq!(terms, vec!["café", "müller"]);
    }

    #[test]
    fn test_term_frequencies_counts_list_items() {
        let mut out = BTreeMap::new();
        let value = AttrValue::from(vec!["Drama", "Crime Drama"]);
        term_frequencies(&value, 3, 30, &mut out);
        assert_eq!(out.get("drama"), Some(&2));
        assert_eq!(out.get("crime"), Some(&1));
    }

    #[test]
    fn test_normalize_query_terms_dedupes() {
        let terms = vec!["News".to_string(), "news sports".to_string(), "x".to_string()];
        assert_eq!(normalize_query_terms(&terms, 2, 30), vec!["news", "sports"]);
    }
}
