use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::extraction::{first_array, first_present, first_text, KeyPath};

/// Generated text, current response shape first.
const ANSWER_TEXT_PATHS: &[KeyPath<'static>] = &[&["output", "text"], &["generatedText"]];

/// Where the citation list may sit.
const CITATION_LIST_PATHS: &[KeyPath<'static>] = &[
    &["citations"],
    &["additionalModelResponse", "citations"],
];

/// Title lookups inside one retrieved reference.
const TITLE_PATHS: &[KeyPath<'static>] = &[
    &["content", "metadata", "x-amz-bedrock-kb-doc-title"],
    &["metadata", "x-amz-bedrock-kb-doc-title"],
    &["metadata", "title"],
];

/// Section lookups inside one retrieved reference.
const SECTION_PATHS: &[KeyPath<'static>] =
    &[&["content", "metadata", "section"], &["metadata", "section"]];

/// Page lookups; the Bedrock page-number key is the last resort.
const PAGE_PATHS: &[KeyPath<'static>] = &[
    &["content", "metadata", "page"],
    &["metadata", "page"],
    &["metadata", "x-amz-bedrock-kb-document-page-number"],
];

/// Source URI lookups.
const URI_PATHS: &[KeyPath<'static>] = &[
    &["location", "s3Location", "uri"],
    &["location", "s3Location", "s3Uri"],
    &["location", "webLocation", "url"],
];

/// Snippet lookups.
const SNIPPET_PATHS: &[KeyPath<'static>] = &[&["content", "text"], &["content", "excerpt"]];

/// One source reference backing a generated answer. Every field may be missing upstream.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Citation {
    pub title: Option<String>,
    pub section: Option<String>,
    /// Kept as the provider sent it, usually a number.
    pub page: Option<Value>,
    pub uri: Option<String>,
    pub snippet: Option<String>,
}

impl Citation {
    pub fn from_reference(reference: &Value) -> Self {
        Self {
            title: first_text(reference, TITLE_PATHS),
            section: first_text(reference, SECTION_PATHS),
            page: first_present(reference, PAGE_PATHS).cloned(),
            uri: first_text(reference, URI_PATHS),
            snippet: first_text(reference, SNIPPET_PATHS),
        }
    }

    /// Compact form written into batch result files.
    pub fn summary(&self) -> CitationSummary {
        CitationSummary {
            title: self.title.clone(),
            page: self.page.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CitationSummary {
    pub title: Option<String>,
    pub page: Option<Value>,
}

/// Stable response shape of the ask operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizedAnswer {
    pub answer: String,
    pub citations: Vec<Citation>,
    pub raw: Value,
}

impl NormalizedAnswer {
    pub fn from_raw(raw: Value) -> Self {
        Self {
            answer: answer_text(&raw),
            citations: extract_citations(&raw),
            raw,
        }
    }
}

/// Generated text, or an empty string when the response carries none.
pub fn answer_text(raw: &Value) -> String {
    first_text(raw, ANSWER_TEXT_PATHS).unwrap_or_default()
}

/// Flattens every retrieved reference of every citation, in response order.
pub fn extract_citations(raw: &Value) -> Vec<Citation> {
    first_array(raw, CITATION_LIST_PATHS)
        .iter()
        .flat_map(|citation| first_array(citation, &[&["retrievedReferences"]]))
        .map(Citation::from_reference)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn empty_response_yields_empty_answer_and_citations() {
        let normalized = NormalizedAnswer::from_raw(json!({}));
        assert_eq!(normalized.answer, "");
        assert!(normalized.citations.is_empty());

        let body = serde_json::to_value(&normalized).unwrap();
        assert_eq!(body["answer"], json!(""));
        assert_eq!(body["citations"], json!([]));
    }

    #[test]
    fn answer_text_prefers_output_text() {
        let raw = json!({ "output": { "text": "primary" }, "generatedText": "secondary" });
        assert_eq!(answer_text(&raw), "primary");

        let raw = json!({ "output": { "text": "" }, "generatedText": "secondary" });
        assert_eq!(answer_text(&raw), "secondary");
    }

    #[test]
    fn citations_fall_back_to_additional_model_response() {
        let raw = json!({
            "additionalModelResponse": {
                "citations": [{ "retrievedReferences": [{ "metadata": { "title": "GDPR" } }] }]
            }
        });
        let citations = extract_citations(&raw);
        assert_eq!(citations.len(), 1);
        assert_eq!(citations[0].title.as_deref(), Some("GDPR"));
    }

    #[test]
    fn top_level_citations_win_when_both_exist() {
        let raw = json!({
            "citations": [{ "retrievedReferences": [{ "metadata": { "title": "top" } }] }],
            "additionalModelResponse": {
                "citations": [{ "retrievedReferences": [{ "metadata": { "title": "nested" } }] }]
            }
        });
        let titles: Vec<_> = extract_citations(&raw)
            .into_iter()
            .filter_map(|c| c.title)
            .collect();
        assert_eq!(titles, vec!["top".to_string()]);
    }

    #[test]
    fn reference_fields_follow_preference_order() {
        let reference = json!({
            "content": {
                "text": "Consumers may request deletion of personal information.",
                "metadata": {
                    "x-amz-bedrock-kb-doc-title": "CCPA Handbook",
                    "section": "1798.105",
                    "page": 3
                }
            },
            "location": { "s3Location": { "s3Uri": "s3://bucket/ccpa.pdf" } },
            "metadata": { "title": "ignored", "page": 9 }
        });
        let citation = Citation::from_reference(&reference);
        assert_eq!(citation.title.as_deref(), Some("CCPA Handbook"));
        assert_eq!(citation.section.as_deref(), Some("1798.105"));
        assert_eq!(citation.page, Some(json!(3)));
        assert_eq!(citation.uri.as_deref(), Some("s3://bucket/ccpa.pdf"));
        assert_eq!(
            citation.snippet.as_deref(),
            Some("Consumers may request deletion of personal information.")
        );
    }

    #[test]
    fn bedrock_reference_metadata_is_understood() {
        let reference = json!({
            "content": { "excerpt": "Retention is 30 days." },
            "location": { "type": "S3", "s3Location": { "uri": "s3://bucket/retention.pdf" } },
            "metadata": {
                "x-amz-bedrock-kb-doc-title": "Retention Policy",
                "x-amz-bedrock-kb-document-page-number": 4.0
            }
        });
        let citation = Citation::from_reference(&reference);
        assert_eq!(citation.title.as_deref(), Some("Retention Policy"));
        assert_eq!(citation.page, Some(json!(4.0)));
        assert_eq!(citation.snippet.as_deref(), Some("Retention is 30 days."));
        assert_eq!(citation.section, None);
    }

    #[test]
    fn malformed_entries_degrade_to_empty_fields() {
        let raw = json!({
            "citations": [
                "not an object",
                { "retrievedReferences": "not a list" },
                { "retrievedReferences": [42, { "content": null }] }
            ]
        });
        let citations = extract_citations(&raw);
        assert_eq!(citations, vec![Citation::default(), Citation::default()]);
    }

    #[test]
    fn ccpa_scenario_yields_single_citation() {
        let raw = json!({
            "output": { "text": "Deletion requests are honoured within 45 days." },
            "citations": [{
                "retrievedReferences": [{
                    "content": { "text": "...", "metadata": { "page": 3 } },
                    "location": { "s3Location": { "uri": "s3://bucket/doc.pdf" } }
                }]
            }]
        });
        let normalized = NormalizedAnswer::from_raw(raw.clone());
        assert_eq!(normalized.citations.len(), 1);
        assert_eq!(normalized.citations[0].page, Some(json!(3)));
        assert_eq!(normalized.citations[0].uri.as_deref(), Some("s3://bucket/doc.pdf"));
        assert_eq!(normalized.raw, raw);
    }

    #[test]
    fn absent_fields_serialize_as_null() {
        let body = serde_json::to_value(Citation::default()).unwrap();
        assert_eq!(
            body,
            json!({ "title": null, "section": null, "page": null, "uri": null, "snippet": null })
        );
    }
}
