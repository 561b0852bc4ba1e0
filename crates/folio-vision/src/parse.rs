//! Parsing of model text output into typed results

use folio_core::models::{
    fallback_tags, normalize_tags, CategoryDetection, Classification, ImageAnalysis,
    MediaCategory,
};
use serde::Deserialize;
use std::collections::{BTreeMap, HashMap};

use crate::classifier::{VisionError, VisionResult};

/// Extract the JSON payload from a reply that may wrap it in markdown fences.
pub(crate) fn extract_json(text: &str) -> &str {
    if text.contains("```json") {
        text.split("```json")
            .nth(1)
            .and_then(|s| s.split("```").next())
            .unwrap_or(text)
            .trim()
    } else if text.contains("```") {
        text.split("```")
            .nth(1)
            .and_then(|s| s.split("```").next())
            .unwrap_or(text)
            .trim()
    } else {
        text.trim()
    }
}

#[derive(Debug, Deserialize)]
struct RawAnalysis {
    #[serde(default)]
    tags: Vec<String>,
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default, alias = "altText")]
    alt_text: Option<String>,
}

pub(crate) fn parse_analysis(text: &str) -> VisionResult<ImageAnalysis> {
    let raw: RawAnalysis = serde_json::from_str(extract_json(text))
        .map_err(|e| VisionError::MalformedResponse(format!("analysis is not valid JSON: {}", e)))?;

    let tags = normalize_tags(raw.tags);
    let description = raw.description.unwrap_or_default().trim().to_string();
    if tags.is_empty() && description.is_empty() {
        return Err(VisionError::MalformedResponse(
            "analysis contained neither tags nor description".to_string(),
        ));
    }

    let tags = if tags.is_empty() { fallback_tags() } else { tags };

    let title = raw
        .title
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
        .unwrap_or_else(|| "Untitled".to_string());
    let alt_text = raw
        .alt_text
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
        .unwrap_or_else(|| title.clone());

    Ok(ImageAnalysis {
        tags,
        title,
        description,
        alt_text,
    })
}

#[derive(Debug, Deserialize)]
struct RawDetection {
    #[serde(default)]
    score: f64,
    #[serde(default)]
    reasoning: String,
}

#[derive(Debug, Deserialize)]
struct RawClassification {
    #[serde(alias = "detectedType")]
    detected_type: String,
    confidence: f64,
    #[serde(default)]
    detections: HashMap<String, RawDetection>,
    #[serde(default, alias = "suggestedTags")]
    suggested_tags: Vec<String>,
    #[serde(default, alias = "suggestedCategory")]
    suggested_category: Option<String>,
    #[serde(default)]
    placement: Option<String>,
    #[serde(default)]
    style: Option<String>,
}

pub(crate) fn parse_classification(text: &str) -> VisionResult<Classification> {
    let raw: RawClassification = serde_json::from_str(extract_json(text)).map_err(|e| {
        VisionError::MalformedResponse(format!("classification is not valid JSON: {}", e))
    })?;

    if !raw.confidence.is_finite() {
        return Err(VisionError::MalformedResponse(
            "confidence is not a number".to_string(),
        ));
    }

    let mut detections = BTreeMap::new();
    for (name, detection) in raw.detections {
        let category = MediaCategory::parse_lenient(&name);
        if category == MediaCategory::Unknown {
            continue;
        }
        detections.insert(
            category,
            CategoryDetection {
                score: detection.score,
                reasoning: detection.reasoning,
            },
        );
    }

    let non_empty = |value: Option<String>| {
        value
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    };

    Ok(Classification {
        detected_type: MediaCategory::parse_lenient(&raw.detected_type),
        confidence: raw.confidence,
        detections,
        suggested_tags: raw.suggested_tags,
        suggested_category: non_empty(raw.suggested_category),
        placement: non_empty(raw.placement),
        style: non_empty(raw.style),
    }
    .sanitized())
}
