//! AI enrichment results: free-form analysis and category classification

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt::{Display, Formatter, Result as FmtResult};
use std::str::FromStr;

/// Tags attached when the vision service cannot produce any.
pub const FALLBACK_TAGS: &[&str] = &["uncategorized", "needs-review"];

/// Binary portfolio category plus an explicit unknown.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaCategory {
    Tattoo,
    Artwork,
    #[serde(other)]
    Unknown,
}

impl MediaCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            MediaCategory::Tattoo => "tattoo",
            MediaCategory::Artwork => "artwork",
            MediaCategory::Unknown => "unknown",
        }
    }

    /// Lenient parse used for model output; anything unrecognized is `Unknown`.
    pub fn parse_lenient(value: &str) -> Self {
        match value.trim().to_lowercase().as_str() {
            "tattoo" | "tattoos" => MediaCategory::Tattoo,
            "artwork" | "art" | "painting" | "illustration" => MediaCategory::Artwork,
            _ => MediaCategory::Unknown,
        }
    }
}

impl Display for MediaCategory {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.write_str(self.as_str())
    }
}

/// Strict parse for operator-authored values such as rule conditions.
impl FromStr for MediaCategory {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "tattoo" => Ok(MediaCategory::Tattoo),
            "artwork" => Ok(MediaCategory::Artwork),
            "unknown" => Ok(MediaCategory::Unknown),
            other => Err(anyhow::anyhow!("Invalid media category: {}", other)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryDetection {
    pub score: f64,
    pub reasoning: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Classification {
    pub detected_type: MediaCategory,
    /// Always within `[0, 1]`.
    pub confidence: f64,
    #[serde(default)]
    pub detections: BTreeMap<MediaCategory, CategoryDetection>,
    #[serde(default)]
    pub suggested_tags: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub suggested_category: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub placement: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub style: Option<String>,
}

impl Classification {
    /// Neutral result recorded when classification could not run or returned garbage.
    pub fn fallback(reason: &str) -> Self {
        let mut detections = BTreeMap::new();
        detections.insert(
            MediaCategory::Unknown,
            CategoryDetection {
                score: 0.0,
                reasoning: format!("classification failed: {}", reason),
            },
        );
        Self {
            detected_type: MediaCategory::Unknown,
            confidence: 0.0,
            detections,
            suggested_tags: fallback_tags(),
            suggested_category: None,
            placement: None,
            style: None,
        }
    }

    pub fn is_fallback(&self) -> bool {
        self.detected_type == MediaCategory::Unknown && self.confidence == 0.0
    }

    /// Clamp scores into range and normalize tag lists.
    pub fn sanitized(mut self) -> Self {
        self.confidence = clamp_unit(self.confidence);
        for detection in self.detections.values_mut() {
            detection.score = clamp_unit(detection.score);
        }
        self.suggested_tags = normalize_tags(self.suggested_tags);
        self
    }
}

/// Output of the descriptive analysis call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageAnalysis {
    pub tags: Vec<String>,
    pub title: String,
    pub description: String,
    pub alt_text: String,
}

impl ImageAnalysis {
    pub fn fallback(filename: &str) -> Self {
        let stem = filename
            .rsplit_once('.')
            .map(|(stem, _)| stem)
            .unwrap_or(filename)
            .replace(['_', '-'], " ");
        let stem = stem.trim();
        let title = if stem.is_empty() {
            "Untitled".to_string()
        } else {
            stem.to_string()
        };
        Self {
            tags: fallback_tags(),
            alt_text: format!("Image: {}", title),
            title,
            description: String::new(),
        }
    }
}

pub fn fallback_tags() -> Vec<String> {
    FALLBACK_TAGS.iter().map(|t| t.to_string()).collect()
}

/// Trim, lowercase and de-duplicate tags, keeping first-seen order.
pub fn normalize_tags<I, S>(tags: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut out: Vec<String> = Vec::new();
    for tag in tags {
        let tag = tag.as_ref().trim().to_lowercase();
        if !tag.is_empty() && !out.contains(&tag) {
            out.push(tag);
        }
    }
    out
}

/// Union of two tag lists, existing tags first.
pub fn merge_tags(existing: &[String], additional: &[String]) -> Vec<String> {
    normalize_tags(existing.iter().chain(additional.iter()))
}

fn clamp_unit(value: f64) -> f64 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, 1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fallback_has_zero_confidence_and_tags() {
        let c = Classification::fallback("timeout");
        assert_eq!(c.detected_type, MediaCategory::Unknown);
        assert_eq!(c.confidence, 0.0);
        assert!(!c.suggested_tags.is_empty());
        let reasoning = &c.detections[&MediaCategory::Unknown].reasoning;
        assert!(reasoning.contains("failed"));
        assert!(c.is_fallback());
    }

    #[test]
    fn unknown_category_deserializes_to_unknown() {
        let c: Classification = serde_json::from_value(serde_json::json!({
            "detected_type": "photograph",
            "confidence": 0.4
        }))
        .unwrap();
        assert_eq!(c.detected_type, MediaCategory::Unknown);
        assert!(c.detections.is_empty());
    }

    #[test]
    fn strict_category_parse_rejects_lenient_aliases() {
        assert_eq!("Tattoo".parse::<MediaCategory>().unwrap(), MediaCategory::Tattoo);
        assert_eq!("unknown".parse::<MediaCategory>().unwrap(), MediaCategory::Unknown);
        assert!("tatto".parse::<MediaCategory>().is_err());
        assert!("painting".parse::<MediaCategory>().is_err());
        assert_eq!(MediaCategory::parse_lenient("painting"), MediaCategory::Artwork);
    }

    #[test]
    fn sanitized_clamps_scores() {
        let c = Classification {
            confidence: 1.7,
            ..Classification::fallback("x")
        }
        .sanitized();
        assert_eq!(c.confidence, 1.0);
    }

    #[test]
    fn merge_tags_keeps_order_and_dedupes() {
        let merged = merge_tags(
            &["Sunset".to_string(), "sky".to_string()],
            &["sky".to_string(), " ocean ".to_string()],
        );
        assert_eq!(merged, vec!["sunset", "sky", "ocean"]);
    }

    #[test]
    fn analysis_fallback_uses_filename() {
        let a = ImageAnalysis::fallback("koi_sleeve.jpg");
        assert_eq!(a.title, "koi sleeve");
        assert_eq!(a.alt_text, "Image: koi sleeve");
        assert!(!a.tags.is_empty());
    }
}
