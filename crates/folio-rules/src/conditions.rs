//! Built-in condition evaluators

use folio_core::models::{normalize_tags, MediaCategory, ProcessingStatus, RuleCondition};
use serde_json::Value as JsonValue;

use crate::context::RuleContext;
use crate::error::{RuleError, RuleResult};
use crate::registry::ConditionEvaluator;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Operator {
    Eq,
    Neq,
    Gt,
    Gte,
    Lt,
    Lte,
    Prefix,
    Contains,
    Suffix,
}

impl Operator {
    fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_lowercase().as_str() {
            "eq" | "==" | "equals" => Some(Operator::Eq),
            "neq" | "!=" | "not_equals" => Some(Operator::Neq),
            "gt" | ">" => Some(Operator::Gt),
            "gte" | ">=" => Some(Operator::Gte),
            "lt" | "<" => Some(Operator::Lt),
            "lte" | "<=" => Some(Operator::Lte),
            "prefix" | "starts_with" => Some(Operator::Prefix),
            "contains" => Some(Operator::Contains),
            "suffix" | "ends_with" => Some(Operator::Suffix),
            _ => None,
        }
    }
}

/// Resolve the condition's operator, falling back to `default` when absent.
fn operator(
    condition: &RuleCondition,
    default: Operator,
    allowed: &[Operator],
) -> RuleResult<Operator> {
    let op = match condition.operator.as_deref() {
        None => default,
        Some(raw) => Operator::parse(raw).ok_or_else(|| {
            RuleError::condition(&condition.condition_type, format!("unknown operator '{}'", raw))
        })?,
    };
    if !allowed.contains(&op) {
        return Err(RuleError::condition(
            &condition.condition_type,
            format!("operator {:?} is not supported", op),
        ));
    }
    Ok(op)
}

fn string_value<'a>(condition: &'a RuleCondition) -> RuleResult<&'a str> {
    condition
        .value
        .as_str()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .ok_or_else(|| RuleError::condition(&condition.condition_type, "value must be a non-empty string"))
}

fn equality(op: Operator, equal: bool) -> bool {
    match op {
        Operator::Neq => !equal,
        _ => equal,
    }
}

/// `detected_type`: classification category equals (or not) the value.
pub struct DetectedTypeCondition;

impl DetectedTypeCondition {
    const OPERATORS: &'static [Operator] = &[Operator::Eq, Operator::Neq];

    /// Only `unknown` itself matches fallback classifications.
    fn category(condition: &RuleCondition) -> RuleResult<MediaCategory> {
        string_value(condition)?
            .parse()
            .map_err(|e: anyhow::Error| RuleError::condition(&condition.condition_type, e.to_string()))
    }
}

impl ConditionEvaluator for DetectedTypeCondition {
    fn condition_type(&self) -> &'static str {
        "detected_type"
    }

    fn validate(&self, condition: &RuleCondition) -> RuleResult<()> {
        operator(condition, Operator::Eq, Self::OPERATORS)?;
        Self::category(condition)?;
        Ok(())
    }

    fn evaluate(&self, condition: &RuleCondition, context: &RuleContext) -> RuleResult<bool> {
        let op = operator(condition, Operator::Eq, Self::OPERATORS)?;
        let expected = Self::category(condition)?;
        Ok(match context.detected_type() {
            Some(actual) => equality(op, actual == expected),
            None => false,
        })
    }
}

/// `min_confidence`: classification confidence compared with a number, `gte` by default.
pub struct MinConfidenceCondition;

impl MinConfidenceCondition {
    const OPERATORS: &'static [Operator] = &[
        Operator::Gte,
        Operator::Gt,
        Operator::Lte,
        Operator::Lt,
        Operator::Eq,
    ];

    fn threshold(condition: &RuleCondition) -> RuleResult<f64> {
        condition
            .value
            .as_f64()
            .filter(|v| v.is_finite())
            .ok_or_else(|| RuleError::condition(&condition.condition_type, "value must be a number"))
    }
}

impl ConditionEvaluator for MinConfidenceCondition {
    fn condition_type(&self) -> &'static str {
        "min_confidence"
    }

    fn validate(&self, condition: &RuleCondition) -> RuleResult<()> {
        operator(condition, Operator::Gte, Self::OPERATORS)?;
        Self::threshold(condition)?;
        Ok(())
    }

    fn evaluate(&self, condition: &RuleCondition, context: &RuleContext) -> RuleResult<bool> {
        let op = operator(condition, Operator::Gte, Self::OPERATORS)?;
        let threshold = Self::threshold(condition)?;
        let Some(confidence) = context.confidence() else {
            return Ok(false);
        };
        Ok(match op {
            Operator::Gt => confidence > threshold,
            Operator::Lte => confidence <= threshold,
            Operator::Lt => confidence < threshold,
            Operator::Eq => (confidence - threshold).abs() < f64::EPSILON,
            _ => confidence >= threshold,
        })
    }
}

/// `tag`: any of the listed tags is present. The value is a string or an array of strings.
pub struct TagCondition;

impl TagCondition {
    fn wanted(condition: &RuleCondition) -> RuleResult<Vec<String>> {
        let raw: Vec<String> = match &condition.value {
            JsonValue::String(tag) => vec![tag.clone()],
            JsonValue::Array(items) => items
                .iter()
                .map(|item| {
                    item.as_str().map(str::to_string).ok_or_else(|| {
                        RuleError::condition(&condition.condition_type, "tags must be strings")
                    })
                })
                .collect::<RuleResult<_>>()?,
            _ => {
                return Err(RuleError::condition(
                    &condition.condition_type,
                    "value must be a string or an array of strings",
                ))
            }
        };
        let tags = normalize_tags(raw);
        if tags.is_empty() {
            return Err(RuleError::condition(&condition.condition_type, "no tags given"));
        }
        Ok(tags)
    }
}

impl ConditionEvaluator for TagCondition {
    fn condition_type(&self) -> &'static str {
        "tag"
    }

    fn validate(&self, condition: &RuleCondition) -> RuleResult<()> {
        Self::wanted(condition).map(|_| ())
    }

    fn evaluate(&self, condition: &RuleCondition, context: &RuleContext) -> RuleResult<bool> {
        let wanted = Self::wanted(condition)?;
        Ok(context
            .tags
            .iter()
            .any(|tag| wanted.iter().any(|w| w.eq_ignore_ascii_case(tag))))
    }
}

/// `mime_type`: equality, or `prefix` for families such as `image/`.
pub struct MimeTypeCondition;

impl MimeTypeCondition {
    const OPERATORS: &'static [Operator] = &[Operator::Eq, Operator::Neq, Operator::Prefix];
}

impl ConditionEvaluator for MimeTypeCondition {
    fn condition_type(&self) -> &'static str {
        "mime_type"
    }

    fn validate(&self, condition: &RuleCondition) -> RuleResult<()> {
        operator(condition, Operator::Eq, Self::OPERATORS)?;
        string_value(condition)?;
        Ok(())
    }

    fn evaluate(&self, condition: &RuleCondition, context: &RuleContext) -> RuleResult<bool> {
        let op = operator(condition, Operator::Eq, Self::OPERATORS)?;
        let expected = string_value(condition)?.to_lowercase();
        let Some(actual) = context.mime_type.as_deref() else {
            return Ok(false);
        };
        let actual = actual.to_lowercase();
        Ok(match op {
            Operator::Prefix => actual.starts_with(&expected),
            _ => equality(op, actual == expected),
        })
    }
}

/// `status`: processing status equals (or not) the value.
pub struct StatusCondition;

impl StatusCondition {
    const OPERATORS: &'static [Operator] = &[Operator::Eq, Operator::Neq];

    fn expected(condition: &RuleCondition) -> RuleResult<ProcessingStatus> {
        string_value(condition)?
            .parse()
            .map_err(|e: anyhow::Error| RuleError::condition(&condition.condition_type, e.to_string()))
    }
}

impl ConditionEvaluator for StatusCondition {
    fn condition_type(&self) -> &'static str {
        "status"
    }

    fn validate(&self, condition: &RuleCondition) -> RuleResult<()> {
        operator(condition, Operator::Eq, Self::OPERATORS)?;
        Self::expected(condition)?;
        Ok(())
    }

    fn evaluate(&self, condition: &RuleCondition, context: &RuleContext) -> RuleResult<bool> {
        let op = operator(condition, Operator::Eq, Self::OPERATORS)?;
        let expected = Self::expected(condition)?;
        Ok(match context.status {
            Some(actual) => equality(op, actual == expected),
            None => false,
        })
    }
}

/// `filename`: case-insensitive `contains` (default) or `suffix` match.
pub struct FilenameCondition;

impl FilenameCondition {
    const OPERATORS: &'static [Operator] = &[Operator::Contains, Operator::Suffix];
}

impl ConditionEvaluator for FilenameCondition {
    fn condition_type(&self) -> &'static str {
        "filename"
    }

    fn validate(&self, condition: &RuleCondition) -> RuleResult<()> {
        operator(condition, Operator::Contains, Self::OPERATORS)?;
        string_value(condition)?;
        Ok(())
    }

    fn evaluate(&self, condition: &RuleCondition, context: &RuleContext) -> RuleResult<bool> {
        let op = operator(condition, Operator::Contains, Self::OPERATORS)?;
        let needle = string_value(condition)?.to_lowercase();
        let Some(filename) = context.filename.as_deref() else {
            return Ok(false);
        };
        let filename = filename.to_lowercase();
        Ok(match op {
            Operator::Suffix => filename.ends_with(&needle),
            _ => filename.contains(&needle),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use folio_core::models::Classification;
    use serde_json::json;

    fn cond(condition_type: &str, value: JsonValue, operator: Option<&str>) -> RuleCondition {
        RuleCondition {
            condition_type: condition_type.to_string(),
            value,
            operator: operator.map(str::to_string),
        }
    }

    fn tattoo_context(confidence: f64) -> RuleContext {
        let mut classification = Classification::fallback("unused");
        classification.detected_type = MediaCategory::Tattoo;
        classification.confidence = confidence;
        RuleContext {
            filename: Some("Koi_Sleeve.HEIC".to_string()),
            mime_type: Some("image/jpeg".to_string()),
            status: Some(ProcessingStatus::Completed),
            tags: vec!["koi".to_string(), "sleeve".to_string()],
            classification: Some(classification),
            ..Default::default()
        }
    }

    #[test]
    fn detected_type_eq_and_neq() {
        let ctx = tattoo_context(0.9);
        assert!(DetectedTypeCondition
            .evaluate(&cond("detected_type", json!("tattoo"), None), &ctx)
            .unwrap());
        assert!(!DetectedTypeCondition
            .evaluate(&cond("detected_type", json!("artwork"), None), &ctx)
            .unwrap());
        assert!(DetectedTypeCondition
            .evaluate(&cond("detected_type", json!("artwork"), Some("neq")), &ctx)
            .unwrap());
    }

    #[test]
    fn detected_type_rejects_unrecognized_categories() {
        let fallback = RuleContext {
            classification: Some(Classification::fallback("timeout")),
            ..Default::default()
        };
        for value in ["landscape", "tatto"] {
            let c = cond("detected_type", json!(value), None);
            assert!(DetectedTypeCondition.validate(&c).is_err());
            assert!(DetectedTypeCondition.evaluate(&c, &fallback).is_err());
        }

        let unknown = cond("detected_type", json!("unknown"), None);
        assert!(DetectedTypeCondition.validate(&unknown).is_ok());
        assert!(DetectedTypeCondition.evaluate(&unknown, &fallback).unwrap());
        assert!(!DetectedTypeCondition
            .evaluate(&cond("detected_type", json!("tattoo"), None), &fallback)
            .unwrap());
    }

    #[test]
    fn missing_classification_is_false() {
        let ctx = RuleContext::default();
        assert!(!DetectedTypeCondition
            .evaluate(&cond("detected_type", json!("tattoo"), Some("neq")), &ctx)
            .unwrap());
        assert!(!MinConfidenceCondition
            .evaluate(&cond("min_confidence", json!(0.0), None), &ctx)
            .unwrap());
        assert!(!MimeTypeCondition
            .evaluate(&cond("mime_type", json!("image/"), Some("prefix")), &ctx)
            .unwrap());
    }

    #[test]
    fn confidence_threshold_is_monotonic() {
        let c = cond("min_confidence", json!(0.7), None);
        assert!(MinConfidenceCondition.evaluate(&c, &tattoo_context(0.85)).unwrap());
        assert!(MinConfidenceCondition.evaluate(&c, &tattoo_context(0.7)).unwrap());
        assert!(!MinConfidenceCondition.evaluate(&c, &tattoo_context(0.5)).unwrap());

        let below = cond("min_confidence", json!(0.7), Some("lt"));
        assert!(MinConfidenceCondition.evaluate(&below, &tattoo_context(0.5)).unwrap());
    }

    #[test]
    fn tag_any_of() {
        let ctx = tattoo_context(0.9);
        assert!(TagCondition
            .evaluate(&cond("tag", json!(["dragon", "KOI"]), None), &ctx)
            .unwrap());
        assert!(!TagCondition
            .evaluate(&cond("tag", json!("dragon"), None), &ctx)
            .unwrap());
        assert!(TagCondition.validate(&cond("tag", json!(42), None)).is_err());
    }

    #[test]
    fn mime_prefix_and_status() {
        let ctx = tattoo_context(0.9);
        assert!(MimeTypeCondition
            .evaluate(&cond("mime_type", json!("image/"), Some("prefix")), &ctx)
            .unwrap());
        assert!(!MimeTypeCondition
            .evaluate(&cond("mime_type", json!("image/png"), None), &ctx)
            .unwrap());
        assert!(StatusCondition
            .evaluate(&cond("status", json!("completed"), None), &ctx)
            .unwrap());
        assert!(StatusCondition
            .validate(&cond("status", json!("archived"), None))
            .is_err());
    }

    #[test]
    fn filename_matches_case_insensitively() {
        let ctx = tattoo_context(0.9);
        assert!(FilenameCondition
            .evaluate(&cond("filename", json!("sleeve"), None), &ctx)
            .unwrap());
        assert!(FilenameCondition
            .evaluate(&cond("filename", json!(".heic"), Some("suffix")), &ctx)
            .unwrap());
    }

    #[test]
    fn unsupported_operator_is_rejected() {
        assert!(DetectedTypeCondition
            .validate(&cond("detected_type", json!("tattoo"), Some("gte")))
            .is_err());
        assert!(MimeTypeCondition
            .validate(&cond("mime_type", json!("image/"), Some("between")))
            .is_err());
    }
}
