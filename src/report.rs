//! Human and machine readable rendering of results and store state.

use std::fmt::Write;

use serde_json::json;

use crate::features::RangeTable;
use crate::models::ClassifierKind;
use crate::models::store::SlotStatus;
use crate::predict::{PredictionResult, round2};

/// Multi-line summary of one prediction.
pub fn prediction_text(model: ClassifierKind, result: &PredictionResult) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Model:                {model}");
    let _ = writeln!(out, "Status:               {}", result.label);
    match (result.failure_probability_pct(), result.confidence_pct()) {
        (Some(p), Some(c)) => {
            let _ = writeln!(out, "Failure probability:  {:.2}%", round2(p));
            let _ = writeln!(out, "Confidence:           {:.2}%", round2(c));
        }
        _ => {
            let _ = writeln!(out, "Failure probability:  unavailable");
            let _ = writeln!(out, "Confidence:           unavailable");
        }
    }
    out
}

/// One prediction as a JSON object. Percentages are `null` when the
/// classifier gave no probabilities.
pub fn prediction_json(model: ClassifierKind, result: &PredictionResult) -> serde_json::Value {
    json!({
        "model": model.as_str(),
        "status": result.label,
        "failure_probability_pct": result.failure_probability_pct().map(round2),
        "confidence_pct": result.confidence_pct().map(round2),
        "probability_available": result.probability_available,
    })
}

/// Load status of every model slot, one per line.
pub fn status_text(status: &[SlotStatus]) -> String {
    status.iter().map(|s| format!("{s}\n")).collect()
}

/// The active range table, canonical fields first, then the type domain.
pub fn ranges_text(table: &RangeTable) -> String {
    let mut out = String::new();
    for r in table.iter() {
        let _ = writeln!(out, "{:<24} {:>10} {:>10}", r.feature_name, r.min, r.max);
    }
    let _ = writeln!(out, "{:<24} {}", "type", table.type_domain().join(", "));
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::predict::Label;

    fn failing() -> PredictionResult {
        PredictionResult {
            label: Label::Failure,
            failure_probability: 0.87654,
            probability_available: true,
        }
    }

    #[test]
    fn text_shows_status_and_percentages() {
        let text = prediction_text(ClassifierKind::Svm, &failing());
        assert!(text.contains("Model:                svm"));
        assert!(text.contains("Status:               FAILURE"));
        assert!(text.contains("87.65%"));
    }

    #[test]
    fn text_marks_missing_probability() {
        let r = PredictionResult {
            label: Label::Safe,
            failure_probability: 0.0,
            probability_available: false,
        };
        let text = prediction_text(ClassifierKind::Knn, &r);
        assert!(text.contains("SAFE"));
        assert!(text.contains("unavailable"));
        assert!(!text.contains('%'));
    }

    #[test]
    fn json_fields() {
        let v = prediction_json(ClassifierKind::DecisionTree, &failing());
        assert_eq!(v["model"], "decision-tree");
        assert_eq!(v["status"], "FAILURE");
        assert_eq!(v["failure_probability_pct"], 87.65);
        assert_eq!(v["probability_available"], true);
    }

    #[test]
    fn json_nulls_percentages_without_probability() {
        let r = PredictionResult {
            label: Label::Safe,
            failure_probability: 0.0,
            probability_available: false,
        };
        let v = prediction_json(ClassifierKind::Svm, &r);
        assert_eq!(v["status"], "SAFE");
        assert!(v["failure_probability_pct"].is_null());
        assert!(v["confidence_pct"].is_null());
        assert_eq!(v["probability_available"], false);
    }

    #[test]
    fn ranges_in_canonical_order() {
        let text = ranges_text(&RangeTable::default());
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 6);
        assert!(lines[0].starts_with("air_temperature_k"));
        assert!(lines[3].contains("76.6"));
        assert_eq!(lines[5], format!("{:<24} L, M, H", "type"));
    }

    #[test]
    fn status_lines_mark_unavailable_slots() {
        let status = vec![
            SlotStatus {
                name: "scaler".into(),
                loaded: true,
                detail: "5 features".into(),
            },
            SlotStatus {
                name: "svm".into(),
                loaded: false,
                detail: "not configured".into(),
            },
        ];
        let text = status_text(&status);
        assert_eq!(text.lines().count(), 2);
        assert!(text.lines().nth(1).unwrap().contains("UNAVAILABLE"));
    }
}
