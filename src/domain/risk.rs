//! Risk tier classification.
//!
//! Maps the ensemble's positive-class probability to one of three tiers.
//! Thresholds, messages and colors are fixed business rules.

use serde::{Deserialize, Serialize};

/// Probability at which MEDIUM risk begins (inclusive).
pub const MEDIUM_THRESHOLD: f64 = 0.20;

/// Probability at which HIGH risk begins (inclusive).
pub const HIGH_THRESHOLD: f64 = 0.65;

/// Risk level classification for diabetes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RiskLevel {
    /// No immediate indicators
    Low,
    /// Lifestyle changes and monitoring recommended
    Medium,
    /// Professional consultation advised
    High,
}

impl RiskLevel {
    /// Classify a probability in [0, 1].
    #[must_use]
    pub fn from_probability(probability: f64) -> Self {
        if probability < MEDIUM_THRESHOLD {
            Self::Low
        } else if probability < HIGH_THRESHOLD {
            Self::Medium
        } else {
            Self::High
        }
    }

    /// Label shown to the user.
    #[must_use]
    pub fn label(&self) -> &'static str {
        match self {
            Self::Low => "LOW RISK",
            Self::Medium => "MEDIUM RISK",
            Self::High => "HIGH RISK",
        }
    }

    #[must_use]
    pub fn recommendation(&self) -> &'static str {
        match self {
            Self::Low => "No immediate risk detected. Maintain a healthy lifestyle.",
            Self::Medium => {
                "Moderate risk detected. Consider lifestyle improvements and monitor health."
            }
            Self::High => "High risk of diabetes. Please consult a healthcare professional soon.",
        }
    }

    /// Display color as a CSS hex token.
    #[must_use]
    pub fn color(&self) -> &'static str {
        match self {
            Self::Low => "#2e7d32",    // green 800
            Self::Medium => "#f9a825", // yellow 800
            Self::High => "#c62828",   // red 800
        }
    }
}

impl std::fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// Outcome returned to the client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskAssessment {
    /// Probability scaled to 0-100, rounded to two decimals
    pub risk_percent: f64,
    pub risk_level: String,
    pub recommendation: String,
    pub color: String,
}

impl RiskAssessment {
    /// Build the client-facing assessment for a probability.
    #[must_use]
    pub fn from_probability(probability: f64) -> Self {
        let level = RiskLevel::from_probability(probability);
        Self {
            risk_percent: risk_percent(probability),
            risk_level: level.label().to_string(),
            recommendation: level.recommendation().to_string(),
            color: level.color().to_string(),
        }
    }
}

/// `round(100 * p, 2)`.
///
/// Rounds the exact binary value of `100 * p` to two decimals, so values just
/// below a printed half-point round down.
#[must_use]
pub fn risk_percent(probability: f64) -> f64 {
    let percent = probability * 100.0;
    format!("{percent:.2}").parse::<f64>().unwrap_or(percent)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_risk_level_from_probability() {
        assert_eq!(RiskLevel::from_probability(0.0), RiskLevel::Low);
        assert_eq!(RiskLevel::from_probability(0.1999), RiskLevel::Low);
        assert_eq!(RiskLevel::from_probability(0.4), RiskLevel::Medium);
        assert_eq!(RiskLevel::from_probability(0.6499), RiskLevel::Medium);
        assert_eq!(RiskLevel::from_probability(0.9), RiskLevel::High);
        assert_eq!(RiskLevel::from_probability(1.0), RiskLevel::High);
    }

    #[test]
    fn test_threshold_boundaries_are_inclusive_upward() {
        assert_eq!(RiskLevel::from_probability(0.20), RiskLevel::Medium);
        assert_eq!(RiskLevel::from_probability(0.65), RiskLevel::High);
    }

    #[test]
    fn test_risk_percent_rounding() {
        assert_eq!(risk_percent(0.0), 0.0);
        assert_eq!(risk_percent(1.0), 100.0);
        assert_eq!(risk_percent(0.123456), 12.35);
        assert_eq!(risk_percent(0.5), 50.0);
        assert_eq!(risk_percent(0.98761), 98.76);
    }

    #[test]
    fn test_risk_percent_rounds_the_scaled_value_once() {
        assert_eq!(risk_percent(0.00015), 0.01);
        assert_eq!(risk_percent(0.00105), 0.1);
    }

    #[test]
    fn test_assessment_fields() {
        let low = RiskAssessment::from_probability(0.05);
        assert_eq!(low.risk_level, "LOW RISK");
        assert_eq!(low.color, "#2e7d32");
        assert_eq!(low.risk_percent, 5.0);

        let high = RiskAssessment::from_probability(0.81);
        assert_eq!(high.risk_level, "HIGH RISK");
        assert_eq!(high.color, "#c62828");
        assert!(high.recommendation.contains("healthcare professional"));
    }

    #[test]
    fn test_assessment_serializes_four_keys() {
        let value = serde_json::to_value(RiskAssessment::from_probability(0.3)).expect("serialize");
        let object = value.as_object().expect("object");
        assert_eq!(object.len(), 4);
        for key in ["risk_percent", "risk_level", "recommendation", "color"] {
            assert!(object.contains_key(key), "missing {key}");
        }
        assert_eq!(object["risk_level"], "MEDIUM RISK");
    }
}
