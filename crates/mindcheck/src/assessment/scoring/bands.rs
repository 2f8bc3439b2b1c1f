use serde::{Deserialize, Serialize};

/// Scores strictly above this value are flagged as at risk.
pub const AT_RISK_THRESHOLD: f64 = 50.0;

const MILD_FLOOR: f64 = 30.0;
const MODERATE_FLOOR: f64 = 50.0;
const SEVERE_FLOOR: f64 = 70.0;

/// Discrete risk category derived from a normalized score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SeverityBand {
    Minimal,
    Mild,
    Moderate,
    Severe,
}

impl SeverityBand {
    /// Bands are closed on their lower bound: `[0,30) [30,50) [50,70) [70,100]`.
    pub fn from_score(score: f64) -> Self {
        if score < MILD_FLOOR {
            SeverityBand::Minimal
        } else if score < MODERATE_FLOOR {
            SeverityBand::Mild
        } else if score < SEVERE_FLOOR {
            SeverityBand::Moderate
        } else {
            SeverityBand::Severe
        }
    }

    pub const fn label(self) -> &'static str {
        match self {
            SeverityBand::Minimal => "Minimal",
            SeverityBand::Mild => "Mild",
            SeverityBand::Moderate => "Moderate",
            SeverityBand::Severe => "Severe",
        }
    }

    /// Follow-up guidance shown alongside the result.
    pub fn recommendations(self) -> &'static [&'static str] {
        match self {
            SeverityBand::Minimal => &[
                "Continue monitoring your mental health",
                "Practice regular self-care activities",
                "Maintain healthy sleep patterns",
            ],
            SeverityBand::Mild => &[
                "Consider speaking with a mental health professional",
                "Practice mindfulness and stress reduction techniques",
                "Ensure you're getting regular exercise and proper nutrition",
            ],
            SeverityBand::Moderate | SeverityBand::Severe => &[
                "Schedule an appointment with a mental health professional",
                "Consider therapy or counseling options",
                "Reach out to trusted friends or family for support",
                "Establish a regular self-care routine",
            ],
        }
    }
}

/// Severity outcome of a completed assessment.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScoringResult {
    pub severity_band: SeverityBand,
    pub normalized_score: f64,
    pub is_at_risk: bool,
}

impl ScoringResult {
    /// Clamps into `[0,100]` and applies the canonical banding.
    pub fn from_normalized(score: f64) -> Self {
        let normalized_score = score.clamp(0.0, 100.0);
        Self {
            severity_band: SeverityBand::from_score(normalized_score),
            normalized_score,
            is_at_risk: normalized_score > AT_RISK_THRESHOLD,
        }
    }

    pub fn summary(&self) -> String {
        let risk = if self.is_at_risk {
            "at risk"
        } else {
            "not at risk"
        };
        format!(
            "{} ({:.2}/100, {})",
            self.severity_band.label(),
            self.normalized_score,
            risk
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn band_boundaries_belong_to_the_upper_band() {
        assert_eq!(SeverityBand::from_score(0.0), SeverityBand::Minimal);
        assert_eq!(SeverityBand::from_score(29.999), SeverityBand::Minimal);
        assert_eq!(SeverityBand::from_score(30.0), SeverityBand::Mild);
        assert_eq!(SeverityBand::from_score(49.999), SeverityBand::Mild);
        assert_eq!(SeverityBand::from_score(50.0), SeverityBand::Moderate);
        assert_eq!(SeverityBand::from_score(69.999), SeverityBand::Moderate);
        assert_eq!(SeverityBand::from_score(70.0), SeverityBand::Severe);
        assert_eq!(SeverityBand::from_score(100.0), SeverityBand::Severe);
    }

    #[test]
    fn bands_partition_the_whole_range_in_order() {
        let mut previous = SeverityBand::Minimal;
        for tenth in 0..=1000 {
            let score = f64::from(tenth) / 10.0;
            let result = ScoringResult::from_normalized(score);
            assert!(result.severity_band >= previous, "bands must not regress at {score}");
            assert_eq!(result.is_at_risk, score > AT_RISK_THRESHOLD);
            previous = result.severity_band;
        }
        assert_eq!(previous, SeverityBand::Severe);
    }

    #[test]
    fn exactly_fifty_is_moderate_but_not_at_risk() {
        let result = ScoringResult::from_normalized(50.0);
        assert_eq!(result.severity_band, SeverityBand::Moderate);
        assert!(!result.is_at_risk);
        assert!(result.summary().starts_with("Moderate"));
    }
}
