//! Aggregate water-quality grading.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::parameter::Parameter;
use crate::reading::Reading;

/// Overall quality classification of a reading.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Grade {
    Poor,
    Warning,
    Good,
    Excellent,
}

impl Grade {
    pub fn as_str(self) -> &'static str {
        match self {
            Grade::Excellent => "Excellent",
            Grade::Good      => "Good",
            Grade::Warning   => "Warning",
            Grade::Poor      => "Poor",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "Excellent" => Some(Grade::Excellent),
            "Good"      => Some(Grade::Good),
            "Warning"   => Some(Grade::Warning),
            "Poor"      => Some(Grade::Poor),
            _ => None,
        }
    }

    /// Grade for an average score. Ties fall to the lower grade.
    pub fn for_score(avg_score: f64) -> Self {
        if avg_score > 0.8 {
            Grade::Excellent
        } else if avg_score > 0.6 {
            Grade::Good
        } else if avg_score > 0.4 {
            Grade::Warning
        } else {
            Grade::Poor
        }
    }

    /// Fixed confidence figure shown alongside the grade.
    ///
    /// Poor reports 92, above Good and Warning. Kept as-is for
    /// compatibility with existing dashboards.
    pub fn confidence(self) -> u8 {
        match self {
            Grade::Excellent => 95,
            Grade::Good      => 87,
            Grade::Warning   => 78,
            Grade::Poor      => 92,
        }
    }
}

impl fmt::Display for Grade {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct QualityAssessment {
    pub grade: Grade,
    pub confidence: u8,
    pub avg_score: f64,
}

impl QualityAssessment {
    pub fn from_score(avg_score: f64) -> Self {
        let grade = Grade::for_score(avg_score);
        Self { grade, confidence: grade.confidence(), avg_score }
    }
}

/// Unweighted mean of the per-parameter goodness scores.
pub fn average_score(reading: &Reading) -> f64 {
    let scores: Vec<f64> = Parameter::ALL
        .into_iter()
        .filter_map(|p| p.scoring().map(|rule| rule.score(reading.value(p))))
        .collect();
    if scores.is_empty() {
        return 0.0;
    }
    scores.iter().sum::<f64>() / scores.len() as f64
}

pub fn aggregate(reading: &Reading) -> QualityAssessment {
    QualityAssessment::from_score(average_score(reading))
}

// ------------------------------------------------------------------ //
//  Tests                                                              //
// ------------------------------------------------------------------ //
