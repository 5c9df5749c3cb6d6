//! Composite score calculator.
//!
//! Pure, deterministic aggregation of per-model bias scores into a single
//! composite with a confidence value. No I/O: the orchestrator loads the
//! score set, calls [`compute`], and persists the result in the same
//! transaction.

use crate::config::{CompositeScoreConfig, InvalidHandling};
use crate::error::ScoringError;
use serde::{Deserialize, Serialize};

/// One model's rated score as seen by the calculator.
///
/// Decoupled from the storage row so the calculator can be driven by
/// fixtures. `score == None` is the invalid sentinel. Inputs must be in
/// insertion order; later duplicates of a (perspective, model) pair win.
#[derive(Debug, Clone)]
pub struct RatedScore {
    /// Model identifier as stored (provider/name).
    pub model: String,
    /// Bias score in [-1, +1], or `None` for invalid.
    pub score: Option<f64>,
    /// Per-call confidence in [0, 1].
    pub confidence: f64,
}

/// The calculator's output.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Composite {
    /// Weighted composite bias score in [-1, +1].
    pub score: f64,
    /// Aggregate confidence in [0, 1].
    pub confidence: f64,
    /// Perspectives that produced at least one usable member score.
    pub valid_perspectives: usize,
    /// Perspectives configured.
    pub total_perspectives: usize,
}

/// Per-perspective aggregation detail, exposed for the ensemble endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct PerspectiveAggregate {
    /// Perspective name from config.
    pub name: String,
    /// Perspective weight from config.
    pub weight: f64,
    /// Confidence-weighted mean of member scores, if any member is usable.
    pub score: Option<f64>,
    /// Mean member confidence, if any member is usable.
    pub confidence: Option<f64>,
    /// Member model results after normalization and deduplication.
    pub members: Vec<MemberScore>,
}

/// One member model's contribution to a perspective aggregate.
#[derive(Debug, Clone, Serialize)]
pub struct MemberScore {
    /// Normalized model identifier.
    pub model: String,
    /// Member score after invalid-handling policy, or `None` if dropped.
    pub score: Option<f64>,
    /// Member confidence after invalid-handling policy.
    pub confidence: f64,
}

/// Bias leaning derived from a composite score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Leaning {
    /// Composite below the negative threshold.
    Left,
    /// Composite within the threshold band.
    Center,
    /// Composite above the positive threshold.
    Right,
}

impl Leaning {
    /// Parse a user-supplied filter value (case-insensitive).
    pub fn parse(value: &str) -> Option<Self> {
        match value.to_lowercase().as_str() {
            "left" => Some(Self::Left),
            "center" => Some(Self::Center),
            "right" => Some(Self::Right),
            _ => None,
        }
    }
}

impl std::fmt::Display for Leaning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Left => "Left",
            Self::Center => "Center",
            Self::Right => "Right",
        })
    }
}

/// Label a composite score against a threshold: strictly below `-threshold`
/// is Left, strictly above `+threshold` is Right, the closed band between
/// them is Center.
pub fn lean_label(score: f64, threshold: f64) -> Leaning {
    if score < -threshold {
        Leaning::Left
    } else if score > threshold {
        Leaning::Right
    } else {
        Leaning::Center
    }
}

/// Round to four decimal places, the precision persisted scores carry.
pub fn round4(value: f64) -> f64 {
    (value * 10_000.0).round() / 10_000.0
}

/// Normalize a model identifier for perspective matching: trim, lowercase,
/// and strip the provider prefix.
pub fn normalize_model_id(raw: &str) -> String {
    let trimmed = raw.trim().to_lowercase();
    match trimmed.rsplit_once('/') {
        Some((_, name)) if !name.is_empty() => name.to_string(),
        _ => trimmed,
    }
}

/// Compute the composite score and confidence for a score set under the
/// given config.
///
/// Aggregation: scores map to perspectives by model identifier (first
/// matching perspective in config order wins); within a perspective,
/// members combine by confidence-weighted mean; the composite is the
/// weight-averaged mean of valid perspective aggregates. Confidence is the
/// mean of valid perspective confidences scaled by coverage, or capped at
/// half when fewer than `min_models` perspectives are valid. An empty or
/// all-invalid set yields (0, 0) unless the policy is `fail`.
pub fn compute(
    scores: &[RatedScore],
    config: &CompositeScoreConfig,
) -> Result<Composite, ScoringError> {
    let perspectives = breakdown(scores, config)?;
    let total = perspectives.len();

    let valid: Vec<&PerspectiveAggregate> =
        perspectives.iter().filter(|p| p.score.is_some()).collect();

    if valid.is_empty() {
        return Ok(Composite {
            score: 0.0,
            confidence: 0.0,
            valid_perspectives: 0,
            total_perspectives: total,
        });
    }

    let weight_sum: f64 = valid.iter().map(|p| p.weight).sum();
    let composite = if weight_sum > 0.0 {
        valid
            .iter()
            .filter_map(|p| p.score.map(|s| s * p.weight))
            .sum::<f64>()
            / weight_sum
    } else {
        0.0
    };

    let mean_confidence = valid.iter().filter_map(|p| p.confidence).sum::<f64>() / valid.len() as f64;

    let confidence = if valid.len() < config.min_models {
        mean_confidence * 0.5
    } else {
        mean_confidence * (valid.len() as f64 / total as f64)
    };

    Ok(Composite {
        score: composite.clamp(-1.0, 1.0),
        confidence: confidence.clamp(0.0, 1.0),
        valid_perspectives: valid.len(),
        total_perspectives: total,
    })
}

/// Aggregate a score set into per-perspective detail without combining
/// perspectives. Shared by [`compute`] and the ensemble endpoint.
pub fn breakdown(
    scores: &[RatedScore],
    config: &CompositeScoreConfig,
) -> Result<Vec<PerspectiveAggregate>, ScoringError> {
    // (perspective index, normalized model) -> last usable input, last wins.
    let mut assigned: Vec<Vec<(String, RatedScore)>> =
        vec![Vec::new(); config.perspectives.len()];

    for raw in scores {
        let normalized = normalize_model_id(&raw.model);
        let Some(p_idx) = config.perspectives.iter().position(|p| {
            p.models
                .iter()
                .any(|m| normalize_model_id(m) == normalized)
        }) else {
            // Model not in any configured chain; stale row from an older
            // config. Skipped.
            continue;
        };

        let slot = &mut assigned[p_idx];
        if let Some(existing) = slot.iter_mut().find(|(m, _)| *m == normalized) {
            existing.1 = raw.clone();
        } else {
            slot.push((normalized, raw.clone()));
        }
    }

    let mut aggregates = Vec::with_capacity(config.perspectives.len());

    for (p_idx, perspective) in config.perspectives.iter().enumerate() {
        let mut members = Vec::new();

        for (model, raw) in &assigned[p_idx] {
            let usable = raw.score.filter(|s| s.is_finite());

            match (usable, config.invalid_handling) {
                (Some(score), _) => members.push(MemberScore {
                    model: model.clone(),
                    score: Some(score.clamp(-1.0, 1.0)),
                    confidence: raw.confidence.clamp(0.0, 1.0),
                }),
                (None, InvalidHandling::Ignore) => members.push(MemberScore {
                    model: model.clone(),
                    score: None,
                    confidence: 0.0,
                }),
                (None, InvalidHandling::Default) => members.push(MemberScore {
                    model: model.clone(),
                    score: Some(0.0),
                    confidence: 0.0,
                }),
                (None, InvalidHandling::Fail) => {
                    return Err(ScoringError::CalculationFailed {
                        message: format!(
                            "model '{model}' in perspective '{}' produced an invalid score",
                            perspective.name
                        ),
                    });
                }
            }
        }

        let usable: Vec<&MemberScore> = members.iter().filter(|m| m.score.is_some()).collect();

        let (score, confidence) = if usable.is_empty() {
            (None, None)
        } else {
            let conf_sum: f64 = usable.iter().map(|m| m.confidence).sum();
            let weighted = if conf_sum > 0.0 {
                usable
                    .iter()
                    .filter_map(|m| m.score.map(|s| s * m.confidence))
                    .sum::<f64>()
                    / conf_sum
            } else {
                usable.iter().filter_map(|m| m.score).sum::<f64>() / usable.len() as f64
            };
            let mean_conf = conf_sum / usable.len() as f64;
            (Some(weighted), Some(mean_conf))
        };

        aggregates.push(PerspectiveAggregate {
            name: perspective.name.clone(),
            weight: perspective.weight,
            score,
            confidence,
            members,
        });
    }

    Ok(aggregates)
}
