use analysis_core::math::{clamp_score, safe_divide};
use analysis_core::{FundamentalsSnapshot, RatioResult, RatioVerdict, ScoreSet};

/// Balance-sheet health from net debt / equity, adjusted by payout ratio.
pub fn score_health(snapshot: &FundamentalsSnapshot) -> f64 {
    let debt_to_equity = safe_divide(snapshot.net_debt, snapshot.equity);

    let mut score = match debt_to_equity.value() {
        None => 70.0,
        Some(d) if d < 0.0 => 90.0,
        Some(d) if d < 0.2 => 80.0,
        Some(d) if d < 0.5 => 70.0,
        Some(d) if d < 1.0 => 55.0,
        Some(_) => 40.0,
    };

    if let Some(payout) = snapshot.payout_ratio.value() {
        if payout < 0.5 {
            score += 5.0;
        } else if payout > 0.9 {
            score -= 10.0;
        }
    }

    clamp_score(score)
}

/// Step function of the expected growth rate; 50 when unknown.
pub fn score_growth(snapshot: &FundamentalsSnapshot) -> f64 {
    match snapshot.growth_rate.value() {
        None => 50.0,
        Some(g) if g >= 0.20 => 90.0,
        Some(g) if g >= 0.10 => 75.0,
        Some(g) if g >= 0.05 => 60.0,
        Some(g) if g >= 0.0 => 45.0,
        Some(_) => 30.0,
    }
}

/// Mean of per-ratio points over every ratio with a definite verdict.
pub fn score_valuation(ratios: &[RatioResult]) -> f64 {
    let points: Vec<f64> = ratios
        .iter()
        .filter_map(|r| match r.verdict {
            RatioVerdict::Undervalued => Some(90.0),
            RatioVerdict::Neutral => Some(60.0),
            RatioVerdict::Overvalued => Some(30.0),
            RatioVerdict::InsufficientData => None,
        })
        .collect();

    if points.is_empty() {
        return 50.0;
    }
    clamp_score(points.iter().sum::<f64>() / points.len() as f64)
}

/// Market risk from beta (missing beta counts as 1.0), adjusted by
/// net debt / EBITDA leverage.
pub fn score_risk(snapshot: &FundamentalsSnapshot) -> f64 {
    let beta = snapshot.beta.unwrap_or(1.0);
    let mut score = if beta < 0.8 {
        85.0
    } else if beta < 1.1 {
        70.0
    } else if beta < 1.5 {
        55.0
    } else {
        40.0
    };

    // Zero net debt carries no leverage signal.
    if let Some(leverage) = safe_divide(snapshot.net_debt.non_zero().into(), snapshot.ebitda).value() {
        if leverage < 1.0 {
            score += 5.0;
        } else if leverage > 3.0 {
            score -= 10.0;
        }
    }

    clamp_score(score)
}

pub fn aggregate_scores(snapshot: &FundamentalsSnapshot, ratios: &[RatioResult]) -> ScoreSet {
    let health = score_health(snapshot);
    let growth = score_growth(snapshot);
    let valuation = score_valuation(ratios);
    let risk = score_risk(snapshot);
    ScoreSet {
        health,
        growth,
        valuation,
        risk,
        composite: (health + growth + valuation + risk) / 4.0,
    }
}
