use analysis_core::{ConsistencyIssue, FundamentalsSnapshot};

const MARKET_CAP_TOLERANCE: f64 = 0.10;
const EPS_TOLERANCE: f64 = 0.20;
const EQUITY_TOLERANCE: f64 = 0.25;

/// Relative gap between a derived and a reported figure, measured against the
/// reported one.
fn relative_gap(derived: f64, reported: f64) -> f64 {
    (derived - reported).abs() / reported.abs()
}

/// Cross-check reported aggregates against values derived from per-share
/// figures. Every check is independent and advisory; a check is skipped when
/// any of its inputs is missing or zero.
pub fn consistency_checks(snapshot: &FundamentalsSnapshot) -> Vec<ConsistencyIssue> {
    let mut issues = Vec::new();

    if let (Some(reported), Some(price), Some(shares)) = (
        snapshot.market_cap.non_zero(),
        snapshot.price.non_zero(),
        snapshot.shares_outstanding.non_zero(),
    ) {
        let implied = price * shares;
        if relative_gap(implied, reported) > MARKET_CAP_TOLERANCE {
            issues.push(ConsistencyIssue::MarketCapMismatch { implied, reported });
        }
    }

    if let (Some(net_income), Some(shares), Some(reported)) = (
        snapshot.net_income.non_zero(),
        snapshot.shares_outstanding.non_zero(),
        snapshot.eps.non_zero(),
    ) {
        let derived = net_income / shares;
        if relative_gap(derived, reported) > EPS_TOLERANCE {
            issues.push(ConsistencyIssue::EpsMismatch { derived, reported });
        }
    }

    if let (Some(reported), Some(bvps), Some(shares)) = (
        snapshot.equity.non_zero(),
        snapshot.book_value_per_share.non_zero(),
        snapshot.shares_outstanding.non_zero(),
    ) {
        let implied = bvps * shares;
        if relative_gap(implied, reported) > EQUITY_TOLERANCE {
            issues.push(ConsistencyIssue::EquityMismatch { implied, reported });
        }
    }

    if !issues.is_empty() {
        tracing::debug!("{}: {} consistency issue(s)", snapshot.ticker, issues.len());
    }
    issues
}
