use analysis_core::math::{format_number, safe_divide};
use analysis_core::{Action, Horizon, Metric, Verdict, VerdictLabel};

const GAP_THRESHOLD: f64 = 0.15;
const ALIGNED_THRESHOLD: f64 = 0.01;

/// Relative gap `(price - intrinsic) / intrinsic`; indeterminate when either
/// side is missing or intrinsic is zero.
pub fn price_gap(price: Metric, intrinsic: Metric) -> Metric {
    safe_divide(price.zip_with(intrinsic, |p, iv| p - iv), intrinsic)
}

/// Tri-state label plus a one-sentence rationale.
///
/// Without a price/intrinsic pair the composite score decides alone:
/// 70 and above is undervalued, 45 and below overvalued.
pub fn derive_verdict(price: Metric, intrinsic: Metric, composite: f64, currency: &str) -> (VerdictLabel, String) {
    let Some(gap) = price_gap(price, intrinsic).value() else {
        return if composite >= 70.0 {
            (
                VerdictLabel::Undervalued,
                "High qualitative score but no discounted cash flow valuation available.".to_string(),
            )
        } else if composite <= 45.0 {
            (
                VerdictLabel::Overvalued,
                "Weak qualitative score and no reliable discounted cash flow valuation.".to_string(),
            )
        } else {
            (
                VerdictLabel::Neutral,
                "No discounted cash flow data; judgement based on scores only.".to_string(),
            )
        };
    };

    let price_text = format_number(price, 2, currency);
    let intrinsic_text = format_number(intrinsic, 2, currency);
    let percent = gap.abs() * 100.0;

    if gap <= -GAP_THRESHOLD {
        (
            VerdictLabel::Undervalued,
            format!(
                "Price ({}) is {:.1}% below the estimated intrinsic value ({}).",
                price_text, percent, intrinsic_text
            ),
        )
    } else if gap >= GAP_THRESHOLD {
        (
            VerdictLabel::Overvalued,
            format!(
                "Price ({}) is {:.1}% above the estimated intrinsic value ({}).",
                price_text, percent, intrinsic_text
            ),
        )
    } else {
        (
            VerdictLabel::Neutral,
            format!(
                "Price ({}) is close to the estimated intrinsic value ({}), a gap of {:.1}%.",
                price_text,
                intrinsic_text,
                gap * 100.0
            ),
        )
    }
}

pub fn recommendation_action(label: VerdictLabel, composite: f64) -> (Action, Horizon) {
    match label {
        VerdictLabel::Undervalued if composite >= 70.0 => (Action::Buy, Horizon::Long),
        VerdictLabel::Overvalued if composite <= 50.0 => (Action::Sell, Horizon::ShortToMedium),
        _ => (Action::Hold, Horizon::Medium),
    }
}

pub fn assemble_verdict(price: Metric, intrinsic: Metric, composite: f64, currency: &str) -> Verdict {
    let (label, rationale) = derive_verdict(price, intrinsic, composite, currency);
    let (action, horizon) = recommendation_action(label, composite);
    Verdict {
        label,
        rationale,
        action,
        horizon,
    }
}

/// Short comparison line for the DCF block.
pub fn describe_price_gap(price: Metric, intrinsic: Metric) -> String {
    match price_gap(price, intrinsic).value() {
        None => "Comparison not possible (missing data)".to_string(),
        Some(gap) if gap.abs() < ALIGNED_THRESHOLD => "Price aligned with intrinsic value".to_string(),
        Some(gap) => format!(
            "Stock {} by {:.1}%",
            if gap > 0.0 { "overvalued" } else { "undervalued" },
            gap.abs() * 100.0
        ),
    }
}
