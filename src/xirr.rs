use crate::models::CashFlowEvent;

const INITIAL_GUESS: f64 = 0.1;
const MAX_NEWTON_ITERATIONS: usize = 100;
const MAX_BISECTION_ITERATIONS: usize = 200;
const NPV_TOLERANCE: f64 = 1e-6;
const DERIVATIVE_EPSILON: f64 = 1e-10;
const BRACKET_LOW: f64 = -0.99;
const BRACKET_HIGH: f64 = 10.0;
const DAYS_PER_YEAR: f64 = 365.0;

struct DatedFlow {
    amount: f64,
    years: f64,
}

/// Annualized money-weighted rate of return over irregular cash flows:
/// the rate `r` solving `sum(cf_i / (1 + r)^(days_i / 365)) = 0`.
///
/// Newton-Raphson from a 10% guess, falling back to bisection over
/// [-0.99, 10] when Newton stalls or diverges. Returns `None` when the rate
/// is undefined (fewer than two flows, all flows of one sign) or no root is
/// found inside the bracket; callers report that as a null metric, not an
/// error.
pub fn calculate_xirr(cash_flows: &[CashFlowEvent]) -> Option<f64> {
    if cash_flows.len() < 2 {
        return None;
    }

    let has_positive = cash_flows.iter().any(|cf| cf.amount > 0.0);
    let has_negative = cash_flows.iter().any(|cf| cf.amount < 0.0);
    if !has_positive || !has_negative {
        return None;
    }

    let first_date = cash_flows.iter().map(|cf| cf.date).min()?;
    let flows: Vec<DatedFlow> = cash_flows
        .iter()
        .map(|cf| DatedFlow {
            amount: cf.amount,
            years: (cf.date - first_date).num_days() as f64 / DAYS_PER_YEAR,
        })
        .collect();

    newton_raphson(&flows).or_else(|| bisection(&flows))
}

fn npv(flows: &[DatedFlow], rate: f64) -> f64 {
    flows
        .iter()
        .map(|flow| flow.amount / (1.0 + rate).powf(flow.years))
        .sum()
}

fn npv_derivative(flows: &[DatedFlow], rate: f64) -> f64 {
    flows
        .iter()
        .map(|flow| {
            -flow.amount * flow.years / (1.0 + rate).powf(flow.years) / (1.0 + rate)
        })
        .sum()
}

fn newton_raphson(flows: &[DatedFlow]) -> Option<f64> {
    let mut rate = INITIAL_GUESS;

    for _ in 0..MAX_NEWTON_ITERATIONS {
        let value = npv(flows, rate);
        if !value.is_finite() {
            return None;
        }
        if value.abs() < NPV_TOLERANCE {
            return Some(rate);
        }

        let derivative = npv_derivative(flows, rate);
        if !derivative.is_finite() || derivative.abs() < DERIVATIVE_EPSILON {
            return None;
        }

        let next = rate - value / derivative;
        if !next.is_finite() || next <= -1.0 || next > BRACKET_HIGH {
            return None;
        }
        rate = next;
    }

    None
}

fn bisection(flows: &[DatedFlow]) -> Option<f64> {
    let mut low = BRACKET_LOW;
    let mut high = BRACKET_HIGH;
    let mut npv_low = npv(flows, low);
    let npv_high = npv(flows, high);

    if !npv_low.is_finite() || !npv_high.is_finite() {
        return None;
    }
    if npv_low.abs() < NPV_TOLERANCE {
        return Some(low);
    }
    if npv_high.abs() < NPV_TOLERANCE {
        return Some(high);
    }
    // No sign change means no root inside the bracket.
    if npv_low.signum() == npv_high.signum() {
        return None;
    }

    for _ in 0..MAX_BISECTION_ITERATIONS {
        let mid = (low + high) / 2.0;
        let npv_mid = npv(flows, mid);
        if !npv_mid.is_finite() {
            return None;
        }
        if npv_mid.abs() < NPV_TOLERANCE {
            return Some(mid);
        }
        if npv_mid.signum() == npv_low.signum() {
            low = mid;
            npv_low = npv_mid;
        } else {
            high = mid;
        }
    }

    None
}
