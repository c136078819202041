//! Salience equations.
//!
//! Pure functions over the dynamics coefficients; every result that
//! feeds a stored salience is clamped to [0, 1]. Time is measured in
//! days since the memory was last seen.

use engram_core::config::DynamicsConfig;

/// Current salience: exponential decay of the stored intensity plus the
/// recall and emotion contributions.
///
/// `clip(i·e^{-λt} + α·r + β·e, 0, 1)`
pub fn salience(
    days: f64,
    intensity: f64,
    recall: f64,
    emotion: f64,
    lambda: f64,
    cfg: &DynamicsConfig,
) -> f64 {
    let decayed = intensity * (-lambda * days).exp();
    (decayed + cfg.alpha_recall * recall + cfg.beta_emotion * emotion).clamp(0.0, 1.0)
}

/// Dual-phase retention: a fast phase for fresh traces plus a scaled
/// slow phase for consolidated ones.
///
/// `clip(e^{-λ_fast·t} + θ·e^{-λ_slow·t}, 0, 1)`
pub fn retention_dual(days: f64, cfg: &DynamicsConfig) -> f64 {
    let fast = (-cfg.lambda_fast * days).exp();
    let slow = cfg.theta_consolidation * (-cfg.lambda_slow * days).exp();
    (fast + slow).clamp(0.0, 1.0)
}

/// Link weight from semantic and emotional similarity:
/// `σ(0.7·sem + 0.3·emo)`.
pub fn link_weight(sem: f64, emo: f64) -> f64 {
    sigmoid(0.7 * sem + 0.3 * emo)
}

/// Waypoint weight between two vectors created Δt apart: cosine damped
/// by the age gap in days.
pub fn waypoint_weight(cos_sim: f64, delta_t_ms: f64) -> f64 {
    (cos_sim / (1.0 + delta_t_ms / 86_400_000.0)).max(0.0)
}

/// Recall reinforcement: `min(1, sal + η·(1 − sal))`.
pub fn trace_reinforce(sal: f64, cfg: &DynamicsConfig) -> f64 {
    (sal + cfg.eta_reinforcement * (1.0 - sal)).min(1.0)
}

/// Associative propagation along one waypoint:
/// `min(1, target + η·w·src)`.
pub fn propagate(target_sal: f64, src_sal: f64, wp_weight: f64, cfg: &DynamicsConfig) -> f64 {
    (target_sal + cfg.eta_reinforcement * wp_weight * src_sal).min(1.0)
}

/// Retrieval energy threshold:
/// `clip(τ·(1 + ln(max(0.1, activation) + 1)), 0.1, 0.9)`.
pub fn threshold(activation: f64, tau: f64) -> f64 {
    (tau * (1.0 + (activation.max(0.1) + 1.0).ln())).clamp(0.1, 0.9)
}

pub fn sigmoid(x: f64) -> f64 {
    1.0 / (1.0 + (-x).exp())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cfg() -> DynamicsConfig {
        DynamicsConfig::default()
    }

    #[test]
    fn salience_decays_monotonically() {
        let c = cfg();
        let mut prev = f64::INFINITY;
        for days in [0.0, 1.0, 7.0, 30.0, 365.0] {
            let s = salience(days, 0.8, 0.0, 0.0, 0.01, &c);
            assert!(s <= prev + f64::EPSILON, "day {days}: {s} > {prev}");
            prev = s;
        }
    }

    #[test]
    fn salience_is_clipped() {
        let c = cfg();
        assert_eq!(salience(0.0, 1.0, 1.0, 1.0, 0.01, &c), 1.0);
        assert!(salience(10_000.0, 0.5, 0.0, 0.0, 0.01, &c) >= 0.0);
    }

    #[test]
    fn retention_starts_above_one_clipped() {
        let c = cfg();
        // At t=0 the raw sum is 1 + θ; the clip holds it at 1.
        assert_eq!(retention_dual(0.0, &c), 1.0);
    }

    #[test]
    fn retention_decreases_and_stays_positive() {
        let c = cfg();
        let early = retention_dual(10.0, &c);
        let late = retention_dual(300.0, &c);
        assert!(early > late);
        assert!(late > 0.0);
    }

    #[test]
    fn link_weight_in_unit_interval() {
        assert!(link_weight(1.0, 1.0) < 1.0);
        assert!(link_weight(-1.0, -1.0) > 0.0);
        assert!(link_weight(0.9, 0.4) > 0.5);
    }

    #[test]
    fn waypoint_weight_damps_with_age_gap() {
        let fresh = waypoint_weight(0.8, 0.0);
        let day_apart = waypoint_weight(0.8, 86_400_000.0);
        assert_eq!(fresh, 0.8);
        assert!((day_apart - 0.4).abs() < 1e-9);
        // Negative cosine floors at zero.
        assert_eq!(waypoint_weight(-0.5, 0.0), 0.0);
    }

    #[test]
    fn reinforce_approaches_one() {
        let c = cfg();
        let mut s = 0.1;
        for _ in 0..100 {
            let next = trace_reinforce(s, &c);
            assert!(next > s);
            s = next;
        }
        assert!(s > 0.99 && s <= 1.0);
    }

    #[test]
    fn propagate_caps_at_one() {
        let c = cfg();
        assert_eq!(propagate(0.99, 1.0, 1.0, &c), 1.0);
        let bumped = propagate(0.5, 0.8, 0.6, &c);
        assert!(bumped > 0.5 && bumped < 0.7);
    }

    #[test]
    fn threshold_respects_bounds() {
        assert!(threshold(0.0, 0.01) >= 0.1);
        assert!(threshold(1e9, 10.0) <= 0.9);
        // Rising activation raises the bar.
        assert!(threshold(10.0, 0.4) > threshold(0.5, 0.4));
    }
}
