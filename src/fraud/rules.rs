//! Rule-based heuristic scoring.
//!
//! The rule set is an ordered list of independent `{name, weight, hits}`
//! descriptors evaluated uniformly in one loop, so adding a rule is a new
//! list entry rather than another branch. Each `hits` closure returns a
//! multiplier: 0.0 when the rule does not apply, 1.0 for a plain hit, or a
//! count for rules that scale with excess (velocity).

use crate::config::ScoringConfig;

/// Candidate transaction as the rules see it: its own fields plus the
/// sender's activity inside the trailing recency window.
#[derive(Debug, Clone, Copy)]
pub struct RuleInput {
    pub amount: f64,
    /// UTC hour of the transaction timestamp.
    pub hour_of_day: u32,
    /// Submissions from this sender inside the window, including this one.
    pub sender_in_window: usize,
}

pub struct Rule {
    pub name: &'static str,
    pub weight: f64,
    pub hits: Box<dyn Fn(&RuleInput) -> f64 + Send + Sync>,
}

/// Materialize the rule list from configuration. Amount tiers are
/// cumulative and strict: an amount equal to a tier boundary does not cross
/// it.
pub fn build_rules(config: &ScoringConfig) -> Vec<Rule> {
    let mut rules = Vec::new();

    let tier_names = ["amount_over_tier1", "amount_over_tier2", "amount_over_tier3"];
    for (i, name) in tier_names.into_iter().enumerate() {
        let tier = config.amount_tiers[i];
        rules.push(Rule {
            name,
            weight: config.tier_weights[i],
            hits: Box::new(move |input| if input.amount > tier { 1.0 } else { 0.0 }),
        });
    }

    let round_unit = config.round_unit;
    rules.push(Rule {
        name: "round_amount",
        weight: config.round_weight,
        hits: Box::new(move |input| {
            // Structuring signal: exact multiples of the round unit.
            let remainder = input.amount % round_unit;
            if input.amount > 0.0 && (remainder.abs() < 1e-9 || (round_unit - remainder).abs() < 1e-9) {
                1.0
            } else {
                0.0
            }
        }),
    });

    let cap = config.frequency_cap;
    let max_excess = config.max_excess;
    rules.push(Rule {
        name: "sender_velocity",
        weight: config.excess_weight,
        hits: Box::new(move |input| input.sender_in_window.saturating_sub(cap).min(max_excess) as f64),
    });

    let night_start = config.night_start_hour;
    let night_end = config.night_end_hour;
    rules.push(Rule {
        name: "night_owl",
        weight: config.night_weight,
        hits: Box::new(move |input| {
            let h = input.hour_of_day;
            let night = if night_start <= night_end {
                h >= night_start && h < night_end
            } else {
                // Window wraps midnight, e.g. [22:00, 06:00).
                h >= night_start || h < night_end
            };
            if night {
                1.0
            } else {
                0.0
            }
        }),
    });

    rules
}

/// Weighted sum over the rule list, clamped into [0, 1].
pub fn rule_score(rules: &[Rule], input: &RuleInput) -> f64 {
    rules
        .iter()
        .map(|rule| rule.weight * (rule.hits)(input))
        .sum::<f64>()
        .clamp(0.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn daytime(amount: f64) -> RuleInput {
        RuleInput {
            amount,
            hour_of_day: 12,
            sender_in_window: 1,
        }
    }

    fn score(input: &RuleInput) -> f64 {
        let rules = build_rules(&ScoringConfig::default());
        rule_score(&rules, input)
    }

    #[test]
    fn small_daytime_amount_scores_zero() {
        assert_eq!(score(&daytime(100.0)), 0.0);
    }

    #[test]
    fn tier_boundary_is_strict() {
        // Exactly 5000 does not cross the first tier; one cent more does.
        assert_eq!(score(&daytime(5_000.00)), 0.05); // round-amount only
        let above = score(&daytime(5_000.01));
        assert!((above - 0.12).abs() < 1e-12);
    }

    #[test]
    fn tiers_accumulate() {
        // 60000 crosses all three tiers and is a round multiple of 1000.
        let s = score(&daytime(60_000.0));
        assert!((s - (0.12 + 0.18 + 0.30 + 0.05)).abs() < 1e-12);
    }

    #[test]
    fn round_amount_flagged() {
        assert!((score(&daytime(3_000.0)) - 0.05).abs() < 1e-12);
        assert_eq!(score(&daytime(3_000.5)), 0.0);
    }

    #[test]
    fn velocity_scales_with_excess() {
        let calm = RuleInput {
            amount: 50.0,
            hour_of_day: 12,
            sender_in_window: 3,
        };
        let one_over = RuleInput {
            sender_in_window: 11,
            ..calm
        };
        let far_over = RuleInput {
            sender_in_window: 30,
            ..calm
        };

        let rules = build_rules(&ScoringConfig::default());
        assert_eq!(rule_score(&rules, &calm), 0.0);
        assert!((rule_score(&rules, &one_over) - 0.04).abs() < 1e-12);
        // Capped at max_excess = 6.
        assert!((rule_score(&rules, &far_over) - 0.24).abs() < 1e-12);
        assert!(rule_score(&rules, &one_over) > rule_score(&rules, &calm));
    }

    #[test]
    fn night_window_wraps_midnight() {
        let rules = build_rules(&ScoringConfig::default());
        let at = |hour| RuleInput {
            amount: 100.0,
            hour_of_day: hour,
            sender_in_window: 1,
        };

        assert!((rule_score(&rules, &at(23)) - 0.10).abs() < 1e-12);
        assert!((rule_score(&rules, &at(3)) - 0.10).abs() < 1e-12);
        // Boundaries: 22 is night, 6 is not.
        assert!((rule_score(&rules, &at(22)) - 0.10).abs() < 1e-12);
        assert_eq!(rule_score(&rules, &at(6)), 0.0);
        assert_eq!(rule_score(&rules, &at(12)), 0.0);
    }

    #[test]
    fn score_is_clamped() {
        let worst = RuleInput {
            amount: 1_000_000.0,
            hour_of_day: 2,
            sender_in_window: 100,
        };
        let s = score(&worst);
        assert!(s <= 1.0);
        assert!(s > 0.9);
    }
}
