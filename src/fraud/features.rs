//! Feature extraction for the anomaly model.

pub const FEATURE_DIM: usize = 5;

/// `[amount, sender_frequency, receiver_frequency, hour_of_day,
/// amount / sender_frequency]`. The last component captures the "large
/// amount from a quiet account" pattern that neither raw signal catches
/// alone.
pub type FeatureVector = [f64; FEATURE_DIM];

pub fn extract(amount: f64, sender_frequency: usize, receiver_frequency: usize, hour_of_day: u32) -> FeatureVector {
    let sender_frequency = sender_frequency.max(1);
    [
        amount,
        sender_frequency as f64,
        receiver_frequency.max(1) as f64,
        hour_of_day as f64,
        amount / sender_frequency as f64,
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extraction_is_total_for_fresh_accounts() {
        // No prior history must not divide by zero or skew the ratio.
        let v = extract(250.0, 0, 0, 12);
        assert_eq!(v, [250.0, 1.0, 1.0, 12.0, 250.0]);
    }

    #[test]
    fn ratio_shrinks_with_frequency() {
        let quiet = extract(10_000.0, 1, 1, 12);
        let busy = extract(10_000.0, 20, 1, 12);
        assert!(quiet[4] > busy[4]);
    }
}
