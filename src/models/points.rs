//! Points arithmetic for purchases and promotions.

use crate::entities::promotions;

/// One point is earned for every 25 cents spent.
pub const CENTS_PER_POINT: f64 = 25.0;

#[allow(clippy::cast_possible_truncation)]
fn round_points(value: f64) -> i64 {
    value.round() as i64
}

#[must_use]
pub fn base_points(spent: f64) -> i64 {
    round_points(spent * 100.0 / CENTS_PER_POINT)
}

/// Whether a purchase of `spent` dollars meets the promotion's threshold.
#[must_use]
pub fn meets_min_spending(promotion: &promotions::Model, spent: f64) -> bool {
    promotion.min_spending.is_none_or(|min| spent >= min)
}

/// Bonus granted by a promotion: `rate` extra points per cent plus the flat
/// `points` value.
#[must_use]
pub fn promotion_bonus(promotion: &promotions::Model, spent: f64) -> i64 {
    let rate_bonus = promotion
        .rate
        .map_or(0, |rate| round_points(spent * 100.0 * rate));
    rate_bonus + promotion.points.unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::sea_orm_active_enums::PromotionKind;
    use chrono::Utc;

    fn promotion(min_spending: Option<f64>, rate: Option<f64>, points: Option<i64>) -> promotions::Model {
        promotions::Model {
            id: 1,
            name: "Test".to_string(),
            description: String::new(),
            kind: PromotionKind::Automatic,
            start_time: Utc::now(),
            end_time: Utc::now(),
            min_spending,
            rate,
            points,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_base_points_rounds_to_nearest() {
        assert_eq!(base_points(0.0), 0);
        assert_eq!(base_points(1.0), 4);
        assert_eq!(base_points(19.99), 80);
        assert_eq!(base_points(0.12), 0);
        assert_eq!(base_points(0.13), 1);
    }

    #[test]
    fn test_promotion_bonus() {
        // 1 extra point per dollar spent
        let p = promotion(None, Some(0.01), None);
        assert_eq!(promotion_bonus(&p, 20.0), 20);

        let p = promotion(None, Some(0.01), Some(50));
        assert_eq!(promotion_bonus(&p, 20.0), 70);

        let p = promotion(None, None, None);
        assert_eq!(promotion_bonus(&p, 20.0), 0);
    }

    #[test]
    fn test_min_spending() {
        let p = promotion(Some(50.0), None, Some(10));
        assert!(!meets_min_spending(&p, 49.99));
        assert!(meets_min_spending(&p, 50.0));
        assert!(meets_min_spending(&promotion(None, None, None), 0.0));
    }
}
