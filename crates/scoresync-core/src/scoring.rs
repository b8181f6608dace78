use crate::config::RuleConfig;
use crate::error::{Result, SyncError};
use crate::extract::parse_raw_score;
use crate::models::{EntryKey, GameRecord, PlayerSlot, SEATS, ScoreReport};

/// Derives ranks, points and deposit for a posted score under `rules`.
pub fn score_game(key: &EntryKey, report: &ScoreReport, rules: &RuleConfig) -> Result<GameRecord> {
    let mut raw_scores = [0i64; SEATS];
    for (seat, (name, raw)) in report.seats.iter().enumerate() {
        raw_scores[seat] = parse_raw_score(raw).ok_or_else(|| {
            SyncError::Validation(format!("invalid raw score for {name}: {raw}"))
        })?;
    }
    if rules.rank_point.len() != SEATS {
        return Err(SyncError::Validation(format!(
            "rank_point needs {SEATS} entries, got {}",
            rules.rank_point.len()
        )));
    }

    // Finishing position: raw score descending, earlier seat first on ties.
    let mut order = [0usize, 1, 2, 3];
    order.sort_by(|a, b| raw_scores[*b].cmp(&raw_scores[*a]).then(a.cmp(b)));

    let mut rank_point = [0i64; SEATS];
    rank_point.copy_from_slice(&rules.rank_point);
    let oka = rules
        .return_point
        .checked_sub(rules.origin_point)
        .and_then(|diff| (diff / 10).checked_mul(4))
        .and_then(|oka| rank_point[0].checked_add(oka))
        .ok_or_else(|| out_of_range("first-place bonus"))?;
    rank_point[0] = oka;

    let mut ranks = [0u8; SEATS];
    for (position, seat) in order.iter().enumerate() {
        ranks[*seat] = (position + 1) as u8;
    }

    if rules.draw_split {
        let mut position = 0;
        while position < SEATS {
            let mut end = position + 1;
            while end < SEATS && raw_scores[order[end]] == raw_scores[order[position]] {
                end += 1;
            }
            for seat in &order[position..end] {
                ranks[*seat] = (position + 1) as u8;
            }
            if end - position > 1 {
                let shared = split_points(&rank_point[position..end]);
                rank_point[position..end].copy_from_slice(&shared);
            }
            position = end;
        }
    }

    let mut points = [0f64; SEATS];
    for (position, seat) in order.iter().enumerate() {
        let above_return = raw_scores[*seat]
            .checked_sub(rules.return_point)
            .ok_or_else(|| out_of_range(&report.seats[*seat].0))?;
        let point = above_return as f64 / 10.0 + rank_point[position] as f64;
        points[*seat] = round_tenth(point);
    }

    let deposit = raw_scores
        .iter()
        .try_fold(0i64, |total, raw| total.checked_add(*raw))
        .and_then(|total| rules.pool()?.checked_sub(total))
        .ok_or_else(|| out_of_range("score total"))?;

    let slots = std::array::from_fn(|seat| PlayerSlot {
        name: report.seats[seat].0.clone(),
        raw: report.seats[seat].1.clone(),
        raw_score: raw_scores[seat],
        rank: ranks[seat],
        point: points[seat],
    });

    Ok(GameRecord {
        key: key.clone(),
        slots,
        comment: report.comment.clone(),
        deposit,
        rule_version: rules.rule_version.clone(),
    })
}

/// Splits a run of placement bonuses evenly; the remainder goes to the first
/// share and a negative total shifts every share down by one.
#[must_use]
pub fn split_points(points: &[i64]) -> Vec<i64> {
    if points.is_empty() {
        return Vec::new();
    }
    let total = points.iter().fold(0i64, |total, point| total.saturating_add(*point));
    let len = points.len() as i64;
    let mut shares = vec![total / len; points.len()];
    let remainder = total.rem_euclid(len);
    if remainder != 0 {
        shares[0] += remainder;
        if total < 0 {
            for share in &mut shares {
                *share -= 1;
            }
        }
    }
    shares
}

fn out_of_range(what: &str) -> SyncError {
    SyncError::Validation(format!("{what} is out of range"))
}

fn round_tenth(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

#[cfg(test)]
mod tests {
    use super::*;

    fn report(pairs: [(&str, &str); 4]) -> ScoreReport {
        ScoreReport {
            seats: pairs.map(|(name, raw)| (name.to_string(), raw.to_string())),
            comment: None,
        }
    }

    fn key() -> EntryKey {
        EntryKey::parse("1700000000.000100").expect("key")
    }

    #[test]
    fn standard_game_points_and_ranks() {
        let rules = RuleConfig::default();
        let record = score_game(
            &key(),
            &report([("A", "400"), ("B", "300"), ("C", "200"), ("D", "100")]),
            &rules,
        )
        .expect("score");

        assert_eq!(record.deposit, 0);
        let ranks = record.slots.iter().map(|slot| slot.rank).collect::<Vec<_>>();
        assert_eq!(ranks, vec![1, 2, 3, 4]);
        let points = record.slots.iter().map(|slot| slot.point).collect::<Vec<_>>();
        assert_eq!(points, vec![60.0, 10.0, -20.0, -50.0]);
        let total: f64 = points.iter().sum();
        assert!(total.abs() < 1e-9);
    }

    #[test]
    fn deposit_is_pool_minus_raw_sum() {
        let rules = RuleConfig::default();
        let record = score_game(
            &key(),
            &report([("A", "400"), ("B", "300"), ("C", "200"), ("D", "90")]),
            &rules,
        )
        .expect("score");
        assert_eq!(record.deposit, 10);
        assert_eq!(record.raw_score_sum(), 990);
    }

    #[test]
    fn overflowing_raw_total_is_a_validation_error() {
        let rules = RuleConfig::default();
        let max = i64::MAX.to_string();
        let err = score_game(
            &key(),
            &report([("A", &max), ("B", &max), ("C", "0"), ("D", "0")]),
            &rules,
        )
        .expect_err("overflow must be rejected");
        assert_eq!(err.code(), "VALIDATION_FAILED");
        assert!(err.to_string().contains("score total"));
    }

    #[test]
    fn raw_score_far_below_return_is_a_validation_error() {
        let rules = RuleConfig::default();
        let min = format!("-{}", i64::MAX);
        let err = score_game(
            &key(),
            &report([("A", "0"), ("B", "0"), ("C", "0"), ("D", &min)]),
            &rules,
        )
        .expect_err("overflow must be rejected");
        assert_eq!(err.code(), "VALIDATION_FAILED");
        assert!(err.to_string().contains("D is out of range"));
    }

    #[test]
    fn ties_break_by_seat_without_draw_split() {
        let rules = RuleConfig::default();
        let record = score_game(
            &key(),
            &report([("A", "250"), ("B", "250"), ("C", "250"), ("D", "250")]),
            &rules,
        )
        .expect("score");
        let ranks = record.slots.iter().map(|slot| slot.rank).collect::<Vec<_>>();
        assert_eq!(ranks, vec![1, 2, 3, 4]);
    }

    #[test]
    fn draw_split_shares_rank_and_bonus() {
        let rules = RuleConfig {
            draw_split: true,
            ..RuleConfig::default()
        };
        let record = score_game(
            &key(),
            &report([("A", "350"), ("B", "350"), ("C", "200"), ("D", "100")]),
            &rules,
        )
        .expect("score");
        let ranks = record.slots.iter().map(|slot| slot.rank).collect::<Vec<_>>();
        assert_eq!(ranks, vec![1, 1, 3, 4]);
        // (50 + 10) / 2 = 30 each, plus (350 - 300) / 10.
        assert_eq!(record.slots[0].point, 35.0);
        assert_eq!(record.slots[1].point, 35.0);
    }

    #[test]
    fn split_points_handles_remainders() {
        assert_eq!(split_points(&[30, 10]), vec![20, 20]);
        assert_eq!(split_points(&[50, 10, -10]), vec![18, 16, 16]);
        assert_eq!(split_points(&[-10, 5]), vec![-2, -3]);
        assert!(split_points(&[]).is_empty());
    }

    #[test]
    fn invalid_raw_score_is_a_validation_error() {
        let rules = RuleConfig::default();
        let err = score_game(
            &key(),
            &report([("A", "4x0"), ("B", "300"), ("C", "200"), ("D", "100")]),
            &rules,
        )
        .expect_err("must fail");
        assert_eq!(err.code(), "VALIDATION_FAILED");
    }
}
