use std::collections::HashMap;

use serde::Serialize;

use crate::config::reward_tiers;
use crate::types::{Gotchi, RewardMetric, RewardStat};

/// Converts a zero-based leaderboard position into a payout.
/// Implementations must be non-increasing in `rank`.
pub trait RewardCurve {
    fn reward(&self, rank: usize, metric: RewardMetric) -> f64;
}

impl<F> RewardCurve for F
where
    F: Fn(usize, RewardMetric) -> f64,
{
    fn reward(&self, rank: usize, metric: RewardMetric) -> f64 {
        self(rank, metric)
    }
}

/// Payout tables of `(rank_end_exclusive, reward)` per metric.
#[derive(Debug, Clone)]
pub struct TieredRewardCurve {
    rarity: Vec<(usize, f64)>,
    kinship: Vec<(usize, f64)>,
    experience: Vec<(usize, f64)>,
}

impl TieredRewardCurve {
    pub fn new(rarity: Vec<(usize, f64)>, kinship: Vec<(usize, f64)>, experience: Vec<(usize, f64)>) -> Self {
        Self { rarity, kinship, experience }
    }

    fn tiers(&self, metric: RewardMetric) -> &[(usize, f64)] {
        match metric {
            RewardMetric::Rarity => &self.rarity,
            RewardMetric::Kinship => &self.kinship,
            RewardMetric::Experience => &self.experience,
        }
    }
}

impl Default for TieredRewardCurve {
    fn default() -> Self {
        Self::new(
            reward_tiers::RARITY.to_vec(),
            reward_tiers::KINSHIP.to_vec(),
            reward_tiers::EXPERIENCE.to_vec(),
        )
    }
}

impl RewardCurve for TieredRewardCurve {
    fn reward(&self, rank: usize, metric: RewardMetric) -> f64 {
        self.tiers(metric)
            .iter()
            .find(|(end, _)| rank < *end)
            .map_or(0.0, |(_, reward)| *reward)
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RankedPortfolio {
    pub gotchis: Vec<Gotchi>,
    pub total_reward: f64,
}

/// Gotchi id → zero-based position in a descending ordering of `population`
/// by `metric`. Equal values keep population order.
pub fn leaderboard(population: &[Gotchi], metric: RewardMetric) -> HashMap<&str, usize> {
    let mut order: Vec<&Gotchi> = population.iter().collect();
    order.sort_by(|a, b| metric.value_of(b).total_cmp(&metric.value_of(a)));

    let mut ranks = HashMap::with_capacity(order.len());
    for (rank, gotchi) in order.into_iter().enumerate() {
        ranks.entry(gotchi.id.as_str()).or_insert(rank);
    }
    ranks
}

/// Ranks every owned gotchi on the three leaderboards and attaches its
/// reward breakdown. Returns new records; `population` is not touched.
pub fn rank_and_reward<C: RewardCurve + ?Sized>(
    population: &[Gotchi],
    owned: &[Gotchi],
    curve: &C,
) -> RankedPortfolio {
    let boards: Vec<(RewardMetric, HashMap<&str, usize>)> = RewardMetric::ALL
        .into_iter()
        .map(|metric| (metric, leaderboard(population, metric)))
        .collect();

    let gotchis: Vec<Gotchi> = owned
        .iter()
        .map(|gotchi| {
            let reward_stats: Vec<RewardStat> = boards
                .iter()
                .map(|(metric, ranks)| {
                    let rank = ranks.get(gotchi.id.as_str()).copied();
                    RewardStat {
                        metric: *metric,
                        rank,
                        reward: rank.map_or(0.0, |r| curve.reward(r, *metric)),
                    }
                })
                .collect();
            Gotchi {
                reward: Some(reward_stats.iter().map(|s| s.reward).sum()),
                reward_stats,
                ..gotchi.clone()
            }
        })
        .collect();

    let total_reward = gotchis.iter().filter_map(|g| g.reward).sum();
    RankedPortfolio { gotchis, total_reward }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gotchi(id: &str, mrs: f64, kinship: f64, experience: f64) -> Gotchi {
        Gotchi {
            id: id.to_string(),
            modified_rarity_score: mrs,
            kinship,
            experience,
            ..Default::default()
        }
    }

    fn population() -> Vec<Gotchi> {
        vec![
            gotchi("A", 50.0, 3.0, 100.0),
            gotchi("B", 90.0, 1.0, 300.0),
            gotchi("C", 70.0, 2.0, 200.0),
        ]
    }

    #[test]
    fn ranks_descending_by_metric() {
        let pop = population();
        let ranks = leaderboard(&pop, RewardMetric::Rarity);
        assert_eq!(ranks["B"], 0);
        assert_eq!(ranks["C"], 1);
        assert_eq!(ranks["A"], 2);
    }

    #[test]
    fn ties_resolve_by_population_order() {
        let pop = vec![gotchi("X", 10.0, 0.0, 0.0), gotchi("Y", 10.0, 0.0, 0.0)];
        let ranks = leaderboard(&pop, RewardMetric::Rarity);
        assert_eq!(ranks["X"], 0);
        assert_eq!(ranks["Y"], 1);
    }

    #[test]
    fn nan_metric_does_not_disturb_ranking() {
        let mut pop = population();
        pop.extend((0..40).map(|i| gotchi(&format!("n{i}"), f64::NAN, 0.0, 0.0)));
        let ranks = leaderboard(&pop, RewardMetric::Rarity);
        assert_eq!(ranks.len(), pop.len());
        assert!(ranks["B"] < ranks["C"]);
        assert!(ranks["C"] < ranks["A"]);
    }

    #[test]
    fn rewards_sum_across_metrics() {
        // reward = 100 - rank, for every metric
        let curve = |rank: usize, _metric: RewardMetric| 100.0 - rank as f64;
        let owned = vec![population()[0].clone()];
        let ranked = rank_and_reward(&population(), &owned, &curve);

        let a = &ranked.gotchis[0];
        let ranks: Vec<_> = a.reward_stats.iter().map(|s| s.rank).collect();
        assert_eq!(ranks, [Some(2), Some(0), Some(2)]);
        assert_eq!(a.reward, Some(98.0 + 100.0 + 98.0));
        assert!((ranked.total_reward - 296.0).abs() < 1e-9);
    }

    #[test]
    fn aggregate_is_sum_of_owned_totals() {
        let curve = TieredRewardCurve::new(vec![(1, 10.0), (3, 5.0)], vec![(1, 2.0)], vec![]);
        let pop = population();
        let ranked = rank_and_reward(&pop, &pop, &curve);

        let per_gotchi: f64 = ranked.gotchis.iter().map(|g| g.reward.unwrap()).sum();
        assert!((ranked.total_reward - per_gotchi).abs() < 1e-9);
        // B: rarity rank 0 → 10; A: kinship rank 0 → 2
        let b = ranked.gotchis.iter().find(|g| g.id == "B").unwrap();
        assert_eq!(b.reward, Some(10.0));
        let a = ranked.gotchis.iter().find(|g| g.id == "A").unwrap();
        assert_eq!(a.reward, Some(5.0 + 2.0));
    }

    #[test]
    fn gotchi_outside_population_earns_nothing() {
        let owned = vec![gotchi("Z", 999.0, 999.0, 999.0)];
        let ranked = rank_and_reward(&population(), &owned, &TieredRewardCurve::default());
        assert!(ranked.gotchis[0].reward_stats.iter().all(|s| s.rank.is_none()));
        assert_eq!(ranked.gotchis[0].reward, Some(0.0));
    }

    #[test]
    fn population_is_left_untouched() {
        let pop = population();
        let before = pop.clone();
        let _ = rank_and_reward(&pop, &pop, &TieredRewardCurve::default());
        assert_eq!(pop, before);
    }

    #[test]
    fn default_tiers_are_non_increasing() {
        let curve = TieredRewardCurve::default();
        for metric in RewardMetric::ALL {
            let mut last = f64::INFINITY;
            for rank in 0..8_000 {
                let r = curve.reward(rank, metric);
                assert!(r <= last, "{metric} rank {rank}");
                last = r;
            }
        }
    }
}
