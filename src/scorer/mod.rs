pub mod reward_ranker;

pub use reward_ranker::{rank_and_reward, RewardCurve, TieredRewardCurve};
