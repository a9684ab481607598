/*!
 * Chapter pricing.
 *
 * The pricing formula lives behind `PricingCalculator` so callers only see
 * `(novel, word count) -> price`. `ProfilePricing` is the stock implementation:
 * a per-novel profile (price per thousand words, key-cost divisor) that is
 * provisioned from configured defaults the first time a novel is priced.
 */

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::app_config::PricingConfig;
use crate::database::Repository;
use crate::database::models::PricingProfileRecord;

/// Price of one chapter
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChapterPrice {
    /// Coins needed to unlock the chapter
    pub unlock_price: i64,
    /// Keys needed to unlock the chapter instead
    pub key_cost: i64,
}

/// External pricing calculator
#[async_trait]
pub trait PricingCalculator: Send + Sync {
    /// Price a chapter of `word_count` words for a novel
    async fn quote(&self, novel_id: i64, word_count: i64) -> Result<ChapterPrice>;
}

/// Pricing backed by per-novel profiles in the repository
#[derive(Debug, Clone)]
pub struct ProfilePricing {
    repo: Repository,
    defaults: PricingConfig,
}

impl ProfilePricing {
    pub fn new(repo: Repository, defaults: PricingConfig) -> Self {
        Self { repo, defaults }
    }
}

#[async_trait]
impl PricingCalculator for ProfilePricing {
    async fn quote(&self, novel_id: i64, word_count: i64) -> Result<ChapterPrice> {
        let profile = self.repo.ensure_pricing_profile(novel_id, &self.defaults).await?;
        Ok(price_from_profile(&profile, word_count))
    }
}

/// Unlock price rounds up per started thousand words; key cost rounds up too
pub fn price_from_profile(profile: &PricingProfileRecord, word_count: i64) -> ChapterPrice {
    let word_count = word_count.max(0);
    let unlock_price = div_ceil(word_count * profile.price_per_thousand_words.max(0), 1000);
    let key_cost = if unlock_price == 0 {
        0
    } else {
        div_ceil(unlock_price, profile.key_cost_divisor.max(1))
    };
    ChapterPrice { unlock_price, key_cost }
}

fn div_ceil(value: i64, divisor: i64) -> i64 {
    (value + divisor - 1) / divisor
}
