/*!
 * Per-chapter planning: volume, price and release schedule.
 *
 * The same planner runs when drafts are created and when the workflow
 * promotes a chapter into the catalog, so both sides always agree.
 */

use anyhow::Result;
use chrono::{DateTime, Duration, Utc};
use std::sync::Arc;

use super::pricing::{ChapterPrice, PricingCalculator};
use super::{ImportConfig, PricingStrategy, VolumeMode};

/// Catalog placement of one chapter
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChapterPlan {
    pub volume_number: i64,
    pub unlock_price: i64,
    pub key_cost: i64,
    pub is_free: bool,
    pub release_at: DateTime<Utc>,
    /// Release time already passed
    pub is_released: bool,
    /// Paid and scheduled in the future
    pub is_advance: bool,
}

/// Volume a chapter belongs to
pub fn volume_for(mode: &VolumeMode, chapter_number: i64) -> i64 {
    match *mode {
        VolumeMode::Fixed { volume_number } => volume_number,
        VolumeMode::Bucketed { chapters_per_volume } => {
            (chapter_number.max(1) - 1) / chapters_per_volume.max(1) + 1
        }
    }
}

/// Release time: `chapters_per_day` chapters share each day, starting at `start`
pub fn release_at(start: DateTime<Utc>, chapters_per_day: i64, chapter_number: i64) -> DateTime<Utc> {
    let day = (chapter_number.max(1) - 1) / chapters_per_day.max(1);
    start + Duration::days(day)
}

/// Computes chapter plans against a pricing calculator
#[derive(Clone)]
pub struct ChapterPlanner {
    pricing: Arc<dyn PricingCalculator>,
}

impl std::fmt::Debug for ChapterPlanner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChapterPlanner").finish_non_exhaustive()
    }
}

impl ChapterPlanner {
    pub fn new(pricing: Arc<dyn PricingCalculator>) -> Self {
        Self { pricing }
    }

    /// Plan a chapter; free chapters never reach the pricing calculator
    pub async fn plan(
        &self,
        config: &ImportConfig,
        novel_id: i64,
        chapter_number: i64,
        word_count: i64,
        now: DateTime<Utc>,
    ) -> Result<ChapterPlan> {
        let is_free = chapter_number <= config.free_chapter_threshold
            || config.pricing == PricingStrategy::Free;

        let price = if is_free {
            ChapterPrice::default()
        } else {
            match config.pricing {
                PricingStrategy::Calculated { min_price, max_price } => {
                    let quote = self.pricing.quote(novel_id, word_count).await?;
                    // max/min rather than clamp: an unvalidated config must not panic
                    let unlock_price = quote.unlock_price.max(min_price).min(max_price).max(0);
                    ChapterPrice {
                        unlock_price,
                        key_cost: quote.key_cost.min(unlock_price).max(0),
                    }
                }
                PricingStrategy::Fixed { price, key_cost } => ChapterPrice { unlock_price: price, key_cost },
                PricingStrategy::Free => ChapterPrice::default(),
            }
        };

        let release = release_at(config.release_start_or(now), config.chapters_per_day, chapter_number);
        let is_released = release <= now;

        Ok(ChapterPlan {
            volume_number: volume_for(&config.volume_mode, chapter_number),
            unlock_price: price.unlock_price,
            key_cost: price.key_cost,
            is_free,
            release_at: release,
            is_released,
            is_advance: chapter_number > config.free_chapter_threshold && !is_released,
        })
    }
}
