/*!
 * Chapter import: reconciliation of segmented drafts against what a novel
 * already has, per-chapter planning (volume, price, release schedule) and the
 * title precheck.
 *
 * - `planner`: deterministic volume/price/schedule computation
 * - `pricing`: the pricing calculator seam and its profile-backed implementation
 * - `review`: applying title-check results and content rules to a draft
 * - `reconciler`: draft creation, dedup, edits and precheck
 */

pub mod planner;
pub mod pricing;
pub mod reconciler;
pub mod review;

use anyhow::{Result, anyhow};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub use planner::{ChapterPlan, ChapterPlanner};
pub use pricing::{ChapterPrice, PricingCalculator, ProfilePricing};
pub use reconciler::{ChapterUpdate, ImportOutcome, ImportReconciler, PrecheckSummary, ReconcileReport};
pub use review::{ReviewOutcome, apply_review};

/// How chapters are assigned to volumes
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum VolumeMode {
    /// Every chapter goes into the same volume
    Fixed {
        /// Target volume number
        volume_number: i64,
    },
    /// A new volume starts every `chapters_per_volume` chapters
    Bucketed {
        /// Chapters per volume
        chapters_per_volume: i64,
    },
}

impl Default for VolumeMode {
    fn default() -> Self {
        VolumeMode::Bucketed { chapters_per_volume: 100 }
    }
}

/// How paid chapters are priced
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "strategy", rename_all = "snake_case")]
pub enum PricingStrategy {
    /// Ask the pricing calculator and clamp its unlock price
    Calculated {
        /// Lowest unlock price
        min_price: i64,
        /// Highest unlock price
        max_price: i64,
    },
    /// Same price for every paid chapter
    Fixed {
        /// Unlock price
        price: i64,
        /// Key cost
        key_cost: i64,
    },
    /// Nothing is charged
    Free,
}

impl Default for PricingStrategy {
    fn default() -> Self {
        PricingStrategy::Calculated { min_price: 5, max_price: 200 }
    }
}

/// Settings fixed for the lifetime of an import batch
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImportConfig {
    /// Volume assignment
    #[serde(default)]
    pub volume_mode: VolumeMode,

    /// Chapters numbered up to and including this are free
    #[serde(default = "default_free_chapter_threshold")]
    pub free_chapter_threshold: i64,

    /// Pricing of chapters past the free threshold
    #[serde(default)]
    pub pricing: PricingStrategy,

    /// Release date of chapter 1 (the batch creation time when unset)
    #[serde(default)]
    pub release_start: Option<DateTime<Utc>>,

    /// Chapters released per day
    #[serde(default = "default_chapters_per_day")]
    pub chapters_per_day: i64,
}

fn default_free_chapter_threshold() -> i64 {
    10
}

fn default_chapters_per_day() -> i64 {
    1
}

impl Default for ImportConfig {
    fn default() -> Self {
        Self {
            volume_mode: VolumeMode::default(),
            free_chapter_threshold: default_free_chapter_threshold(),
            pricing: PricingStrategy::default(),
            release_start: None,
            chapters_per_day: default_chapters_per_day(),
        }
    }
}

impl ImportConfig {
    /// Check the settings for values the planner cannot work with
    pub fn validate(&self) -> Result<()> {
        match self.volume_mode {
            VolumeMode::Fixed { volume_number } if volume_number < 1 => {
                return Err(anyhow!("Fixed volume number must be at least 1"));
            }
            VolumeMode::Bucketed { chapters_per_volume } if chapters_per_volume < 1 => {
                return Err(anyhow!("Chapters per volume must be at least 1"));
            }
            _ => {}
        }

        if self.free_chapter_threshold < 0 {
            return Err(anyhow!("Free chapter threshold cannot be negative"));
        }

        if self.chapters_per_day < 1 {
            return Err(anyhow!("Chapters per day must be at least 1"));
        }

        match self.pricing {
            PricingStrategy::Calculated { min_price, max_price } => {
                if min_price < 0 || max_price < min_price {
                    return Err(anyhow!(
                        "Invalid price range: min {} max {}",
                        min_price,
                        max_price
                    ));
                }
            }
            PricingStrategy::Fixed { price, key_cost } => {
                if price < 0 || key_cost < 0 {
                    return Err(anyhow!("Fixed price and key cost cannot be negative"));
                }
            }
            PricingStrategy::Free => {}
        }

        Ok(())
    }

    /// Copy with the release start pinned, so the stored batch config is deterministic
    pub fn resolved(&self, now: DateTime<Utc>) -> Self {
        let mut resolved = self.clone();
        if resolved.release_start.is_none() {
            resolved.release_start = Some(now);
        }
        resolved
    }

    /// Release start, falling back to `now` for unresolved configs
    pub fn release_start_or(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        self.release_start.unwrap_or(now)
    }
}
