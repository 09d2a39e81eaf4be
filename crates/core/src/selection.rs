//! Backend selection for a requested format, risk level, and user tier (RF-12).
//!
//! Selection never fails: an unmapped format resolves to the backup backend,
//! and ultimately to the hard-coded default. Callers log which rung was used
//! via [`SelectionOutcome::rung`]; a fallback is an operational signal, not a
//! user-visible error.

use serde::{Deserialize, Serialize};

use crate::catalog::{Catalog, GenerationBackend, COST_TIER_FLAGSHIP, COST_TIER_STANDARD};
use crate::error::CoreError;
use crate::risk::RiskLevel;

// ---------------------------------------------------------------------------
// Format key
// ---------------------------------------------------------------------------

/// Content style of a generation request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Style {
    Ugc,
    Cinematic,
    Slideshow,
    Tutorial,
}

impl Style {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Ugc => "ugc",
            Self::Cinematic => "cinematic",
            Self::Slideshow => "slideshow",
            Self::Tutorial => "tutorial",
        }
    }

    pub fn parse(s: &str) -> Result<Self, CoreError> {
        match s {
            "ugc" => Ok(Self::Ugc),
            "cinematic" => Ok(Self::Cinematic),
            "slideshow" => Ok(Self::Slideshow),
            "tutorial" => Ok(Self::Tutorial),
            other => Err(CoreError::Validation(format!(
                "Unknown style: '{other}'. Valid styles: ugc, cinematic, slideshow, tutorial"
            ))),
        }
    }
}

/// Target duration bucket, derived from the requested seconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DurationBucket {
    /// Up to 15 seconds.
    Short,
    /// 16 through 30 seconds.
    Standard,
    /// Anything longer.
    Extended,
}

impl DurationBucket {
    /// Bucket for a requested duration in seconds.
    pub fn from_secs(secs: u32) -> Self {
        if secs <= 15 {
            Self::Short
        } else if secs <= 30 {
            Self::Standard
        } else {
            Self::Extended
        }
    }
}

/// Lookup key into the primary/backup backend table. Not persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Format {
    pub style: Style,
    pub bucket: DurationBucket,
}

impl Format {
    pub fn new(style: Style, requested_secs: u32) -> Self {
        Self {
            style,
            bucket: DurationBucket::from_secs(requested_secs),
        }
    }
}

// ---------------------------------------------------------------------------
// Quality tier
// ---------------------------------------------------------------------------

/// Per-user quality setting. Premium unlocks flagship backends and
/// risk-aware upgrades.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QualityTier {
    Standard,
    Premium,
}

/// Highest cost tier a standard-tier user may be routed to.
pub const STANDARD_TIER_COST_CEILING: u8 = COST_TIER_STANDARD;

// ---------------------------------------------------------------------------
// Primary/backup table
// ---------------------------------------------------------------------------

/// Primary and backup backend ids for a format. `None` falls through to the
/// catalog default.
fn format_mapping(format: Format) -> Option<(&'static str, &'static str)> {
    use DurationBucket::*;
    use Style::*;
    match (format.style, format.bucket) {
        (Ugc, Short) => Some(("pixelwave-hd", "pixelwave-lite")),
        (Ugc, Standard) => Some(("aurora-std", "pixelwave-hd")),
        (Ugc, Extended) => Some(("aurora-std", "meridian-ultra")),
        (Cinematic, Short) => Some(("aurora-max", "aurora-std")),
        (Cinematic, Standard) => Some(("aurora-max", "meridian-ultra")),
        (Cinematic, Extended) => Some(("meridian-ultra", "aurora-max")),
        (Slideshow, Short) => Some(("pixelwave-lite", "pixelwave-hd")),
        (Slideshow, Standard) => Some(("pixelwave-hd", "aurora-std")),
        (Tutorial, Short) => Some(("pixelwave-hd", "aurora-std")),
        (Tutorial, Standard) => Some(("aurora-std", "aurora-max")),
        // Remaining combinations have no curated mapping yet.
        _ => None,
    }
}

// ---------------------------------------------------------------------------
// Pure format-based selection
// ---------------------------------------------------------------------------

/// Which rung of the fallback chain produced the selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectionRung {
    Primary,
    Backup,
    Default,
}

/// A selected backend plus the fallback rung that produced it.
#[derive(Debug, Clone, Copy)]
pub struct SelectionOutcome {
    pub backend: &'static GenerationBackend,
    pub rung: SelectionRung,
}

/// Select a backend for a format using the primary/backup table.
///
/// Absence of a mapping (or of the mapped backend in the catalog) resolves
/// to the default backend rather than an error: generation must never block
/// on a missing table entry.
pub fn select_backend(catalog: &Catalog, format: Format) -> SelectionOutcome {
    if let Some((primary, backup)) = format_mapping(format) {
        if let Some(backend) = catalog.find(primary) {
            return SelectionOutcome {
                backend,
                rung: SelectionRung::Primary,
            };
        }
        if let Some(backend) = catalog.find(backup) {
            return SelectionOutcome {
                backend,
                rung: SelectionRung::Backup,
            };
        }
    }
    SelectionOutcome {
        backend: catalog.default_backend(),
        rung: SelectionRung::Default,
    }
}

// ---------------------------------------------------------------------------
// Risk-aware selection
// ---------------------------------------------------------------------------

/// Minimum cost tier implied by a risk level.
fn required_cost_tier(risk: RiskLevel) -> u8 {
    match risk {
        RiskLevel::Low => 1,
        RiskLevel::Medium => COST_TIER_STANDARD,
        RiskLevel::High => COST_TIER_FLAGSHIP,
    }
}

/// Select a backend taking content risk and the user's quality tier into
/// account.
///
/// Starts from the format-based selection. High risk or a premium tier
/// upgrades to the cheapest backend meeting the risk's minimum cost tier;
/// standard-tier users are capped at [`STANDARD_TIER_COST_CEILING`]
/// regardless of computed risk. Ties between qualifying backends break
/// toward the lowest `usd_per_second`, then table order.
pub fn select_backend_risk_aware(
    catalog: &Catalog,
    format: Format,
    risk: RiskLevel,
    tier: QualityTier,
) -> SelectionOutcome {
    let base = select_backend(catalog, format);

    let ceiling = match tier {
        QualityTier::Standard => STANDARD_TIER_COST_CEILING,
        QualityTier::Premium => COST_TIER_FLAGSHIP,
    };
    let required = required_cost_tier(risk).min(ceiling);

    // Low-risk standard users keep the format selection, clamped to the
    // ceiling if the table mapped them above it.
    if risk == RiskLevel::Low && tier == QualityTier::Standard {
        if base.backend.cost_tier <= ceiling {
            return base;
        }
    } else if base.backend.cost_tier >= required && base.backend.cost_tier <= ceiling {
        // The format choice already satisfies the bar; keep it.
        return base;
    }

    let upgraded = catalog
        .entries()
        .iter()
        .filter(|b| b.cost_tier >= required && b.cost_tier <= ceiling)
        .min_by(|a, b| {
            a.usd_per_second
                .partial_cmp(&b.usd_per_second)
                .unwrap_or(std::cmp::Ordering::Equal)
        });

    match upgraded {
        Some(backend) => SelectionOutcome {
            backend,
            rung: base.rung,
        },
        // No backend satisfies the bar within the ceiling. Fall back to the
        // format selection rather than refuse to generate.
        None => base,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
