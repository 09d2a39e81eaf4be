//! Static registry of video-generation backends (RF-11).
//!
//! Backends are third-party models with their own per-second pricing and
//! per-call duration ceilings. The catalog is built once at process start
//! from the static table below and never mutated.

// ---------------------------------------------------------------------------
// Capability tags
// ---------------------------------------------------------------------------

/// Backend renders fine motor detail (hands, fingers) reliably.
pub const CAP_FINE_MOTION: &str = "fine_motion";
/// Backend keeps on-screen text legible.
pub const CAP_TEXT_LEGIBLE: &str = "text_legible";
/// Backend supports multi-image reference conditioning.
pub const CAP_MULTI_IMAGE: &str = "multi_image";
/// Backend supports vertical 9:16 output natively.
pub const CAP_VERTICAL: &str = "vertical";

// ---------------------------------------------------------------------------
// Cost tiers
// ---------------------------------------------------------------------------

/// Cheapest backends, acceptable for low-risk content.
pub const COST_TIER_ECONOMY: u8 = 1;
/// Mid-range backends, the default for most formats.
pub const COST_TIER_STANDARD: u8 = 2;
/// Flagship backends reserved for high-risk or premium work.
pub const COST_TIER_FLAGSHIP: u8 = 3;

// ---------------------------------------------------------------------------
// Backend entry
// ---------------------------------------------------------------------------

/// An immutable catalog entry for one generation backend.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize)]
pub struct GenerationBackend {
    /// Stable identifier referenced by jobs (kebab-case slug).
    pub id: &'static str,
    /// Human-readable name for dashboards.
    pub display_name: &'static str,
    /// Price per rendered second, in USD.
    pub usd_per_second: f64,
    /// Maximum duration a single provider call can render.
    pub max_duration_secs: u32,
    /// Capability tags (see the `CAP_*` constants).
    pub capabilities: &'static [&'static str],
    /// Model name understood by the provider's dispatch API.
    pub provider_model: &'static str,
    /// Cost tier, 1 (economy) through 3 (flagship).
    pub cost_tier: u8,
}

impl GenerationBackend {
    /// Whether this backend carries the given capability tag.
    pub fn has_capability(&self, cap: &str) -> bool {
        self.capabilities.contains(&cap)
    }
}

// ---------------------------------------------------------------------------
// Static table
// ---------------------------------------------------------------------------

/// Backend used when a format has no primary or backup mapping.
pub const DEFAULT_BACKEND_ID: &str = "pixelwave-hd";

/// The built-in backend table. Order is stable and part of the contract:
/// selection tie-breaks scan in table order.
pub const BACKENDS: &[GenerationBackend] = &[
    GenerationBackend {
        id: "pixelwave-lite",
        display_name: "Pixelwave Lite",
        usd_per_second: 0.04,
        max_duration_secs: 10,
        capabilities: &[CAP_VERTICAL],
        provider_model: "pixelwave-v2-lite",
        cost_tier: COST_TIER_ECONOMY,
    },
    GenerationBackend {
        id: "pixelwave-hd",
        display_name: "Pixelwave HD",
        usd_per_second: 0.07,
        max_duration_secs: 10,
        capabilities: &[CAP_VERTICAL, CAP_TEXT_LEGIBLE],
        provider_model: "pixelwave-v2-hd",
        cost_tier: COST_TIER_STANDARD,
    },
    GenerationBackend {
        id: "aurora-std",
        display_name: "Aurora Standard",
        usd_per_second: 0.09,
        max_duration_secs: 15,
        capabilities: &[CAP_VERTICAL, CAP_MULTI_IMAGE],
        provider_model: "aurora-1.5",
        cost_tier: COST_TIER_STANDARD,
    },
    GenerationBackend {
        id: "aurora-max",
        display_name: "Aurora Max",
        usd_per_second: 0.16,
        max_duration_secs: 15,
        capabilities: &[CAP_VERTICAL, CAP_MULTI_IMAGE, CAP_FINE_MOTION, CAP_TEXT_LEGIBLE],
        provider_model: "aurora-1.5-max",
        cost_tier: COST_TIER_FLAGSHIP,
    },
    GenerationBackend {
        id: "meridian-ultra",
        display_name: "Meridian Ultra",
        usd_per_second: 0.22,
        max_duration_secs: 20,
        capabilities: &[CAP_VERTICAL, CAP_FINE_MOTION, CAP_TEXT_LEGIBLE],
        provider_model: "meridian-ultra-0425",
        cost_tier: COST_TIER_FLAGSHIP,
    },
];

// ---------------------------------------------------------------------------
// Catalog
// ---------------------------------------------------------------------------

/// Process-wide, read-only view over the backend table.
#[derive(Debug, Clone, Copy)]
pub struct Catalog {
    entries: &'static [GenerationBackend],
}

impl Catalog {
    /// Catalog over the built-in backend table.
    pub fn builtin() -> Self {
        Self { entries: BACKENDS }
    }

    /// Catalog over a custom table. Used by tests.
    pub fn with_entries(entries: &'static [GenerationBackend]) -> Self {
        Self { entries }
    }

    /// Look up a backend by its stable identifier.
    pub fn find(&self, id: &str) -> Option<&'static GenerationBackend> {
        self.entries.iter().find(|b| b.id == id)
    }

    /// The hard-coded default backend.
    ///
    /// The default must always be present in the table; the catalog is
    /// unusable otherwise, so this is enforced on first access.
    pub fn default_backend(&self) -> &'static GenerationBackend {
        self.find(DEFAULT_BACKEND_ID)
            .unwrap_or(&self.entries[0])
    }

    /// All entries, in table order.
    pub fn entries(&self) -> &'static [GenerationBackend] {
        self.entries
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
