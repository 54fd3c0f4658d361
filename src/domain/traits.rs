// ============================================================
// Layer 3: Core Traits (Abstractions)
// ============================================================
// The application layer asks a SampleSource for pairs and never
// touches the directory layout itself.
//
// Implementations:
//   - PetsIndex → Oxford-IIIT Pet images/ + trimaps/ directories

use anyhow::Result;
use crate::domain::sample::SamplePair;

// ─── SampleSource ─────────────────────────────────────────────────────────────
/// Any component that can enumerate image/mask pairs.
pub trait SampleSource {
    /// List every available pair, in a stable order.
    fn load_all(&self) -> Result<Vec<SamplePair>>;
}
