// ============================================================
// Layer 3: Trimap Labels
// ============================================================
// The Oxford-IIIT Pet trimaps store one byte per pixel:
//
//   1 = pet (foreground)
//   2 = background
//   3 = border / not classified
//
// The network predicts class indices starting at zero, so a
// raw value v maps to class v - 1:
//
//   raw:   1  2  3
//   class: 0  1  2

/// The three regions of a trimap.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TrimapClass {
    Foreground,
    Background,
    Boundary,
}

impl TrimapClass {
    pub const ALL: [TrimapClass; 3] = [
        TrimapClass::Foreground,
        TrimapClass::Background,
        TrimapClass::Boundary,
    ];

    /// Zero-based class index used as the training target
    pub fn index(self) -> u8 {
        match self {
            TrimapClass::Foreground => 0,
            TrimapClass::Background => 1,
            TrimapClass::Boundary   => 2,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            TrimapClass::Foreground => "foreground",
            TrimapClass::Background => "background",
            TrimapClass::Boundary   => "boundary",
        }
    }
}

/// Convert a raw mask byte into a class index for a label space
/// of `num_classes` classes numbered 1..=num_classes on disk.
///
/// Returns None for 0 or for values above `num_classes`.
pub fn label_from_raw(raw: u8, num_classes: usize) -> Option<u8> {
    if raw == 0 || raw as usize > num_classes {
        return None;
    }
    Some(raw - 1)
}

/// Share of pixels predicted as each trimap class.
pub fn class_fractions(mask: &[u8]) -> Vec<(TrimapClass, f64)> {
    let total = mask.len().max(1) as f64;
    TrimapClass::ALL
        .iter()
        .map(|&class| {
            let count = mask.iter().filter(|&&v| v == class.index()).count();
            (class, count as f64 / total)
        })
        .collect()
}

/// Stretch a class-index mask so its smallest value becomes 0 and
/// its largest becomes 255, making the classes visible as gray
/// levels. Intermediate levels are truncated, not rounded, the same
/// lookup PIL's `ImageOps.autocontrast` builds. A single-valued mask
/// comes back unchanged.
pub fn autocontrast(mask: &[u8]) -> Vec<u8> {
    let (Some(&lo), Some(&hi)) = (mask.iter().min(), mask.iter().max()) else {
        return Vec::new();
    };
    if lo == hi {
        return mask.to_vec();
    }

    let scale  = 255.0 / (hi - lo) as f64;
    let offset = -(lo as f64) * scale;
    mask.iter()
        .map(|&v| (v as f64 * scale + offset).clamp(0.0, 255.0) as u8)
        .collect()
}
