// ============================================================
// Layer 3: Domain Layer
// ============================================================
// Plain Rust structs and traits describing the segmentation
// problem: image/mask pairs and the trimap label space.
//
// Rules for this layer:
//   - NO Burn framework types allowed here
//   - NO file I/O
//   - Only plain Rust structs, enums, and traits

// An image path paired with its trimap path
pub mod sample;

// Trimap label classes and mask display helpers
pub mod trimap;

// Core abstractions (traits) that other layers implement
pub mod traits;
