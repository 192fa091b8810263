//! Features Module - Canonicalization & Feature Assembly
//!
//! raw input → CanonicalFields → FeatureVector (schema order).
//! Schema là nguồn sự thật duy nhất cho thứ tự cột.

pub mod canonical;
pub mod layout;
pub mod vector;
pub mod assembler;


// Re-export common types
pub use canonical::{canonicalize, CanonicalFields, CategoricalField, NumericField, RawInput};
pub use layout::{
    CategoricalEncoding, FeatureKind, FeatureSchema, LayoutInfo, LayoutMismatchError, SchemaDocument,
    SchemaError,
};
pub use vector::FeatureVector;
pub use assembler::{assemble, Assembly, ScalingOutcome};
