// Pipeline processing: canonicalization, matching, normalization and quality

pub mod dedupe;
pub mod normalize;
pub mod quality;
pub mod similarity;
pub mod text;
