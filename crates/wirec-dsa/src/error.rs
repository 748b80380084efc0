use thiserror::Error;

/// Contract violations raised by the counting structures.
///
/// None of these describe corrupt input; every variant means the caller broke
/// a precondition and should be treated as a bug at that call site.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum DsaError {
    #[error("sketch width must be a power of two, got {width}")]
    NonPowerOfTwoWidth { width: usize },

    #[error("sketch depth must be at least 1")]
    ZeroDepth,

    #[error("heavy hitter capacity must be a power of two, got {capacity}")]
    NonPowerOfTwoCapacity { capacity: usize },

    /// The cash-register model only counts upwards; decay is not implemented.
    #[error("unsupported operation: negative increment {count}")]
    NegativeIncrement { count: i64 },

    #[error("heavy hitter weight may only grow, tried {current} -> {requested}")]
    WeightDecrease { current: u64, requested: u64 },
}
