use crate::models::FactorSide;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, AlsError>;

#[derive(Debug, Error)]
pub enum AlsError {
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error(
        "Observation ({user}, {item}) outside dense range [0, {num_users}) x [0, {num_items})"
    )]
    InvalidIndex {
        user: u32,
        item: u32,
        num_users: usize,
        num_items: usize,
    },

    #[error("Observation ({user}, {item}) has non-finite strength {strength}")]
    InvalidStrength { user: u32, item: u32, strength: f64 },

    #[error("Singular system while solving {side} {index}")]
    SingularSystem { side: FactorSide, index: u32 },

    #[error("{side} index {index} out of range (must be < {bound})")]
    OutOfRange {
        side: FactorSide,
        index: u32,
        bound: usize,
    },

    #[error("Invalid k: {0} (must be >= 0)")]
    InvalidK(i64),

    #[error("Factor rank mismatch: user factors have {user_rank} columns, item factors have {item_rank}")]
    DimensionMismatch { user_rank: usize, item_rank: usize },

    #[error(
        "Interaction index is {index_users}x{index_items} but the model covers {model_users}x{model_items}"
    )]
    ShapeMismatch {
        index_users: usize,
        index_items: usize,
        model_users: usize,
        model_items: usize,
    },

    #[error("Failed to build worker pool: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),
}

impl AlsError {
    /// Errors caused by the caller's input rather than by the trained model.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            AlsError::InvalidConfig(_)
                | AlsError::InvalidIndex { .. }
                | AlsError::InvalidStrength { .. }
                | AlsError::OutOfRange { .. }
                | AlsError::InvalidK(_)
        )
    }
}
