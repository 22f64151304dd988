pub mod als;
pub mod confidence;
pub mod initializer;
pub mod interactions;
pub mod recommender;

pub use als::{implicit_loss, train, Factorization, GramSnapshot, ImplicitAls, SingularRow, TrainingReport};
pub use confidence::{confidence_and_preference, to_confidence_entry};
pub use initializer::{FactorInitializer, InitializationMethod};
pub use interactions::{infer_dimensions, InteractionIndex};
pub use recommender::RecommendationEngine;
