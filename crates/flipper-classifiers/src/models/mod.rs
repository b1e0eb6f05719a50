pub(crate) mod cart;
pub mod classifier_trait;
pub mod factory;
pub mod fitted;
pub mod forest;
pub mod logistic;

pub use classifier_trait::ClassifierModel;
pub use fitted::{fit_model, FittedModel, Prediction};
