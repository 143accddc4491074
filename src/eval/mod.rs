pub mod evaluator;
pub mod log_builder;
