// AI Coaching Request Pipeline
//
// Dependency order, leaves first: redact -> aggregate -> fingerprint ->
// store (cache + rate_limit) -> context -> invoke -> normalize -> pipeline.

pub mod aggregate;
pub mod cache;
pub mod context;
pub mod fingerprint;
pub mod invoke;
pub mod normalize;
pub mod pipeline;
pub mod rate_limit;
pub mod redact;
pub mod store;

pub use context::CoachContext;
pub use pipeline::{CoachPipeline, GenerateRequest};
