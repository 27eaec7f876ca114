//! Shared LLM service: Ollama/OpenAI providers, unified errors, health
//! checks, fast/slow/embedding profiles, a circuit breaker, and the
//! structured-output review analyzer built on top of them.

pub mod circuit_breaker;
pub mod config;
pub mod error_handler;
pub mod health_service;
pub mod review_analyzer;
pub mod service_profiles;
pub mod services;
pub mod telemetry;

pub use circuit_breaker::CircuitBreaker;
pub use error_handler::AiLlmError;
pub use review_analyzer::{AnalysisResult, AnalyzerInput, ReviewAnalyzer, ReviewFinding};
pub use service_profiles::LlmServiceProfiles;
