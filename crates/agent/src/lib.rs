//! Generation runtime - the network edge of the negotiation engine
//!
//! This crate connects the engine's `GenerationClient` contract to real
//! structured-generation services and wires sessions together:
//! - Sends quote, counter-offer and chat prompts over HTTP (`llm`)
//! - Declares each request's JSON Schema in the provider's native format
//! - Retries transient transport failures with exponential backoff
//! - Builds sessions from configuration (`runtime`)
//!
//! # Providers
//!
//! - Gemini (`generateContent` with `responseJsonSchema`)
//! - OpenAI-compatible chat completions (`response_format: json_schema`)
//! - Ollama (`/api/generate` with `format`)
//!
//! # Safety Principle
//!
//! The generation service only proposes figures. Whether they cover the fixed
//! tool costs is decided by the core interpreter, never by this crate.

pub mod llm;
pub mod runtime;
