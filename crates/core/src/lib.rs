//! # Locator Core
//!
//! Two-stage resolution of a natural-language UI instruction to one page element.
//!
//! ```text
//! instruction + elements
//!     │
//!     ├──> signature::extract        canonical text per element
//!     ├──> retrieve (Stage 1)        embedding similarity, top-K
//!     ├──> intent::detect            click / input / select / verify / none
//!     ├──> rerank (Stage 2)          element-type + context + explicit-mention bonus
//!     └──> locator::synthesize       ranked locator strings for each survivor
//! ```
//!
//! ## Example
//!
//! ```no_run
//! use locator_core::{Resolver, ResolverConfig};
//! use locator_protocol::{ElementDescriptor, ResolveRequest};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let resolver = Resolver::new(ResolverConfig::default())?;
//!     let response = resolver
//!         .resolve(&ResolveRequest {
//!             instruction: "Click Sign In".to_string(),
//!             elements: vec![
//!                 ElementDescriptor::with_role("heading", "Sign In"),
//!                 ElementDescriptor::with_role("button", "Sign In"),
//!             ],
//!             ..ResolveRequest::default()
//!         })
//!         .await?;
//!     println!("{} ({:.2})", response.locator, response.score);
//!     Ok(())
//! }
//! ```

mod config;
mod error;
mod intent;
mod locator;
mod rerank;
mod resolver;
mod retrieve;
mod signature;
mod text;
mod tree;

pub use config::{ResolverConfig, DEFAULT_EMBED_TIMEOUT_MS};
pub use error::{ConfigError, ResolveError, Result};
pub use intent::{detect, rule_for, ActionRule, ACTION_RULES};
pub use locator::synthesize;
pub use rerank::{rerank, ScoredCandidate, EXPLICIT_MENTION_BONUS, MAX_HEURISTIC_BONUS};
pub use resolver::{describe_elements, list_locators, ResolutionResult, Resolver};
pub use retrieve::{retrieve, Retrieved};
pub use signature::{extract, ElementSignature, SignatureMetadata};
pub use tree::flatten_tree;
