/// ORGiD Validator
///
/// Verifies JWTs issued by ORGiD organisations and resolves ORGiD DID
/// documents, behind a small HTTP API.

pub mod allow_list;
pub mod api;
pub mod cache;
pub mod config;
pub mod context;
pub mod crypto;
pub mod error;
pub mod identity;
pub mod metrics;
pub mod pipeline;
pub mod server;
pub mod token;
pub mod verify;

pub use context::AppContext;
pub use error::{ValidatorError, ValidatorResult};
