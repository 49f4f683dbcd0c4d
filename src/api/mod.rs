//! API module containing route handlers and initialization logic
//!
//! This module is responsible for:
//! - Defining API routes and handlers
//! - Authenticating requests through extractors
//! - Providing API documentation through the index endpoint

/// Authentication extractors
pub mod extractors;

/// Route handlers for the API endpoints
pub mod handlers;

/// API documentation and index endpoint
pub mod index;

/// Router initialization and configuration
pub mod init;

pub use init::initialize_router;
