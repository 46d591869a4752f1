//! Core types and utilities for kubeplane.
//!
//! This crate provides the foundational types shared by every kubeplane crate:
//!
//! - **Providers**: The closed set of cloud providers kubeplane can drive
//! - **Identifiers**: Session IDs and deterministic request tokens
//! - **Tags**: Ownership and scope markers written onto every cloud resource
//! - **Names**: Validation for cluster and node pool names
//!
//! # Example
//!
//! ```
//! use kubeplane_core::{Ownership, Provider, RequestToken};
//!
//! let provider: Provider = "aws".parse().unwrap();
//! assert_eq!(provider.as_str(), "aws");
//!
//! let ownership = Ownership::new("kubeplane", "staging");
//! let tags = ownership.tags();
//! assert!(ownership.matches(&tags));
//!
//! let token = RequestToken::derive(&["create-cluster", "c1", "us-east-1"]);
//! assert_eq!(token.as_str().len(), 32);
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod error;
pub mod ids;
pub mod names;
pub mod provider;
pub mod tags;

pub use error::{CoreError, Result};
pub use ids::{IdError, RequestToken, SessionId};
pub use names::validate_name;
pub use provider::Provider;
pub use tags::{Ownership, Tags};
