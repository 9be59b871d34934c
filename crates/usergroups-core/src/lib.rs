//! Core types, collaborator traits and engines for user groups.
//!
//! Subjects (user accounts) are organised into namespaces of terms ("groups",
//! "types"). This crate owns the membership model: group definitions, the
//! membership and bulk engines, and the access policy. Persistence and the
//! account system stay behind the [`store::TermStore`] and
//! [`store::UserDirectory`] traits; this crate has no database dependency.

// `TermStore` spells out `Send` on its futures; impls use plain `async fn`.
#![allow(async_fn_in_trait)]

pub mod access;
pub mod bulk;
pub mod capability;
pub mod directory;
pub mod error;
pub mod group;
pub mod membership;
pub mod nonce;
pub mod profile;
pub mod registry;
pub mod service;
pub mod store;
pub mod subject;
pub mod term;

pub use error::{Error, Result};
pub use service::UserGroups;
