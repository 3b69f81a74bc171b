//! Use-case services over the module gateways.
//!
//! # Responsibility
//! - Enforce business and authorization rules around gateway calls.
//! - Keep the CLI decoupled from storage details.

pub mod care_service;
pub mod document_service;
pub mod export_service;
pub mod photo_access;
pub mod photo_service;
pub mod sync_service;
