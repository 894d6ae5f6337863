//! Tests for the permission resolver module.
//!
//! Organized by functionality:
//! - Default deny and ownership
//! - Scope semantics (MATCH vs RECURSIVE)
//! - Nearest-ancestor precedence and DENY tie-break
//! - Unknown resources below known services
//! - Lineage construction and malformed data
