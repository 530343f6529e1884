// ABOUTME: Library entry point for the Latchkey authorization server
// ABOUTME: OAuth 2.0 / 2.1 grant flows with Ed25519-signed JWTs and a TTL-expiring session store
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Latchkey Contributors

#![deny(unsafe_code)]

//! # Latchkey
//!
//! An OAuth 2.0 authorization server with the mandatory PKCE tightening of
//! OAuth 2.1 (RFC 7636), publishing its capabilities via RFC 8414 metadata
//! and an RFC 7517 JWKS.
//!
//! ## Architecture
//!
//! - **Routes**: thin warp handlers parsing requests and shaping responses
//! - **Services**: grant flows, user auth and discovery documents, built with
//!   explicit constructor dependencies
//! - **Cache**: single-use authorization codes and refresh-token-keyed
//!   sessions in a TTL-expiring key-value store
//! - **Database**: read-only queries over users, role-derived scopes and
//!   registered clients
//! - **Tokens**: EdDSA (Ed25519) JWTs plus opaque refresh tokens, with the
//!   keypair derived deterministically from the configured secret

/// Cache abstraction holding authorization codes and session records
pub mod cache;

/// Environment-based configuration loading and validation
pub mod config;

/// Relational store access for users, scopes and OAuth clients
pub mod database;

/// Error taxonomy and the standard API error envelope
pub mod errors;

/// Ed25519 signing key management
pub mod keys;

/// Structured logging setup
pub mod logging;

/// Request middleware, including the session-token guard
pub mod middleware;

/// Startup retry helper with exponential backoff
pub mod retry;

/// HTTP route composition
pub mod routes;

/// Scope intersection with wildcard semantics
pub mod scopes;

/// Server bootstrap and graceful shutdown
pub mod server;

/// Domain service layer
pub mod services;

/// JWT and opaque token generation and validation
pub mod tokens;
