// ABOUTME: Request middleware shared across route modules
// ABOUTME: Currently the browser session-token guard
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Latchkey Contributors

pub mod session;
