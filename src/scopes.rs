// ABOUTME: Scope intersection between user-granted and client-requested scopes
// ABOUTME: Colon-delimited scope strings with terminal-position wildcards
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Latchkey Contributors

use std::collections::HashSet;

/// Filter client scopes down to the ones the user actually holds.
///
/// A user grants a client scope when they hold the exact scope, the ultimate
/// admin scope `*`, or a general scope that covers it (`api:*` covers
/// `api:read`; `api:read:*` covers `api:read:user`). Wildcards on the client
/// side never grant anything on their own; they survive only when the user
/// holds the identical scope.
///
/// Malformed client scopes (empty segments, wildcard in a non-terminal
/// position) are dropped. Output preserves first-occurrence order of
/// `client_scopes` and contains no duplicates.
#[must_use]
pub fn filter_scopes(user_scopes: &[String], client_scopes: &[String]) -> Vec<String> {
    if user_scopes.is_empty() || client_scopes.is_empty() {
        return Vec::new();
    }

    let mut filtered = Vec::new();
    let mut seen = HashSet::new();

    for client_scope in client_scopes {
        if !is_valid_scope(client_scope) {
            continue;
        }

        if user_has_permission(user_scopes, client_scope) && seen.insert(client_scope.as_str()) {
            filtered.push(client_scope.clone());
        }
    }

    filtered
}

/// A scope is valid when it is `*`, or every colon-separated segment is
/// non-empty and `*` appears only as the final segment
fn is_valid_scope(scope: &str) -> bool {
    if scope.is_empty() || scope == "*" {
        return scope == "*";
    }

    let parts: Vec<&str> = scope.split(':').collect();
    for (i, part) in parts.iter().enumerate() {
        if part.is_empty() {
            return false;
        }
        if *part == "*" && i != parts.len() - 1 {
            return false;
        }
    }
    true
}

/// Whether the user holds a scope covering `client_scope`
fn user_has_permission(user_scopes: &[String], client_scope: &str) -> bool {
    if user_scopes.iter().any(|s| s == client_scope) {
        return true;
    }

    if user_scopes.iter().any(|s| s == "*") {
        return true;
    }

    // For "api:read:user" check the covering prefixes "api:*" and "api:read:*".
    let parts: Vec<&str> = client_scope.split(':').collect();
    for i in 1..parts.len() {
        let general = format!("{}:*", parts[..i].join(":"));
        if user_scopes.iter().any(|s| *s == general) {
            return true;
        }
    }

    false
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scopes(values: &[&str]) -> Vec<String> {
        values.iter().map(|s| (*s).to_owned()).collect()
    }

    fn assert_filtered(user: &[&str], client: &[&str], expected: &[&str]) {
        assert_eq!(
            filter_scopes(&scopes(user), &scopes(client)),
            scopes(expected),
            "user={user:?} client={client:?}"
        );
    }

    #[test]
    fn exact_matches() {
        assert_filtered(&["api:read"], &["api:read"], &["api:read"]);
        assert_filtered(
            &["api:read", "api:write"],
            &["api:read", "api:write"],
            &["api:read", "api:write"],
        );
        assert_filtered(&["api:read"], &["api:read", "api:write"], &["api:read"]);
        assert_filtered(&["api:read"], &["api:write"], &[]);
    }

    #[test]
    fn ultimate_admin_scope_grants_everything() {
        assert_filtered(
            &["*"],
            &["api:read", "api:write", "user:delete"],
            &["api:read", "api:write", "user:delete"],
        );
        assert_filtered(
            &["*", "api:read"],
            &["api:read", "user:write"],
            &["api:read", "user:write"],
        );
    }

    #[test]
    fn general_scopes_cover_specific_scopes() {
        assert_filtered(
            &["api:*"],
            &["api:read", "api:write", "user:delete"],
            &["api:read", "api:write"],
        );
        assert_filtered(
            &["api:*", "user:*"],
            &["api:read", "user:write", "admin:delete"],
            &["api:read", "user:write"],
        );
    }

    #[test]
    fn multi_level_general_scopes() {
        assert_filtered(
            &["api:read:*"],
            &["api:read:user", "api:read:posts", "api:write:user"],
            &["api:read:user", "api:read:posts"],
        );
        assert_filtered(
            &["api:read:*", "api:write:*"],
            &["api:read:user", "api:write:posts", "user:delete"],
            &["api:read:user", "api:write:posts"],
        );
    }

    #[test]
    fn client_wildcards_do_not_grant() {
        assert_filtered(&["api:read"], &["api:*"], &[]);
        assert_filtered(&["api:read"], &["*"], &[]);
    }

    #[test]
    fn mixed_general_and_specific() {
        assert_filtered(
            &["api:*", "user:read"],
            &["api:write", "user:read", "user:delete", "admin:read"],
            &["api:write", "user:read"],
        );
        assert_filtered(
            &["api:*"],
            &["api:read:user", "api:write:posts:meta"],
            &["api:read:user", "api:write:posts:meta"],
        );
    }

    #[test]
    fn empty_inputs_return_empty() {
        assert_filtered(&[], &["api:read"], &[]);
        assert_filtered(&["api:read"], &[], &[]);
        assert_filtered(&[], &[], &[]);
    }

    #[test]
    fn deep_nested_matching() {
        assert_filtered(
            &["api:read:user:*"],
            &["api:read:user:profile", "api:read:user:settings", "api:read:posts"],
            &["api:read:user:profile", "api:read:user:settings"],
        );
        assert_filtered(
            &["api:*", "user:read:*"],
            &["api:write:posts:meta", "user:read:profile:public", "admin:delete"],
            &["api:write:posts:meta", "user:read:profile:public"],
        );
    }

    #[test]
    fn order_independence_of_user_scopes() {
        assert_filtered(
            &["user:read", "api:*"],
            &["api:write", "user:read", "admin:delete"],
            &["api:write", "user:read"],
        );
    }

    #[test]
    fn duplicates_are_collapsed() {
        assert_filtered(
            &["api:read", "api:read", "api:*"],
            &["api:read", "api:write", "api:read"],
            &["api:read", "api:write"],
        );
    }

    #[test]
    fn malformed_scopes_are_ignored() {
        assert_filtered(
            &["api:", ":read", "api:read"],
            &["api:read", "api:", ":write"],
            &["api:read"],
        );
        assert_filtered(&["*"], &["a", "b:c"], &["a", "b:c"]);
        assert_filtered(&["api:read:*:invalid"], &["api:read:user"], &[]);
        assert_filtered(&["*"], &["api:*:read"], &[]);
    }

    #[test]
    fn filtering_is_idempotent() {
        let user = scopes(&["api:*", "user:read"]);
        let client = scopes(&["api:write", "user:read", "admin:x"]);
        let once = filter_scopes(&user, &client);
        let twice = filter_scopes(&user, &once);
        assert_eq!(once, twice);
    }
}
