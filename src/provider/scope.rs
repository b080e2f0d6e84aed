use crate::core::types::{Scope, SCOPE_ADDRESS, SCOPE_EMAIL, SCOPE_PHONE, SCOPE_PROFILE};

fn is_userinfo_scope(scope: &str) -> bool {
    matches!(scope, SCOPE_PROFILE | SCOPE_EMAIL | SCOPE_ADDRESS | SCOPE_PHONE)
}

/// Drops the scopes whose claims belong to the userinfo endpoint. Order and
/// duplicates of the remaining scopes are kept.
pub fn remove_userinfo_scopes(scope: &Scope) -> Scope {
    scope.iter().filter(|s| !is_userinfo_scope(s)).collect()
}
