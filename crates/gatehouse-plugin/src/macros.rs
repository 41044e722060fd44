//! Convenience macros for plugin and host code.

/// Builds a [`HookPayload`](crate::hooks::definitions::HookPayload) from key/value pairs.
///
/// Values go through `serde_json::json!`, so any serializable expression works.
///
/// # Example
/// ```rust,ignore
/// let payload = hook_payload!(actor: user_id, {
///     "path" => "/session",
///     "status" => 200,
/// });
/// ```
#[macro_export]
macro_rules! hook_payload {
    () => {
        $crate::hooks::definitions::HookPayload::new()
    };
    ({ $($key:expr => $value:expr),* $(,)? }) => {{
        let mut payload = $crate::hooks::definitions::HookPayload::new();
        $(
            payload.insert($key, $crate::__private::serde_json::json!($value));
        )*
        payload
    }};
    (actor: $actor:expr, { $($key:expr => $value:expr),* $(,)? }) => {{
        let mut payload = $crate::hooks::definitions::HookPayload::new().with_actor($actor);
        $(
            payload.insert($key, $crate::__private::serde_json::json!($value));
        )*
        payload
    }};
}
