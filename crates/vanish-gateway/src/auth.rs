use subtle::ConstantTimeEq;

/// Prefix for per-recipient channels: one channel per identity handle.
pub const CHANNEL_PREFIX: &str = "chat.user.";

/// Channel name for a recipient handle, e.g. `chat.user.sara`.
pub fn channel_name(handle: &str) -> String {
    format!("{CHANNEL_PREFIX}{handle}")
}

/// The handle a channel name is scoped to, if it is a recipient channel.
pub fn subscriber_handle(channel: &str) -> Option<&str> {
    channel.strip_prefix(CHANNEL_PREFIX).filter(|h| !h.is_empty())
}

/// A subscription is granted iff the requester is authenticated and their
/// handle equals the channel's scoped handle. The comparison is constant
/// time so response timing cannot be used to probe which handles exist;
/// denial is silent for the same reason.
pub fn authorize_subscription(requester: Option<&str>, channel_handle: &str) -> bool {
    let Some(requester) = requester else {
        return false;
    };
    constant_time_eq(requester.as_bytes(), channel_handle.as_bytes())
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        // Burn the same comparison work before rejecting on length.
        let _ = a.ct_eq(a);
        return false;
    }
    a.ct_eq(b).into()
}
