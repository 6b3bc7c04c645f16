//! Application constants

/// Default number of clips returned by the list endpoint
pub const DEFAULT_CLIP_LIMIT: i64 = 6;

/// Maximum number of clips a caller may request in one page
pub const MAX_CLIP_LIMIT: i64 = 50;

/// Default per-category cap for the grouped clip listing
pub const DEFAULT_PER_CATEGORY_LIMIT: i64 = 2;

/// Accessibility probe timeout, enforced per request (each redirect hop gets its own)
pub const PROBE_TIMEOUT_SECS: u64 = 10;

/// Maximum redirect hops a probe will follow
pub const MAX_REDIRECT_HOPS: u8 = 5;

/// A verification result older than this is stale and gets re-checked
pub const REVALIDATION_WINDOW_DAYS: i64 = 7;

/// User-Agent for outbound probes, so remote operators can identify the traffic
pub const PROBE_USER_AGENT: &str =
    "LaunchpadLinkCheck/1.0 (+https://launchpad.careers/link-checker)";
