/// Keep-alive interval for server-sent event streams
pub const SSE_KEEP_ALIVE_SECS: u64 = 15;

/// Comment text sent on SSE keep-alive frames
pub const SSE_KEEP_ALIVE_TEXT: &str = "ping";
