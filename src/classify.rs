//! Protocol classifier: peeks the first bytes of a freshly accepted
//! connection and decides whether it looks like an HTTP/1.x request line
//! or raw L4 traffic.

use crate::constants::CLASSIFY_PEEK_BYTES;

const HTTP_METHOD_PREFIXES: &[&str] = &["GET ", "POST ", "PUT ", "DELETE ", "HEAD ", "OPTIONS "];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Protocol {
    Http,
    Tcp,
}

/// Tests whether `peeked` (at most `CLASSIFY_PEEK_BYTES` bytes, possibly
/// fewer if the peer closed early) begins with one of the recognized HTTP
/// method prefixes. A short read that never matches is routed to the L4
/// path, same as a read with no HTTP prefix present.
pub fn classify(peeked: &[u8]) -> Protocol {
    debug_assert!(peeked.len() <= CLASSIFY_PEEK_BYTES);
    for prefix in HTTP_METHOD_PREFIXES {
        if peeked.starts_with(prefix.as_bytes()) {
            return Protocol::Http;
        }
    }
    Protocol::Tcp
}
