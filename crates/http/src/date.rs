//! `Date` header values.
//!
//! Formatting an IMF-fixdate on every response is wasted work when the
//! value only changes once per second, so the last formatted value is kept
//! behind an [`ArcSwap`] together with the second it belongs to. Readers
//! never block; a reader that notices a new second formats and publishes the
//! new value itself.

use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use arc_swap::ArcSwap;
use bytes::Bytes;
use http::HeaderValue;
use once_cell::sync::Lazy;

struct CachedDate {
    second: u64,
    value: HeaderValue,
}

impl CachedDate {
    fn at(second: u64) -> Self {
        let mut buf = faf_http_date::get_date_buff_no_key();
        faf_http_date::get_date_no_key(&mut buf);
        // SAFETY: faf_http_date only writes IMF-fixdate characters, all visible ASCII
        let value = unsafe { HeaderValue::from_maybe_shared_unchecked(Bytes::from_owner(buf)) };
        Self { second, value }
    }
}

static CURRENT: Lazy<ArcSwap<CachedDate>> = Lazy::new(|| ArcSwap::from_pointee(CachedDate::at(unix_second())));

fn unix_second() -> u64 {
    SystemTime::now().duration_since(UNIX_EPOCH).map_or(0, |elapsed| elapsed.as_secs())
}

/// The current time as a `Date` header value.
pub fn http_date() -> HeaderValue {
    let now = unix_second();
    let cached = CURRENT.load();
    if cached.second == now {
        return cached.value.clone();
    }

    let fresh = Arc::new(CachedDate::at(now));
    let value = fresh.value.clone();
    CURRENT.store(fresh);
    value
}
