use http::Response;

/// A response head; the body travels separately as payload items.
pub type ResponseHead = Response<()>;
