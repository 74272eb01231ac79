//! Small conversions between `http` crate types (used everywhere else in
//! this workspace) and `wreq`'s own distinct header/method types. `wreq`
//! doesn't build on the `http` crate, so every call into it needs this
//! bridge at the seam.

pub fn to_wreq_method(method: &http::Method) -> wreq::Method {
    match *method {
        http::Method::GET => wreq::Method::GET,
        http::Method::POST => wreq::Method::POST,
        http::Method::PUT => wreq::Method::PUT,
        http::Method::PATCH => wreq::Method::PATCH,
        http::Method::DELETE => wreq::Method::DELETE,
        http::Method::HEAD => wreq::Method::HEAD,
        http::Method::OPTIONS => wreq::Method::OPTIONS,
        ref other => wreq::Method::from_bytes(other.as_str().as_bytes()).unwrap_or(wreq::Method::GET),
    }
}

pub fn from_wreq_headers(headers: &wreq::header::HeaderMap) -> http::HeaderMap {
    let mut out = http::HeaderMap::with_capacity(headers.len());
    for (name, value) in headers.iter() {
        if let (Ok(name), Ok(value)) = (
            http::HeaderName::from_bytes(name.as_str().as_bytes()),
            http::HeaderValue::from_bytes(value.as_bytes()),
        ) {
            out.append(name, value);
        }
    }
    out
}
