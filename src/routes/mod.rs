/// Router Module Index
///
/// Groups the HTTP surface by concern. Access control is not applied here:
/// every route passes through `guard::session_guard`, which consults the route
/// table, and protected page handlers additionally take the `AuthUser` extractor.

/// Server-rendered pages.
pub mod pages;

/// Form actions and the auth provider callback.
pub mod auth;

/// JSON endpoints for probes and client-side code.
pub mod api;
