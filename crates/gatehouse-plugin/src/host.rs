//! Host type bundle.

/// The types a host server owns and the plugin layer treats as opaque.
///
/// The manager never inspects any of these: it hands `AuthContext` to
/// plugins during initialization, stores `Endpoint`s by path, and orders
/// transforms over `Handler` without invoking them.
pub trait Host: Send + Sync + 'static {
    /// Authentication context passed to every plugin's `initialize`.
    type AuthContext: Send + Sync;
    /// A servable endpoint, keyed by path in the merged table.
    type Endpoint: Clone + Send + Sync;
    /// The request-handler type that middleware transforms wrap.
    type Handler;
}
