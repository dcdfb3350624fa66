/// Host lifecycle callbacks.
///
/// Calls for one host instance are strictly alternating and never overlap:
///
/// ```text
/// on_create ──► (on_focus_gained ──► on_focus_lost)* ──► on_destroy
/// ```
///
/// Every callback is synchronous and infallible. Failures are logged and
/// published as events by the implementation, never returned to the host.
pub trait LifecycleBridge<C> {
    /// The host was created: start serving commands.
    fn on_create(&self);

    /// The host is being destroyed: stop serving commands.
    fn on_destroy(&self);

    /// Focus was granted together with its context: start the focus-bound work.
    fn on_focus_gained(&self, ctx: C);

    /// Focus was lost: cancel the focus-bound work and wait for it to settle.
    fn on_focus_lost(&self);
}
