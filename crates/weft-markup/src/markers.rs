//! Attribute names written into the markup by the compiler and the runtime.

/// Compile-time scope index of an annotated element.
pub const SCOPE: &str = "data-weft";
/// Position of a replicated element within its clone set.
pub const CLONE: &str = "data-weft-clone";
/// Raw response text of a request, kept for rehydration.
pub const ECHO: &str = "data-weft-echo";

/// Opening delimiter of an embedded expression.
pub const OPEN: &str = "[[";
/// Closing delimiter of an embedded expression.
pub const CLOSE: &str = "]]";
