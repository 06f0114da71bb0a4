//! Reset contract shared by all stateful components.

/// A component that responds to the console's reset lines.
///
/// Hard reset models a power cycle: every register and RAM cell takes its
/// documented power-up value. Soft reset models the reset button: RAM
/// contents survive, and only the documented register subset reinitializes.
pub trait Reset {
    /// Power-on reset.
    fn hard_reset(&mut self);

    /// Reset-button reset.
    fn reset(&mut self);
}
