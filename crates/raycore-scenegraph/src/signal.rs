//! Change propagation signals.

/// The kind of change a scene mutation reports to the world.
///
/// Geometry changes move surfaces and therefore invalidate the spatial
/// accelerator; material changes affect only shading state and leave the
/// accelerator untouched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeSignal {
    /// A surface moved, appeared or disappeared.
    Geometry,
    /// Only non-geometric state changed.
    Material,
}
