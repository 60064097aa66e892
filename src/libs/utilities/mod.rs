// This is the main module file for the `utilities` directory.
// It declares the small helper modules shared across `libs`.

// Path resolution, snapshot layout and recursive copies.
pub mod path_helpers;
// OS / architecture detection and PATH lookups.
pub mod platform;
// Snapshot stamps and duration formatting.
pub mod timestamps;
