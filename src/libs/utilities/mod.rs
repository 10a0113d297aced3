// This is the main module file for the `utilities` directory.
// Helpers here know nothing about Flutter or Android; installers build on them.

// Declare the `path_helpers` module.
pub mod path_helpers;
// Declare the `compression` module.
pub mod compression;
// HTTP downloads and text fetches.
pub mod assets;
