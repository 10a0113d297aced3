// Data structures describing how an installation run is configured.

// The resolved configuration every manager reads.
pub mod environment;
// The optional YAML config file, with every field optional.
pub mod file_config;
