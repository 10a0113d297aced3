// This module groups the installers for the SDKs that `setup` provisions.
//
// Each installer owns one toolchain and reports success as a `bool`,
// logging the reason for any failure where it happens.

/// Declares the `flutter` module, which installs FVM and the Flutter SDK it manages,
/// configures target platforms and builds projects.
pub(crate) mod flutter;

/// Declares the `android` module, responsible for Java, the Android command-line tools
/// and the SDK packages installed through `sdkmanager`.
pub(crate) mod android;

/// Declares the `kdf` module, which installs the native packages and Rust toolchain
/// needed to build the Komodo DeFi Framework.
pub(crate) mod kdf;
