//! Varvara configuration.

/// Default number of 64 KiB RAM pages.
///
/// The first page is the executable page; the rest are raw memory only
/// reachable through the system device's expansion command.
pub const DEFAULT_PAGES: usize = 16;

/// Varvara configuration.
pub struct VarvaraConfig {
    /// Flat ROM image, loaded at the reset vector.
    pub rom_data: Vec<u8>,
    /// Number of 64 KiB RAM pages. Defaults to [`DEFAULT_PAGES`].
    pub pages: usize,
}

impl VarvaraConfig {
    /// Configuration for a ROM with the default amount of RAM.
    #[must_use]
    pub fn new(rom_data: Vec<u8>) -> Self {
        Self {
            rom_data,
            pages: DEFAULT_PAGES,
        }
    }
}
