//! Configuration access port.

/// Raw string values by section and key. Typed parsing and defaults live
/// in `domain::config_validation` so every source reports bad values the
/// same way.
pub trait ConfigPort {
    fn get_string(&self, section: &str, key: &str) -> Option<String>;

    /// Keys present in `section`, sorted. Empty when the section is absent.
    fn keys(&self, section: &str) -> Vec<String>;
}
