use std::sync::Arc;

/// Supplies the extension (without leading dot) an output file gets.
pub trait FileExtProvider {
    fn file_ext(&self) -> Option<Arc<str>>;
}
