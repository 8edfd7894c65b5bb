/// Media library
///
/// Catalogue of uploaded images and their stored renditions.
pub mod catalog;
pub mod models;

pub use catalog::{MediaCatalog, MEDIA_PER_PAGE};
pub use models::*;
