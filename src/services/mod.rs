//! External service clients.

pub mod images;

pub use images::ImageHost;
