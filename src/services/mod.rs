//! Services separating I/O from capture and compositing logic

pub mod io;

pub use io::AssetIOService;
