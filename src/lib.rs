//! Image server
//!
//! Serves `<images_dir>/<itemid>.<ext>` for `GET <route>?itemid=<digits>`,
//! probing `.png`, `.jpg`, `.jpeg`, `.webp` and `.gif` in that order.

pub mod config;
pub mod handler;
pub mod http;
pub mod logger;
pub mod server;
