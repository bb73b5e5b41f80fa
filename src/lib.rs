pub mod backend;
pub mod config;
pub mod container;
pub mod utility;
