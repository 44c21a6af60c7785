//! Database initialization shared by Rollcall services

pub mod init;

pub use init::init_database;
