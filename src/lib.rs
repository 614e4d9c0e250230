//! Librarian Sync - mirrors remote download trees and files the results into
//! a TV and movie library.

pub mod app;
pub mod cli;
pub mod config;
pub mod db;
pub mod error;
pub mod services;
