/*!
 * Database module for persistent storage of imports, workflow progress and
 * the published catalog.
 *
 * This module provides SQLite-based persistence for:
 * - Import batches and their chapter drafts
 * - Translation tasks with per-chapter progress records (resume capability)
 * - Catalog volumes and chapters
 * - Per-novel pricing profiles
 */

pub mod connection;
pub mod models;
pub mod repository;
pub mod schema;

// Re-export main types
pub use connection::DatabaseConnection;
pub use repository::Repository;
