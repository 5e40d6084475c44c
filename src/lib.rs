//! # Docgen
//!
//! Server side of a self-hosted documentation platform. This crate owns the
//! access layer: email and password login guarded by a per-client throttle and
//! an arithmetic challenge, server-side sessions carried in a cookie,
//! admin-initiated password resets and role gates on documentation sections.
//!
//! Editors and admins can preview the site as another role set or another
//! user. While previewing, their own elevated privileges are suspended until
//! they stop.

pub mod api;
pub mod cli;
