//! Integration test modules.
//!
//! Organized by feature area:
//! - `auth_tests`: login, logout, password recovery
//! - `api_tests`: backend client requests
//! - `admin_tests`: registry screens, dashboard and audit log
//! - `runner_tests`: task list and step-by-step execution
//! - `defeitos_tests`: defect listing and triage
//! - `general_tests`: health check and public pages
//! - `static_assets_tests`: embedded CSS/JS/favicon

mod admin_tests;
mod runner_tests;
mod static_assets_tests;
