// PaperWatch Control Plane Library
// Decision: Shared library for binaries (API server, OpenAPI export)

// API routes and types (shared for OpenAPI generation)
pub mod api;

// Process configuration
pub mod config;

// Periodic sweep loops
pub mod sweeps;

// Notification transport
pub mod webhook;

// OpenAPI document generation
pub mod openapi;
