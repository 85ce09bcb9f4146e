//! End-to-end tests through the full router
//!
//! A shell script stands in for the fetch tool and a local axum server
//! plays the playlist origin.

mod e2e;
mod fixtures;
