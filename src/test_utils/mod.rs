//! Helpers for testing clients against the mock
//!
//! [`spawn_test_server`] starts the mock on a real socket and hands back its base URL;
//! [`normalize_for_snapshot`] masks the identifiers that change on every run so responses can
//! be compared exactly.

pub mod server;
pub mod snapshot;

pub use server::{TestServerHandle, spawn_router, spawn_test_server, spawn_test_server_with};
pub use snapshot::{ID_PLACEHOLDER, is_id_key, mask_keys, normalize_for_snapshot};
