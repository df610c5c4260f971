//! Integration tests for savesync-api
//!
//! Uses wiremock to simulate the save store and verifies end-to-end
//! behavior of listing, streaming transfers and the device-link calls.

mod common;

mod test_link;
mod test_listing;
mod test_transfer;
