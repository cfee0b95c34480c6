//! Marketplace workflow tests against the in-memory ports.

mod support;
mod booking;
mod cancel;
mod reschedule;
mod provider;
mod lab;
