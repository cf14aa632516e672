#![allow(dead_code)]

pub mod app;

pub use app::{call, make_test_app};
