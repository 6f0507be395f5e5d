//! Bridge-level behaviour tests

mod helpers;

mod clone_tests;
mod exception_tests;
