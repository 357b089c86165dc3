mod common;

mod manager_tests;
mod manifest_tests;
mod registry_tests;
