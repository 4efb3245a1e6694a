//! Unit-Tests fuer das Chat-Crate

mod chat_service_tests;
