//! Integration tests for the publish pipeline.
//!
//! Pipeline scenarios run over the in-memory store and bus. Store tests
//! against PostgreSQL are ignored unless run with `--ignored` and a
//! `TEST_DATABASE_URL`.

mod helpers;

mod admission_test;
mod backpressure_test;
mod completion_test;
mod pipeline_test;
mod postgres_test;
