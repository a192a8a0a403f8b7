//! Real-server test suites.

mod redis_tests;
