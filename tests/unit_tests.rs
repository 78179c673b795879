//! Unit tests against the public API, one module per component.

mod unit;
