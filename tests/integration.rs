//! Integration tests entry point
//!
//! Tests how naming, the runner and the trace checker fit together.
//! Run with: cargo test --test integration

mod integration {
    pub mod naming;
    pub mod parsing;
    pub mod pipeline;
}
