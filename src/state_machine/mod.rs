//! State machines driving the client.

pub mod connection_sm;
