//! `wc-domain`: types shared by every crate of the WSRP consumer.

pub mod config;
pub mod error;
pub mod fault;
pub mod registration;
pub mod trace;
