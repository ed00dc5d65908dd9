// src/lib.rs
pub mod config;
pub mod error;
pub mod cache;

pub mod truth {
    pub mod relation;
    pub mod association;
}

pub mod summary {
    pub mod extract;
    pub mod io;
}

pub mod engine;
pub mod job;

pub mod sim {
    pub mod synthetic;
}
