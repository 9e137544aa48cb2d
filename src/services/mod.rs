// src/services/mod.rs

pub mod authoring;
pub mod clone;
pub mod contract;
pub mod ordering;
pub mod ownership;
pub mod reconcile;
pub mod repository;
