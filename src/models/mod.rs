// src/models/mod.rs

pub mod course;
pub mod question;
pub mod quiz;
pub mod record;
