//! Request and response models for the API service

pub mod application;
pub mod catalog;
pub mod form;
pub mod profile;
