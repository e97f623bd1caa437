//! Image Generation Service
//!
//! This library provides the core functionality for the image-gen-service
//! gateway, which forwards text-to-image requests to the OpenAI image API,
//! stores the resulting images on local disk, and serves them by id.

pub mod app_state;
pub mod config;
pub mod error;
pub mod models;
pub mod routes;
pub mod services;
