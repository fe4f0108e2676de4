pub mod backend;
pub mod camera;
pub mod canvas;
pub mod config;
pub mod controller;
pub mod error;
pub mod lighting;
pub mod march;
pub mod math;
pub mod ray;
pub mod render;
pub mod sdf;
pub mod shaders;
pub mod web;
