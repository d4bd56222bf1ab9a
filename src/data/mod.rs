pub mod config;
pub mod configmap;
