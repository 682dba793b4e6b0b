pub mod common;
pub mod errors;
pub mod generate_commands;
pub mod materialize;
pub mod metamodel;
pub mod naming;
pub mod options;
pub mod plan;
pub mod plan_execution;
pub mod query;
pub mod render;
pub mod repository;
pub mod service;
pub mod task;
pub mod type_mapping;
pub mod validation;
