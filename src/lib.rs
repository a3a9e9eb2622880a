pub mod command;
pub mod engine;
pub mod model;
pub mod observability;
pub mod policy;
pub mod seeder;
pub mod store;
pub mod webhook;
