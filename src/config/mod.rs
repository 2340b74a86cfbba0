/// Agent configuration loading from agent.toml
pub mod agent;

/// Database configuration and connection management
pub mod database;

/// Reference data seeding from config.toml
pub mod seed;

/// Server settings from environment variables
pub mod settings;
