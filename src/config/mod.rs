pub mod logger_settings;
pub mod partner_registry;
