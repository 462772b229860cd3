pub mod secrets;
pub mod settings;

pub use settings::Settings;
