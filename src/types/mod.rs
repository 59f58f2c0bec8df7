pub mod point;
pub mod settings;
pub mod station;
pub mod window;
