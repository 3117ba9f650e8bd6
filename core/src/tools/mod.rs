pub mod weather;

pub use weather::{WeatherConfig, WeatherReading, WeatherTool};
