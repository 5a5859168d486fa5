mod service;

pub use service::{normalize, SensorSample, SensorService, TIMESTAMP_FIELD, VALUE_FIELD};
