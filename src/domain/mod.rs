// Domain layer: series model and ports (storage, configuration, pipeline, model seams).

pub mod model;
pub mod ports;
