// Application layer: ports that the pipeline stage depends on

pub mod ports;
