mod common;
mod detectors;
mod orchestrator;
