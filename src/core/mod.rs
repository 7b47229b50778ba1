pub mod catalog;
pub mod cycler;
pub mod destination;
pub mod embedding;
pub mod fingerprint;
pub mod matcher;
pub mod model;
pub mod pipeline;
pub mod selector;
